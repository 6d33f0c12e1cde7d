//! Render-target binding and clears.
//!
//! The pipeline is either without a target or bound to one texture level.
//! The bound extent is what draws size their geometry and the implicit
//! `vTargetSize` parameter with.

use std::ffi::c_void;
use std::rc::Rc;

use fxproc_core::ffi::{
    D3DCLEAR_TARGET, D3DCUBEMAP_FACE_NEGATIVE_X, D3DCUBEMAP_FACE_NEGATIVE_Y,
    D3DCUBEMAP_FACE_NEGATIVE_Z, D3DCUBEMAP_FACE_POSITIVE_X, D3DCUBEMAP_FACE_POSITIVE_Y,
    D3DCUBEMAP_FACE_POSITIVE_Z, D3DXVECTOR4,
};
use fxproc_core::vtable::{Clear, GetCubeMapSurface, GetSurfaceLevel, SetRenderTarget};
use fxproc_core::{check, ComPtr, Error, Result};
use tracing::debug;

use crate::context::Shared;
use crate::registry::HandleId;
use crate::texture::{ResourceKind, Texture};

/// Cube faces in face-index order.
pub const CUBE_FACES: [u32; 6] = [
    D3DCUBEMAP_FACE_POSITIVE_X,
    D3DCUBEMAP_FACE_NEGATIVE_X,
    D3DCUBEMAP_FACE_POSITIVE_Y,
    D3DCUBEMAP_FACE_NEGATIVE_Y,
    D3DCUBEMAP_FACE_POSITIVE_Z,
    D3DCUBEMAP_FACE_NEGATIVE_Z,
];

/// Size in pixels of the bound render target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub width: f32,
    pub height: f32,
}

impl Extent {
    /// Size of mip `level` of a `width` x `height` texture.
    pub fn of_level(width: u32, height: u32, level: u32) -> Self {
        let shrink = |v: u32| v.checked_shr(level).unwrap_or(0) as f32;
        Self {
            width: shrink(width),
            height: shrink(height),
        }
    }

    /// `{width, height, 1/width, 1/height}`.
    pub fn target_size(&self) -> D3DXVECTOR4 {
        D3DXVECTOR4 {
            x: self.width,
            y: self.height,
            z: 1.0 / self.width,
            w: 1.0 / self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetState {
    NoTarget,
    Bound { extent: Extent, target: HandleId },
}

/// Render-target state of one device.
pub struct RenderPipeline {
    shared: Rc<Shared>,
    state: TargetState,
}

impl RenderPipeline {
    pub(crate) fn new(shared: Rc<Shared>) -> Self {
        Self {
            shared,
            state: TargetState::NoTarget,
        }
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn extent(&self) -> Option<Extent> {
        match self.state {
            TargetState::NoTarget => None,
            TargetState::Bound { extent, .. } => Some(extent),
        }
    }

    /// Make mip `level` of `texture` the device's only render target. For
    /// cube textures `face` picks the face (see [`CUBE_FACES`]); it is
    /// ignored for 2D textures.
    ///
    /// The state only changes if the device accepted the surface.
    pub fn bind_render_target(&mut self, texture: &Texture, level: u32, face: u32) -> Result<()> {
        let handle = texture.handle()?;
        if !Rc::ptr_eq(&self.shared, texture.shared()) {
            return Err(Error::precondition(format!(
                "texture \"{}\" belongs to another context",
                texture.name()
            )));
        }

        let this = handle.as_raw();
        let mut surface: *mut c_void = std::ptr::null_mut();
        match texture.kind() {
            ResourceKind::Texture2d => {
                let hr = unsafe { (handle.method::<GetSurfaceLevel>())(this, level, &mut surface) };
                check(hr, "IDirect3DTexture9::GetSurfaceLevel")?;
            }
            ResourceKind::Cube => {
                let Some(&cube_face) = CUBE_FACES.get(face as usize) else {
                    return Err(Error::precondition(format!(
                        "cube face {face} is out of range 0..=5"
                    )));
                };
                let hr = unsafe {
                    (handle.method::<GetCubeMapSurface>())(this, cube_face, level, &mut surface)
                };
                check(hr, "IDirect3DCubeTexture9::GetCubeMapSurface")?;
            }
            ResourceKind::Volume => {
                return Err(Error::precondition(format!(
                    "\"{}\" is a volume texture; render targets must be 2D or cube",
                    texture.name()
                )));
            }
        }
        let surface = ComPtr::new(surface)
            .ok_or_else(|| Error::precondition("surface query returned null"))?;

        let device = self.shared.device;
        let hr = unsafe {
            (device.method::<SetRenderTarget>())(device.as_raw(), 0, surface.as_raw())
        };
        // The device holds its own reference while the surface is bound.
        unsafe { surface.release() };
        check(hr, "IDirect3DDevice9::SetRenderTarget")?;

        let extent = Extent::of_level(texture.width(), texture.height(), level);
        self.state = TargetState::Bound {
            extent,
            target: texture.id(),
        };
        debug!(
            "render target \"{}\" level {level} face {face} ({}x{})",
            texture.name(),
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Fill the bound target with a color. Channels are clamped to 0..=255.
    pub fn clear(&self, r: i32, g: i32, b: i32, a: i32) -> Result<()> {
        self.bound_extent()?;
        let device = self.shared.device;
        let hr = unsafe {
            (device.method::<Clear>())(
                device.as_raw(),
                0,
                std::ptr::null(),
                D3DCLEAR_TARGET,
                pack_argb(r, g, b, a),
                1.0,
                0,
            )
        };
        check(hr, "IDirect3DDevice9::Clear")
    }

    /// Extent of the bound target, failing if nothing is bound or the bound
    /// texture has been released since.
    pub(crate) fn bound_extent(&self) -> Result<Extent> {
        match self.state {
            TargetState::NoTarget => Err(Error::precondition("no render target is bound")),
            TargetState::Bound { extent, target } => {
                if self.shared.registry.borrow().textures.contains(target) {
                    Ok(extent)
                } else {
                    Err(Error::precondition("the bound render target has been released"))
                }
            }
        }
    }

    pub(crate) fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }
}

/// Pack byte channels into a `D3DCOLOR`, clamping each to 0..=255.
pub fn pack_argb(r: i32, g: i32, b: i32, a: i32) -> u32 {
    let byte = |v: i32| v.clamp(0, 255) as u32;
    (byte(a) << 24) | (byte(r) << 16) | (byte(g) << 8) | byte(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_argb_clamps_channels() {
        assert_eq!(pack_argb(300, -10, 128, 0), 0x00FF_0080);
        assert_eq!(pack_argb(255, 0, 0, 255), 0xFFFF_0000);
        assert_eq!(pack_argb(0, 0, 0, 0), 0);
    }

    #[test]
    fn extent_halves_per_level() {
        assert_eq!(
            Extent::of_level(256, 100, 0),
            Extent {
                width: 256.0,
                height: 100.0
            }
        );
        assert_eq!(
            Extent::of_level(256, 100, 3),
            Extent {
                width: 32.0,
                height: 12.0
            }
        );
        assert_eq!(Extent::of_level(256, 100, 40).width, 0.0);
    }

    #[test]
    fn target_size_carries_reciprocals() {
        let v = Extent::of_level(256, 128, 0).target_size();
        assert_eq!((v.x, v.y, v.z, v.w), (256.0, 128.0, 1.0 / 256.0, 1.0 / 128.0));
    }

    #[test]
    fn cube_faces_follow_d3d_order() {
        assert_eq!(CUBE_FACES, [0, 1, 2, 3, 4, 5]);
    }
}
