//! Texture and render-target handles.

use std::fmt;
use std::rc::Rc;

use fxproc_core::ffi::{
    D3DRTYPE_CUBETEXTURE, D3DRTYPE_TEXTURE, D3DRTYPE_VOLUMETEXTURE, D3DSURFACE_DESC,
    D3DVOLUME_DESC,
};
use fxproc_core::vtable::{
    CubeGetLevelDesc, GetLevelCount, GetType, TextureGetLevelDesc, VolumeGetLevelDesc,
};
use fxproc_core::{check, ComPtr, Error, PixelFormat, Result};
use tracing::debug;

use crate::context::Shared;
use crate::registry::HandleId;

/// Shape of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Texture2d,
    Cube,
    Volume,
}

/// Level-0 description of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub levels: u32,
    /// Depth of a volume texture; 0 for 2D and cube textures.
    pub slices: u32,
}

/// One native texture (2D, cube or volume).
///
/// Dropping a `Texture` releases it. [`release`](Self::release) does the same
/// early; both are no-ops once the texture is gone from the registry.
pub struct Texture {
    shared: Rc<Shared>,
    handle: ComPtr,
    id: HandleId,
    kind: ResourceKind,
    desc: TextureDesc,
    name: String,
}

impl Texture {
    /// Take ownership of one reference to `handle`, describe it and register
    /// it. The reference is released if the texture can't be described.
    pub(crate) fn adopt(shared: &Rc<Shared>, handle: ComPtr, name: String) -> Result<Self> {
        let (kind, desc) = match unsafe { describe(handle) } {
            Ok(described) => described,
            Err(e) => {
                unsafe { handle.release() };
                return Err(e);
            }
        };
        let id = shared.registry.borrow_mut().textures.insert(handle, &name);

        let texture = Self {
            shared: shared.clone(),
            handle,
            id,
            kind,
            desc,
            name,
        };
        debug!("created {kind:?} texture {texture}");
        Ok(texture)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn desc(&self) -> TextureDesc {
        self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn format(&self) -> PixelFormat {
        self.desc.format
    }

    pub fn levels(&self) -> u32 {
        self.desc.levels
    }

    pub fn slices(&self) -> u32 {
        self.desc.slices
    }

    /// File path, or a tag such as `<renderTarget>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` until released or until the context shuts down.
    pub fn is_live(&self) -> bool {
        self.shared.registry.borrow().textures.contains(self.id)
    }

    /// The native handle, or a precondition error once released.
    pub fn handle(&self) -> Result<ComPtr> {
        if self.is_live() {
            Ok(self.handle)
        } else {
            Err(Error::precondition(format!(
                "texture \"{}\" has been released",
                self.name
            )))
        }
    }

    pub(crate) fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }

    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    /// Drop the native reference now. Later calls do nothing.
    pub fn release(&self) {
        let removed = self.shared.registry.borrow_mut().textures.remove(self.id);
        if let Some(handle) = removed {
            let remaining = unsafe { handle.release() };
            debug!("released texture \"{}\" ({remaining} references left)", self.name);
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Display for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width={} height={} format={} levels={} slices={} handle={} name=\"{}\"",
            self.desc.width,
            self.desc.height,
            self.desc.format,
            self.desc.levels,
            self.desc.slices,
            self.handle,
            self.name
        )
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("desc", &self.desc)
            .finish()
    }
}

/// Query kind, level-0 size, format and level count of a texture.
///
/// # Safety
///
/// `handle` must be a live `IDirect3DBaseTexture9`.
unsafe fn describe(handle: ComPtr) -> Result<(ResourceKind, TextureDesc)> {
    let this = handle.as_raw();
    let resource_type = unsafe { (handle.method::<GetType>())(this) };

    let (kind, width, height, format, slices) = match resource_type {
        D3DRTYPE_TEXTURE => {
            let mut desc = D3DSURFACE_DESC::default();
            let hr = unsafe { (handle.method::<TextureGetLevelDesc>())(this, 0, &mut desc) };
            check(hr, "IDirect3DTexture9::GetLevelDesc")?;
            (ResourceKind::Texture2d, desc.Width, desc.Height, desc.Format, 0)
        }
        D3DRTYPE_CUBETEXTURE => {
            let mut desc = D3DSURFACE_DESC::default();
            let hr = unsafe { (handle.method::<CubeGetLevelDesc>())(this, 0, &mut desc) };
            check(hr, "IDirect3DCubeTexture9::GetLevelDesc")?;
            (ResourceKind::Cube, desc.Width, desc.Height, desc.Format, 0)
        }
        D3DRTYPE_VOLUMETEXTURE => {
            let mut desc = D3DVOLUME_DESC::default();
            let hr = unsafe { (handle.method::<VolumeGetLevelDesc>())(this, 0, &mut desc) };
            check(hr, "IDirect3DVolumeTexture9::GetLevelDesc")?;
            (ResourceKind::Volume, desc.Width, desc.Height, desc.Format, desc.Depth)
        }
        other => {
            return Err(Error::precondition(format!(
                "unknown texture resource type {other}"
            )))
        }
    };

    let levels = unsafe { (handle.method::<GetLevelCount>())(this) };
    let desc = TextureDesc {
        width,
        height,
        format: PixelFormat::from_code(format)?,
        levels,
        slices,
    };
    Ok((kind, desc))
}
