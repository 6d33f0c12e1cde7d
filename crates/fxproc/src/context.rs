//! The runtime context: one device, its D3DX services and every resource
//! created through them.
//!
//! [`FxContext`] is the factory for textures and effects and owns the
//! [`RenderPipeline`]. Textures and effects keep the context's shared state
//! alive, so the native libraries are only unloaded after the last wrapper
//! is gone, but every native reference is released by
//! [`FxContext::shutdown`] (or when the context is dropped).

use std::cell::{Cell, RefCell};
use std::ffi::{c_void, CString};
use std::path::Path;
use std::rc::Rc;

use d3d9_interop::{D3dxServices, NativeDevice};
use fxproc_core::ffi::{
    failed, D3DPOOL_DEFAULT, D3DPOOL_MANAGED, D3DRTYPE_CUBETEXTURE, D3DRTYPE_TEXTURE,
    D3DUSAGE_RENDERTARGET, D3DXIMAGE_INFO, HRESULT,
};
use fxproc_core::vtable::{CreateCubeTexture, CreateTexture, CreateVolumeTexture};
use fxproc_core::{check, ComPtr, Error, ImageFileFormat, PixelFormat, Result};
use tracing::{debug, warn};

use crate::config::Options;
use crate::effect::Effect;
use crate::pipeline::RenderPipeline;
use crate::registry::Registry;
use crate::texture::{ResourceKind, Texture};
use crate::vertex::Triangles;

/// State shared by the context and every resource created from it.
pub(crate) struct Shared {
    pub(crate) device: ComPtr,
    factory: ComPtr,
    pub(crate) services: Box<dyn D3dxServices>,
    pub(crate) registry: RefCell<Registry>,
    shut_down: Cell<bool>,
}

impl Shared {
    /// Release every live resource, then the device, then the factory.
    /// Returns `None` if shutdown already ran.
    fn shutdown(&self) -> Option<ShutdownReport> {
        if self.shut_down.replace(true) {
            return None;
        }

        let (effects, textures) = {
            let mut registry = self.registry.borrow_mut();
            (registry.effects.take_all(), registry.textures.take_all())
        };

        let mut report = ShutdownReport::default();
        for (handle, name) in effects {
            warn!("releasing leaked effect \"{name}\" ({handle})");
            unsafe { handle.release() };
            report.released_effects += 1;
        }
        for (handle, name) in textures {
            warn!("releasing leaked texture \"{name}\" ({handle})");
            unsafe { handle.release() };
            report.released_textures += 1;
        }

        let mut references = unsafe { self.device.release() };
        references += unsafe { self.factory.release() };
        if references != 0 {
            warn!("leaking D3D resources: {references} references outlive the device");
        }
        report.leaked_references = references;

        debug!("fxproc shut down: {report:?}");
        Some(report)
    }
}

/// Outcome of [`FxContext::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Effects still live at shutdown, released on the caller's behalf.
    pub released_effects: usize,
    /// Textures still live at shutdown, released on the caller's behalf.
    pub released_textures: usize,
    /// Sum of the reference counts left on the device and the factory.
    pub leaked_references: u32,
}

/// An effect-processing context on one Direct3D 9 device.
pub struct FxContext {
    shared: Rc<Shared>,
    pipeline: RenderPipeline,
    options: Options,
}

impl FxContext {
    /// Load `d3d9.dll` and D3DX, create a device and wrap it.
    #[cfg(target_os = "windows")]
    pub fn new(options: Options) -> Result<Self> {
        let (services, device) = d3d9_interop::win32::Win32Services::load(&options.loader)?;
        Ok(unsafe { Self::with_native(device, Box::new(services), options) })
    }

    /// Wrap an existing factory/device pair.
    ///
    /// # Safety
    ///
    /// `device` must carry one owned reference to a live `IDirect3D9` and one
    /// to a device created from it; both move into the context. `services`
    /// must create objects compatible with that device.
    pub unsafe fn with_native(
        device: NativeDevice,
        services: Box<dyn D3dxServices>,
        options: Options,
    ) -> Self {
        let shared = Rc::new(Shared {
            device: device.device,
            factory: device.factory,
            services,
            registry: RefCell::new(Registry::default()),
            shut_down: Cell::new(false),
        });
        debug!("fxproc context on device {}", device.device);
        Self {
            pipeline: RenderPipeline::new(shared.clone()),
            shared,
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut RenderPipeline {
        &mut self.pipeline
    }

    /// Number of textures not yet released.
    pub fn live_textures(&self) -> usize {
        self.shared.registry.borrow().textures.len()
    }

    /// Number of effects not yet released.
    pub fn live_effects(&self) -> usize {
        self.shared.registry.borrow().effects.len()
    }

    // -----------------------------------------------------------------------
    // Textures
    // -----------------------------------------------------------------------

    /// Load a 2D or cube texture from an image file, keeping the file's
    /// pixel format.
    pub fn load_texture(&self, path: impl AsRef<Path>) -> Result<Texture> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let load_error = |reason: String| Error::Load {
            path: name.clone(),
            reason,
        };
        let c_path = c_path(path)?;
        let services = &self.shared.services;

        let mut info = D3DXIMAGE_INFO::default();
        let hr = unsafe { services.get_image_info_from_file(&c_path, &mut info) };
        check(hr, "D3DXGetImageInfoFromFile").map_err(|e| load_error(e.to_string()))?;

        let mut raw: *mut c_void = std::ptr::null_mut();
        let (hr, op) = match info.ResourceType {
            D3DRTYPE_TEXTURE => (
                unsafe {
                    services.create_texture_from_file(
                        self.shared.device,
                        &c_path,
                        info.Format,
                        &mut raw,
                    )
                },
                "D3DXCreateTextureFromFileEx",
            ),
            D3DRTYPE_CUBETEXTURE => (
                unsafe {
                    services.create_cube_texture_from_file(
                        self.shared.device,
                        &c_path,
                        info.Format,
                        &mut raw,
                    )
                },
                "D3DXCreateCubeTextureFromFileEx",
            ),
            other => return Err(load_error(format!("unsupported resource type {other}"))),
        };
        check(hr, op).map_err(|e| load_error(e.to_string()))?;
        let handle =
            ComPtr::new(raw).ok_or_else(|| load_error(format!("{op} returned no texture")))?;

        Texture::adopt(&self.shared, handle, name)
    }

    /// Create a 2D render target in the default pool.
    pub fn create_render_target(
        &self,
        width: u32,
        height: u32,
        format: &str,
        levels: u32,
    ) -> Result<Texture> {
        let format: PixelFormat = format.parse()?;
        let device = self.shared.device;
        self.create("render target", "<renderTarget>", |out| unsafe {
            (device.method::<CreateTexture>())(
                device.as_raw(),
                width,
                height,
                levels,
                D3DUSAGE_RENDERTARGET,
                format.code(),
                D3DPOOL_DEFAULT,
                out,
                std::ptr::null_mut(),
            )
        })
    }

    /// Create a cube render target with `size` x `size` faces.
    pub fn create_render_target_cube(
        &self,
        size: u32,
        format: &str,
        levels: u32,
    ) -> Result<Texture> {
        let format: PixelFormat = format.parse()?;
        let device = self.shared.device;
        self.create("render target cube", "<renderTargetCube>", |out| unsafe {
            (device.method::<CreateCubeTexture>())(
                device.as_raw(),
                size,
                levels,
                D3DUSAGE_RENDERTARGET,
                format.code(),
                D3DPOOL_DEFAULT,
                out,
                std::ptr::null_mut(),
            )
        })
    }

    /// Create a volume texture in the managed pool.
    pub fn create_volume_texture(
        &self,
        width: u32,
        height: u32,
        format: &str,
        levels: u32,
        slices: u32,
    ) -> Result<Texture> {
        let format: PixelFormat = format.parse()?;
        let device = self.shared.device;
        self.create("volume texture", "<volumeTexture>", |out| unsafe {
            (device.method::<CreateVolumeTexture>())(
                device.as_raw(),
                width,
                height,
                slices,
                levels,
                0,
                format.code(),
                D3DPOOL_MANAGED,
                out,
                std::ptr::null_mut(),
            )
        })
    }

    fn create(
        &self,
        what: &'static str,
        name: &str,
        create: impl FnOnce(*mut *mut c_void) -> HRESULT,
    ) -> Result<Texture> {
        let mut raw: *mut c_void = std::ptr::null_mut();
        let hr = create(std::ptr::addr_of_mut!(raw));
        if failed(hr) {
            return Err(Error::Creation {
                what,
                code: hr as u32,
            });
        }
        let handle = ComPtr::new(raw)
            .ok_or_else(|| Error::precondition(format!("{what} creation returned null")))?;
        Texture::adopt(&self.shared, handle, name.to_string())
    }

    /// Save `texture` to `path`; the container format follows the extension.
    pub fn save_texture(&self, texture: &Texture, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file_format = ImageFileFormat::for_path(path)?;
        let handle = texture.handle()?;
        let c_path = c_path(path)?;

        let hr = unsafe {
            self.shared
                .services
                .save_texture_to_file(&c_path, file_format.code(), handle)
        };
        if failed(hr) {
            return Err(Error::Save {
                path: path.display().to_string(),
                code: hr as u32,
            });
        }
        debug!("saved {} as {file_format} to {}", texture.name(), path.display());
        Ok(())
    }

    /// Copy one level of `source` into slice `slice` of the volume texture
    /// `destination`.
    ///
    /// Arguments are validated, but the copy itself is not available.
    pub fn copy_level_to_volume_slice(
        &self,
        source: &Texture,
        destination: &Texture,
        slice: u32,
    ) -> Result<()> {
        source.handle()?;
        destination.handle()?;
        if destination.kind() != ResourceKind::Volume {
            return Err(Error::precondition(format!(
                "\"{}\" is not a volume texture",
                destination.name()
            )));
        }
        if slice >= destination.slices() {
            return Err(Error::precondition(format!(
                "slice {slice} out of range for \"{}\" ({} slices)",
                destination.name(),
                destination.slices()
            )));
        }
        Err(Error::NotSupported("copying a texture level into a volume slice"))
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    /// Compile an effect file.
    pub fn open_effect(&self, path: impl AsRef<Path>) -> Result<Effect> {
        let path = path.as_ref();
        let c_path = c_path(path)?;
        let mut raw: *mut c_void = std::ptr::null_mut();
        let mut errors: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            self.shared.services.create_effect_from_file(
                self.shared.device,
                &c_path,
                self.options.effect_flags,
                &mut raw,
                &mut errors,
            )
        };
        Effect::from_compiler(&self.shared, hr, raw, errors, path.display().to_string())
    }

    /// Compile an effect from source text.
    pub fn effect_from_source(&self, source: &str) -> Result<Effect> {
        let mut raw: *mut c_void = std::ptr::null_mut();
        let mut errors: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            self.shared.services.create_effect(
                self.shared.device,
                source.as_bytes(),
                self.options.effect_flags,
                &mut raw,
                &mut errors,
            )
        };
        Effect::from_compiler(&self.shared, hr, raw, errors, "<string>".to_string())
    }

    /// `count` zeroed triangles for [`Effect::draw_triangles`].
    pub fn create_triangles(&self, count: usize) -> Triangles {
        Triangles::new(count)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// See [`RenderPipeline::bind_render_target`].
    pub fn set_render_target(&mut self, texture: &Texture, level: u32, face: u32) -> Result<()> {
        self.pipeline.bind_render_target(texture, level, face)
    }

    /// See [`RenderPipeline::clear`].
    pub fn clear(&self, r: i32, g: i32, b: i32, a: i32) -> Result<()> {
        self.pipeline.clear(r, g, b, a)
    }

    pub fn draw_quad(&self, effect: &Effect, technique: &str) -> Result<()> {
        effect.draw_quad(&self.pipeline, technique)
    }

    pub fn draw_triangles(
        &self,
        effect: &Effect,
        triangles: &Triangles,
        technique: &str,
    ) -> Result<()> {
        effect.draw_triangles(&self.pipeline, triangles, technique)
    }

    /// Release every remaining resource, the device and the factory.
    ///
    /// Textures and effects that outlive the context become inert: their
    /// operations fail with a precondition error and dropping them does
    /// nothing.
    pub fn shutdown(self) -> ShutdownReport {
        self.shared.shutdown().unwrap_or_default()
    }
}

impl Drop for FxContext {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.to_string_lossy().into_owned())
        .map_err(|_| Error::precondition(format!("path {} contains a NUL byte", path.display())))
}

pub(crate) fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::precondition(format!("name {name:?} contains a NUL byte")))
}
