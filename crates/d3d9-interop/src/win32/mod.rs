//! Real `d3d9.dll` / `d3dx9_*.dll` backend (Windows only).
//!
//! [`Win32Services::load`] performs the one-time bootstrap: load the
//! libraries, create the `IDirect3D9` factory, a hidden focus window and the
//! device. The returned [`NativeDevice`] references are owned by the caller;
//! the services keep the libraries and the window alive and must outlive
//! every native object created through them.

mod library;
mod window;

pub use library::Library;
pub use window::HiddenWindow;

use std::ffi::{c_char, c_void, CStr};

use fxproc_core::ffi::{
    D3DPOOL_MANAGED, D3DXIMAGE_INFO, D3DX_DEFAULT, D3DX_DEFAULT_NONPOW2, D3D_SDK_VERSION, HRESULT,
};
use fxproc_core::{ComPtr, Error, Result};
use tracing::{debug, warn};

use crate::device::{create_device, LoaderOptions, NativeDevice};
use crate::services::D3dxServices;

// ---------------------------------------------------------------------------
// Export signatures
// ---------------------------------------------------------------------------

type Direct3DCreate9Fn = unsafe extern "system" fn(sdk_version: u32) -> *mut c_void;
type GetImageInfoFromFileFn =
    unsafe extern "system" fn(path: *const c_char, info: *mut D3DXIMAGE_INFO) -> HRESULT;
type CreateTextureFromFileExFn = unsafe extern "system" fn(
    device: *mut c_void,
    path: *const c_char,
    width: u32,
    height: u32,
    mip_levels: u32,
    usage: u32,
    format: u32,
    pool: u32,
    filter: u32,
    mip_filter: u32,
    color_key: u32,
    src_info: *mut D3DXIMAGE_INFO,
    palette: *mut c_void,
    texture: *mut *mut c_void,
) -> HRESULT;
type CreateCubeTextureFromFileExFn = unsafe extern "system" fn(
    device: *mut c_void,
    path: *const c_char,
    size: u32,
    mip_levels: u32,
    usage: u32,
    format: u32,
    pool: u32,
    filter: u32,
    mip_filter: u32,
    color_key: u32,
    src_info: *mut D3DXIMAGE_INFO,
    palette: *mut c_void,
    texture: *mut *mut c_void,
) -> HRESULT;
type SaveTextureToFileFn = unsafe extern "system" fn(
    path: *const c_char,
    file_format: u32,
    texture: *mut c_void,
    palette: *const c_void,
) -> HRESULT;
type CreateEffectFromFileFn = unsafe extern "system" fn(
    device: *mut c_void,
    path: *const c_char,
    defines: *const c_void,
    include: *mut c_void,
    flags: u32,
    pool: *mut c_void,
    effect: *mut *mut c_void,
    errors: *mut *mut c_void,
) -> HRESULT;
type CreateEffectFn = unsafe extern "system" fn(
    device: *mut c_void,
    source: *const c_void,
    source_len: u32,
    defines: *const c_void,
    include: *mut c_void,
    flags: u32,
    pool: *mut c_void,
    effect: *mut *mut c_void,
    errors: *mut *mut c_void,
) -> HRESULT;

/// Loaded D3DX exports.
struct D3dxFunctions {
    get_image_info_from_file: GetImageInfoFromFileFn,
    create_texture_from_file_ex: CreateTextureFromFileExFn,
    create_cube_texture_from_file_ex: CreateCubeTextureFromFileExFn,
    save_texture_to_file: SaveTextureToFileFn,
    create_effect_from_file: CreateEffectFromFileFn,
    create_effect: CreateEffectFn,
}

impl D3dxFunctions {
    fn load(lib: &Library) -> Result<Self> {
        unsafe {
            Ok(Self {
                get_image_info_from_file: lib.symbol(c"D3DXGetImageInfoFromFileA")?,
                create_texture_from_file_ex: lib.symbol(c"D3DXCreateTextureFromFileExA")?,
                create_cube_texture_from_file_ex: lib
                    .symbol(c"D3DXCreateCubeTextureFromFileExA")?,
                save_texture_to_file: lib.symbol(c"D3DXSaveTextureToFileA")?,
                create_effect_from_file: lib.symbol(c"D3DXCreateEffectFromFileA")?,
                create_effect: lib.symbol(c"D3DXCreateEffect")?,
            })
        }
    }
}

/// Find the newest available `d3dx9_NN.dll` in `options.d3dx_versions`.
fn load_d3dx(options: &LoaderOptions) -> Result<Library> {
    let newest = *options.d3dx_versions.end();
    for version in options.d3dx_versions.clone().rev() {
        let name = format!("d3dx9_{version}.dll");
        match Library::load(&name) {
            Ok(lib) => {
                if version != newest {
                    warn!("d3dx9_{newest}.dll not found, falling back to {name}");
                }
                return Ok(lib);
            }
            Err(e) => debug!("{e}"),
        }
    }
    Err(Error::Library("failed to find d3dx9_*.dll".to_string()))
}

// ---------------------------------------------------------------------------
// Win32Services
// ---------------------------------------------------------------------------

/// D3DX services backed by the real DLLs.
pub struct Win32Services {
    fns: D3dxFunctions,
    // Drop order: window, then D3DX, then d3d9.
    _window: HiddenWindow,
    _d3dx: Library,
    _d3d9: Library,
}

impl Win32Services {
    /// Load the libraries and create the factory, window and device.
    pub fn load(options: &LoaderOptions) -> Result<(Self, NativeDevice)> {
        let d3d9 = Library::load("d3d9.dll")?;
        let d3dx = load_d3dx(options)?;
        let fns = D3dxFunctions::load(&d3dx)?;
        debug!("using {}", d3dx.name());

        let direct3d_create9: Direct3DCreate9Fn = unsafe { d3d9.symbol(c"Direct3DCreate9")? };
        let factory = ComPtr::new(unsafe { direct3d_create9(D3D_SDK_VERSION) })
            .ok_or_else(|| Error::Library("failed to create D3D".to_string()))?;

        let window = match HiddenWindow::create() {
            Ok(window) => window,
            Err(e) => {
                unsafe { factory.release() };
                return Err(e);
            }
        };

        let device =
            match unsafe { create_device(factory, window.as_raw(), &options.device_attempts) } {
                Ok(device) => device,
                Err(e) => {
                    unsafe { factory.release() };
                    return Err(e);
                }
            };

        Ok((
            Self {
                fns,
                _window: window,
                _d3dx: d3dx,
                _d3d9: d3d9,
            },
            NativeDevice { factory, device },
        ))
    }
}

impl D3dxServices for Win32Services {
    unsafe fn get_image_info_from_file(&self, path: &CStr, info: &mut D3DXIMAGE_INFO) -> HRESULT {
        unsafe { (self.fns.get_image_info_from_file)(path.as_ptr(), info) }
    }

    unsafe fn create_texture_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        unsafe {
            (self.fns.create_texture_from_file_ex)(
                device.as_raw(),
                path.as_ptr(),
                D3DX_DEFAULT_NONPOW2,
                D3DX_DEFAULT_NONPOW2,
                0,
                0,
                format,
                D3DPOOL_MANAGED,
                D3DX_DEFAULT,
                D3DX_DEFAULT,
                0,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                texture,
            )
        }
    }

    unsafe fn create_cube_texture_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        unsafe {
            (self.fns.create_cube_texture_from_file_ex)(
                device.as_raw(),
                path.as_ptr(),
                D3DX_DEFAULT_NONPOW2,
                0,
                0,
                format,
                D3DPOOL_MANAGED,
                D3DX_DEFAULT,
                D3DX_DEFAULT,
                0,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                texture,
            )
        }
    }

    unsafe fn save_texture_to_file(&self, path: &CStr, file_format: u32, texture: ComPtr) -> HRESULT {
        unsafe {
            (self.fns.save_texture_to_file)(
                path.as_ptr(),
                file_format,
                texture.as_raw(),
                std::ptr::null(),
            )
        }
    }

    unsafe fn create_effect_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT {
        unsafe {
            (self.fns.create_effect_from_file)(
                device.as_raw(),
                path.as_ptr(),
                std::ptr::null(),
                std::ptr::null_mut(),
                flags,
                std::ptr::null_mut(),
                effect,
                errors,
            )
        }
    }

    unsafe fn create_effect(
        &self,
        device: ComPtr,
        source: &[u8],
        flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT {
        unsafe {
            (self.fns.create_effect)(
                device.as_raw(),
                source.as_ptr() as *const c_void,
                source.len() as u32,
                std::ptr::null(),
                std::ptr::null_mut(),
                flags,
                std::ptr::null_mut(),
                effect,
                errors,
            )
        }
    }
}
