//! Entry points of the D3DX image codec and effect compiler.

use std::ffi::{c_void, CStr};

use fxproc_core::ffi::{D3DXIMAGE_INFO, HRESULT};
use fxproc_core::ComPtr;

/// The D3DX exports the runtime needs, one method per native function.
///
/// Signatures mirror the native calls: out parameters plus an `HRESULT`
/// return, so callers check every result at the call site. Objects written
/// to out parameters carry one reference owned by the caller.
///
/// All methods are `unsafe` because they hand `ComPtr`s to native code.
///
/// # Safety
///
/// For every method: `device` and `texture` must be live objects of the
/// expected interface, and out pointers are only meaningful when the returned
/// `HRESULT` is a success (`errors` may also be set on failure).
pub trait D3dxServices {
    /// `D3DXGetImageInfoFromFileA`.
    unsafe fn get_image_info_from_file(&self, path: &CStr, info: &mut D3DXIMAGE_INFO) -> HRESULT;

    /// `D3DXCreateTextureFromFileExA` with non-power-of-two default size,
    /// full mip chain, `format`, managed pool and default filters.
    unsafe fn create_texture_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT;

    /// `D3DXCreateCubeTextureFromFileExA`, same conventions as
    /// [`create_texture_from_file`](Self::create_texture_from_file).
    unsafe fn create_cube_texture_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT;

    /// `D3DXSaveTextureToFileA` with a `D3DXIMAGE_FILEFORMAT` code.
    unsafe fn save_texture_to_file(&self, path: &CStr, file_format: u32, texture: ComPtr) -> HRESULT;

    /// `D3DXCreateEffectFromFileA`. On failure `errors` may receive an
    /// `ID3DXBuffer` holding compiler diagnostics.
    unsafe fn create_effect_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT;

    /// `D3DXCreateEffect` from in-memory source text.
    unsafe fn create_effect(
        &self,
        device: ComPtr,
        source: &[u8],
        flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT;
}
