//! Hardcoded Direct3D 9 / D3DX9 constants and C-repr structs.
//!
//! These stand in for the SDK headers (d3d9types.h, d3d9caps.h, d3dx9tex.h,
//! d3dx9effect.h). Only what the effect runtime touches is declared here.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;

/// COM result code. Negative values are failures.
pub type HRESULT = i32;

// =====================================================================
// Result codes
// =====================================================================
pub const S_OK: HRESULT = 0;
pub const E_FAIL: HRESULT = 0x8000_4005_u32 as i32;
pub const D3DERR_INVALIDCALL: HRESULT = 0x8876_086C_u32 as i32;
pub const D3DERR_NOTAVAILABLE: HRESULT = 0x8876_0869_u32 as i32;
pub const D3DERR_OUTOFVIDEOMEMORY: HRESULT = 0x8876_017C_u32 as i32;
pub const D3DXERR_INVALIDDATA: HRESULT = 0x8876_0B59_u32 as i32;

/// `FAILED()` from winerror.h.
pub const fn failed(hr: HRESULT) -> bool {
    hr < 0
}

// =====================================================================
// Device creation
// =====================================================================
pub const D3D_SDK_VERSION: u32 = 32;
pub const D3DADAPTER_DEFAULT: u32 = 0;

pub const D3DDEVTYPE_HAL: u32 = 1;
pub const D3DDEVTYPE_REF: u32 = 2;

pub const D3DCREATE_SOFTWARE_VERTEXPROCESSING: u32 = 0x0000_0020;
pub const D3DCREATE_HARDWARE_VERTEXPROCESSING: u32 = 0x0000_0040;

pub const D3DSWAPEFFECT_DISCARD: u32 = 1;

// =====================================================================
// Primitive types and vertex formats
// =====================================================================
pub const D3DPT_TRIANGLELIST: u32 = 4;
pub const D3DPT_TRIANGLESTRIP: u32 = 5;

pub const D3DFVF_XYZRHW: u32 = 0x004;
pub const D3DFVF_TEX1: u32 = 0x100;
/// `D3DFVF_TEXCOORDSIZE2(0)` is zero, so it does not appear in the mask.
pub const D3DFVF_SCREEN_TEX1: u32 = D3DFVF_XYZRHW | D3DFVF_TEX1;

// =====================================================================
// D3DX
// =====================================================================
pub const D3DX_DEFAULT: u32 = u32::MAX;
pub const D3DX_DEFAULT_NONPOW2: u32 = u32::MAX - 1;
pub const D3DXFX_NOT_CLONEABLE: u32 = 1 << 11;
pub const D3DXSHADER_SKIPOPTIMIZATION: u32 = 1 << 2;

// =====================================================================
// Pools, usages, clear flags
// =====================================================================
pub const D3DPOOL_DEFAULT: u32 = 0;
pub const D3DPOOL_MANAGED: u32 = 1;

pub const D3DUSAGE_RENDERTARGET: u32 = 0x0000_0001;

pub const D3DCLEAR_TARGET: u32 = 0x0000_0001;

// =====================================================================
// Cube faces
// =====================================================================
pub const D3DCUBEMAP_FACE_POSITIVE_X: u32 = 0;
pub const D3DCUBEMAP_FACE_NEGATIVE_X: u32 = 1;
pub const D3DCUBEMAP_FACE_POSITIVE_Y: u32 = 2;
pub const D3DCUBEMAP_FACE_NEGATIVE_Y: u32 = 3;
pub const D3DCUBEMAP_FACE_POSITIVE_Z: u32 = 4;
pub const D3DCUBEMAP_FACE_NEGATIVE_Z: u32 = 5;

// =====================================================================
// Resource types
// =====================================================================
pub const D3DRTYPE_SURFACE: u32 = 1;
pub const D3DRTYPE_VOLUME: u32 = 2;
pub const D3DRTYPE_TEXTURE: u32 = 3;
pub const D3DRTYPE_VOLUMETEXTURE: u32 = 4;
pub const D3DRTYPE_CUBETEXTURE: u32 = 5;

// =====================================================================
// C-repr structs matching the SDK
// =====================================================================

/// Present parameters for `IDirect3D9::CreateDevice`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct D3DPRESENT_PARAMETERS {
    pub BackBufferWidth: u32,
    pub BackBufferHeight: u32,
    pub BackBufferFormat: u32,
    pub BackBufferCount: u32,
    pub MultiSampleType: u32,
    pub MultiSampleQuality: u32,
    pub SwapEffect: u32,
    pub hDeviceWindow: *mut c_void,
    pub Windowed: i32,
    pub EnableAutoDepthStencil: i32,
    pub AutoDepthStencilFormat: u32,
    pub Flags: u32,
    pub FullScreen_RefreshRateInHz: u32,
    pub PresentationInterval: u32,
}

impl D3DPRESENT_PARAMETERS {
    /// Windowed, discard-swap parameters for an off-screen processing device.
    pub fn windowed(window: *mut c_void) -> Self {
        Self {
            BackBufferWidth: 0,
            BackBufferHeight: 0,
            BackBufferFormat: 0,
            BackBufferCount: 0,
            MultiSampleType: 0,
            MultiSampleQuality: 0,
            SwapEffect: D3DSWAPEFFECT_DISCARD,
            hDeviceWindow: window,
            Windowed: 1,
            EnableAutoDepthStencil: 0,
            AutoDepthStencilFormat: 0,
            Flags: 0,
            FullScreen_RefreshRateInHz: 0,
            PresentationInterval: 0,
        }
    }
}

/// Filled by `D3DXGetImageInfoFromFile`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct D3DXIMAGE_INFO {
    pub Width: u32,
    pub Height: u32,
    pub Depth: u32,
    pub MipLevels: u32,
    pub Format: u32,
    pub ResourceType: u32,
    pub ImageFileFormat: u32,
}

/// Level description of 2D and cube textures.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct D3DSURFACE_DESC {
    pub Format: u32,
    pub Type: u32,
    pub Usage: u32,
    pub Pool: u32,
    pub MultiSampleType: u32,
    pub MultiSampleQuality: u32,
    pub Width: u32,
    pub Height: u32,
}

/// Level description of volume textures.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct D3DVOLUME_DESC {
    pub Format: u32,
    pub Type: u32,
    pub Usage: u32,
    pub Pool: u32,
    pub Width: u32,
    pub Height: u32,
    pub Depth: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct D3DXVECTOR4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}
