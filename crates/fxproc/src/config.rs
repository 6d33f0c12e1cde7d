//! Runtime options.

use d3d9_interop::{DeviceAttempt, LoaderOptions};
use fxproc_core::ffi::{D3DXFX_NOT_CLONEABLE, D3DXSHADER_SKIPOPTIMIZATION};

/// Options for an [`FxContext`](crate::FxContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Flags passed to the effect compiler.
    pub effect_flags: u32,
    /// Native library and device selection.
    pub loader: LoaderOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            effect_flags: D3DXFX_NOT_CLONEABLE | D3DXSHADER_SKIPOPTIMIZATION,
            loader: LoaderOptions::default(),
        }
    }
}

impl Options {
    /// Defaults adjusted by the environment:
    ///
    /// - `FXPROC_OPTIMIZE_SHADERS=1` compiles effects with optimization.
    /// - `FXPROC_DEVICE=ref` only tries the reference rasterizer.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if var("FXPROC_OPTIMIZE_SHADERS").is_some_and(|v| v == "1") {
            options.effect_flags &= !D3DXSHADER_SKIPOPTIMIZATION;
        }
        if var("FXPROC_DEVICE").is_some_and(|v| v.eq_ignore_ascii_case("ref")) {
            options.loader.device_attempts = vec![DeviceAttempt::REFERENCE];
        }
        options
    }
}
