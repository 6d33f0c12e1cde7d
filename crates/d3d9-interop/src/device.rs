//! Direct3D 9 factory/device pair and device creation with fallback.
//!
//! Holds only the `IDirect3D9` factory and the `IDirect3DDevice9` created from
//! it -- no textures, effects or render state. Those belong to `fxproc`,
//! which owns the references stored here and releases them at shutdown.

use std::ffi::c_void;
use std::ops::RangeInclusive;

use fxproc_core::ffi::{
    D3DADAPTER_DEFAULT, D3DCREATE_HARDWARE_VERTEXPROCESSING, D3DCREATE_SOFTWARE_VERTEXPROCESSING,
    D3DDEVTYPE_HAL, D3DDEVTYPE_REF, D3DPRESENT_PARAMETERS,
};
use fxproc_core::vtable::CreateDevice;
use fxproc_core::{check, ComPtr, Error, Result};
use tracing::{debug, error};

/// The factory and device references a runtime is built on.
///
/// Each field carries exactly one owned reference.
#[derive(Debug)]
pub struct NativeDevice {
    /// `IDirect3D9`.
    pub factory: ComPtr,
    /// `IDirect3DDevice9`.
    pub device: ComPtr,
}

/// One (device type, behavior flags) combination to try when creating the
/// device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAttempt {
    pub device_type: u32,
    pub behavior: u32,
}

impl DeviceAttempt {
    pub const HARDWARE: Self = Self {
        device_type: D3DDEVTYPE_HAL,
        behavior: D3DCREATE_HARDWARE_VERTEXPROCESSING,
    };
    pub const SOFTWARE_VERTEX_PROCESSING: Self = Self {
        device_type: D3DDEVTYPE_HAL,
        behavior: D3DCREATE_SOFTWARE_VERTEXPROCESSING,
    };
    pub const REFERENCE: Self = Self {
        device_type: D3DDEVTYPE_REF,
        behavior: D3DCREATE_SOFTWARE_VERTEXPROCESSING,
    };

    /// Hardware first, then software vertex processing, then the reference
    /// rasterizer for headless machines.
    pub fn default_chain() -> Vec<Self> {
        vec![
            Self::HARDWARE,
            Self::SOFTWARE_VERTEX_PROCESSING,
            Self::REFERENCE,
        ]
    }
}

/// How to find the native libraries and create the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// `d3dx9_NN.dll` versions to try, highest first.
    pub d3dx_versions: RangeInclusive<u32>,
    /// Device configurations to try, in order.
    pub device_attempts: Vec<DeviceAttempt>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            d3dx_versions: 32..=43,
            device_attempts: DeviceAttempt::default_chain(),
        }
    }
}

/// Create a device from `factory`, trying each attempt in order.
///
/// Returns the first device created, or the error of the last attempt.
///
/// # Safety
///
/// `factory` must be a live `IDirect3D9` and `window` a valid window handle
/// (or null where the driver accepts one).
pub unsafe fn create_device(
    factory: ComPtr,
    window: *mut c_void,
    attempts: &[DeviceAttempt],
) -> Result<ComPtr> {
    let mut last_error = Error::precondition("no device configurations to try");

    for attempt in attempts {
        let mut params = D3DPRESENT_PARAMETERS::windowed(window);
        let mut device: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            (factory.method::<CreateDevice>())(
                factory.as_raw(),
                D3DADAPTER_DEFAULT,
                attempt.device_type,
                window,
                attempt.behavior,
                &mut params,
                &mut device,
            )
        };

        match check(hr, "IDirect3D9::CreateDevice") {
            Ok(()) => match ComPtr::new(device) {
                Some(device) => {
                    debug!(
                        "D3D9 device created with device type {} behavior {:#x}",
                        attempt.device_type, attempt.behavior
                    );
                    return Ok(device);
                }
                None => {
                    last_error = Error::precondition("CreateDevice succeeded with a null device");
                }
            },
            Err(e) => {
                debug!("{attempt:?} failed: {e}");
                last_error = e;
            }
        }
    }

    error!("Failed to create D3D9 device with any configuration");
    Err(last_error)
}
