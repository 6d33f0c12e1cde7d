//! The seam between the fxproc runtime and the native Direct3D 9 world.
//!
//! This crate defines [`D3dxServices`], the image I/O and effect compiler
//! entry points exported by `d3dx9_*.dll`, and [`NativeDevice`], the
//! factory/device pair every other native call goes through. On Windows,
//! [`win32::Win32Services`] loads the real libraries; with the `mock` feature,
//! [`mock::MockRuntime`] provides Rust-implemented COM objects with the same
//! vtable layout for tests.

pub mod device;
pub mod services;

pub use device::{create_device, DeviceAttempt, LoaderOptions, NativeDevice};
pub use services::D3dxServices;

// Platform-specific implementations.

#[cfg(target_os = "windows")]
pub mod win32;

#[cfg(feature = "mock")]
pub mod mock;
