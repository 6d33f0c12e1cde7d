//! Platform-independent core of the fxproc effect runtime.
//!
//! - [`ffi`] holds the Direct3D 9 / D3DX9 constants and `#[repr(C)]` structs.
//! - [`vtable`] dispatches calls into native COM objects by slot index.
//! - [`format`] maps pixel-format tokens and file extensions to native codes.
//! - [`error`] is the error taxonomy every other crate reports through.

pub mod error;
pub mod ffi;
pub mod format;
pub mod vtable;

pub use error::{check, Error, ErrorKind, Result};
pub use format::{ImageFileFormat, PixelFormat};
pub use vtable::{ComMethod, ComPtr, Interface};
