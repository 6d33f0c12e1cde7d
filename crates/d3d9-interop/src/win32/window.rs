//! Hidden window that gives the D3D9 device a focus window.

use std::ffi::c_void;

use fxproc_core::{Error, Result};
use tracing::debug;
use windows::core::s;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExA, DestroyWindow, WINDOW_EX_STYLE, WS_OVERLAPPEDWINDOW,
};

/// A never-shown `STATIC` window, destroyed on drop.
pub struct HiddenWindow {
    hwnd: HWND,
}

impl HiddenWindow {
    pub fn create() -> Result<Self> {
        let hwnd = unsafe {
            CreateWindowExA(
                WINDOW_EX_STYLE(0),
                s!("STATIC"),
                s!("fxproc_window"),
                WS_OVERLAPPEDWINDOW,
                0,
                0,
                100,
                100,
                None,
                None,
                None,
                None,
            )
        }
        .map_err(|e| Error::Library(format!("failed to create window: {e}")))?;
        Ok(Self { hwnd })
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.hwnd.0
    }
}

impl Drop for HiddenWindow {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            debug!("DestroyWindow failed: {e}");
        }
    }
}
