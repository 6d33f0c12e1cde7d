//! Dynamically loaded DLLs and their exports.

use std::ffi::{c_void, CStr, CString};

use fxproc_core::{Error, Result};
use tracing::debug;
use windows::core::PCSTR;
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryA};

/// A loaded DLL, freed on drop.
pub struct Library {
    name: String,
    module: HMODULE,
}

impl Library {
    pub fn load(name: &str) -> Result<Self> {
        let c_name = CString::new(name)
            .map_err(|_| Error::Library(format!("invalid library name \"{name}\"")))?;
        let module = unsafe { LoadLibraryA(PCSTR(c_name.as_ptr() as *const u8)) }
            .map_err(|e| Error::Library(format!("can't load {name}: {e}")))?;
        debug!("loaded {name}");
        Ok(Self {
            name: name.to_string(),
            module,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `symbol` as a function pointer of type `F`.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "system"` function pointer type matching the
    /// export's real signature.
    pub unsafe fn symbol<F: Copy>(&self, symbol: &CStr) -> Result<F> {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
        let addr = unsafe { GetProcAddress(self.module, PCSTR(symbol.as_ptr() as *const u8)) }
            .ok_or_else(|| {
                Error::Library(format!(
                    "{} does not export {}",
                    self.name,
                    symbol.to_string_lossy()
                ))
            })?;
        let ptr = addr as usize as *mut c_void;
        Ok(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&ptr) })
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if let Err(e) = unsafe { FreeLibrary(self.module) } {
            debug!("FreeLibrary({}) failed: {e}", self.name);
        }
    }
}
