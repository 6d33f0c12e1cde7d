//! Error taxonomy shared by every fxproc crate.

use thiserror::Error;

use crate::ffi::HRESULT;

/// Broad class of an [`Error`], for callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programmer error: wrong resource kind, released handle reused, bad index.
    Precondition,
    /// The native API returned a failure HRESULT.
    NativeCall,
    /// Effect compilation failed.
    Compile,
    /// Unknown format token, file extension, technique or parameter name.
    Lookup,
    /// External load/save failed for a path.
    Io,
    /// Declared but deliberately unimplemented surface.
    NotSupported,
}

/// Error type for all native runtime operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("{op} failed with HRESULT {code:#010x}")]
    NativeCall { op: &'static str, code: u32 },

    #[error("can't create {what} (HRESULT {code:#010x})")]
    Creation { what: &'static str, code: u32 },

    #[error("can't compile effect \"{source_name}\": {message}")]
    Compile { source_name: String, message: String },

    #[error("unknown pixel format \"{0}\"")]
    UnknownFormat(String),

    #[error("unknown pixel format code {0}")]
    UnknownFormatCode(u32),

    #[error("unknown image file format \"{0}\"")]
    UnknownFileFormat(String),

    #[error("unknown image file format code {0}")]
    UnknownFileFormatCode(u32),

    #[error("can't set technique \"{name}\" (HRESULT {code:#010x})")]
    Technique { name: String, code: u32 },

    #[error("can't set parameter \"{name}\" (HRESULT {code:#010x})")]
    Parameter { name: String, code: u32 },

    #[error("can't load texture \"{path}\": {reason}")]
    Load { path: String, reason: String },

    #[error("can't save texture \"{path}\" (HRESULT {code:#010x})")]
    Save { path: String, code: u32 },

    #[error("{0} is not supported")]
    NotSupported(&'static str),

    #[error("native library: {0}")]
    Library(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Precondition(_) => ErrorKind::Precondition,
            Error::NativeCall { .. } | Error::Creation { .. } => ErrorKind::NativeCall,
            Error::Compile { .. } => ErrorKind::Compile,
            Error::UnknownFormat(_)
            | Error::UnknownFormatCode(_)
            | Error::UnknownFileFormat(_)
            | Error::UnknownFileFormatCode(_)
            | Error::Technique { .. }
            | Error::Parameter { .. } => ErrorKind::Lookup,
            Error::Load { .. } | Error::Save { .. } | Error::Library(_) => ErrorKind::Io,
            Error::NotSupported(_) => ErrorKind::NotSupported,
        }
    }

    /// The raw HRESULT carried by this error, if any.
    pub fn hresult(&self) -> Option<HRESULT> {
        match self {
            Error::NativeCall { code, .. }
            | Error::Creation { code, .. }
            | Error::Technique { code, .. }
            | Error::Parameter { code, .. }
            | Error::Save { code, .. } => Some(*code as HRESULT),
            _ => None,
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }
}

/// Result type for native runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert an HRESULT into `Ok(())` or [`Error::NativeCall`].
pub fn check(hr: HRESULT, op: &'static str) -> Result<()> {
    if crate::ffi::failed(hr) {
        Err(Error::NativeCall {
            op,
            code: hr as u32,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{D3DERR_INVALIDCALL, S_OK};

    #[test]
    fn check_maps_only_negative_codes() {
        assert!(check(S_OK, "BeginScene").is_ok());
        // S_FALSE and other positive codes are successes.
        assert!(check(1, "BeginScene").is_ok());

        let err = check(D3DERR_INVALIDCALL, "BeginScene").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeCall);
        assert_eq!(err.hresult(), Some(D3DERR_INVALIDCALL));
        assert_eq!(
            err.to_string(),
            "BeginScene failed with HRESULT 0x8876086c"
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            Error::UnknownFormat("NOT_A_FORMAT".into()).kind(),
            ErrorKind::Lookup
        );
        assert_eq!(
            Error::Technique {
                name: "Missing".into(),
                code: 0x8000_4005
            }
            .kind(),
            ErrorKind::Lookup
        );
        assert_eq!(
            Error::Save {
                path: "out.tga".into(),
                code: 1
            }
            .kind(),
            ErrorKind::Io
        );
        assert_eq!(Error::precondition("x").kind(), ErrorKind::Precondition);
    }
}
