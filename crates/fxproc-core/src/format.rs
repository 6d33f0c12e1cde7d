//! Format registry: pixel-format tokens and image file extensions mapped to
//! the numeric codes D3D9 and D3DX expect.
//!
//! Both tables are fixed at compile time and are bijections over the
//! supported set. Use the token functions ([`format_code_of`],
//! [`token_of`], ...) when the caller speaks strings, or the enums directly.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $code:expr => $token:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
        #[repr(u32)]
        pub enum $name {
            $($variant = $code,)*
        }

        impl $name {
            /// Every supported value, in table order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn token(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)*
                }
            }
        }
    };
}

code_table! {
    /// `D3DFORMAT` values usable for textures and render targets.
    pub enum PixelFormat {
        Unknown = 0 => "UNKNOWN",
        R8G8B8 = 20 => "R8G8B8",
        A8R8G8B8 = 21 => "A8R8G8B8",
        X8R8G8B8 = 22 => "X8R8G8B8",
        R5G6B5 = 23 => "R5G6B5",
        X1R5G5B5 = 24 => "X1R5G5B5",
        A1R5G5B5 = 25 => "A1R5G5B5",
        A4R4G4B4 = 26 => "A4R4G4B4",
        R3G3B2 = 27 => "R3G3B2",
        A8 = 28 => "A8",
        A8R3G3B2 = 29 => "A8R3G3B2",
        X4R4G4B4 = 30 => "X4R4G4B4",
        A2B10G10R10 = 31 => "A2B10G10R10",
        A8B8G8R8 = 32 => "A8B8G8R8",
        X8B8G8R8 = 33 => "X8B8G8R8",
        G16R16 = 34 => "G16R16",
        A2R10G10B10 = 35 => "A2R10G10B10",
        A16B16G16R16 = 36 => "A16B16G16R16",
        A8P8 = 40 => "A8P8",
        P8 = 41 => "P8",
        L8 = 50 => "L8",
        A8L8 = 51 => "A8L8",
        A4L4 = 52 => "A4L4",
        V8U8 = 60 => "V8U8",
        L6V5U5 = 61 => "L6V5U5",
        X8L8V8U8 = 62 => "X8L8V8U8",
        Q8W8V8U8 = 63 => "Q8W8V8U8",
        V16U16 = 64 => "V16U16",
        A2W10V10U10 = 67 => "A2W10V10U10",
        L16 = 81 => "L16",
        Dxt1 = fourcc(b"DXT1") => "DXT1",
        Dxt2 = fourcc(b"DXT2") => "DXT2",
        Dxt3 = fourcc(b"DXT3") => "DXT3",
        Dxt4 = fourcc(b"DXT4") => "DXT4",
        Dxt5 = fourcc(b"DXT5") => "DXT5",
        // s10e5, 16 bits per channel
        R16F = 111 => "R16F",
        G16R16F = 112 => "G16R16F",
        A16B16G16R16F = 113 => "A16B16G16R16F",
        // IEEE s23e8, 32 bits per channel
        R32F = 114 => "R32F",
        G32R32F = 115 => "G32R32F",
        A32B32G32R32F = 116 => "A32B32G32R32F",
    }
}

code_table! {
    /// `D3DXIMAGE_FILEFORMAT` values, keyed by lower-case file extension.
    pub enum ImageFileFormat {
        Bmp = 0 => "bmp",
        Jpg = 1 => "jpg",
        Tga = 2 => "tga",
        Png = 3 => "png",
        Dds = 4 => "dds",
        Ppm = 5 => "ppm",
        Dib = 6 => "dib",
        Hdr = 7 => "hdr",
        Pfm = 8 => "pfm",
    }
}

/// `MAKEFOURCC` for the block-compressed formats.
const fn fourcc(tag: &[u8; 4]) -> u32 {
    (tag[0] as u32) | ((tag[1] as u32) << 8) | ((tag[2] as u32) << 16) | ((tag[3] as u32) << 24)
}

static PIXEL_FORMATS_BY_TOKEN: Lazy<HashMap<&'static str, PixelFormat>> =
    Lazy::new(|| PixelFormat::ALL.iter().map(|f| (f.token(), *f)).collect());

static FILE_FORMATS_BY_EXTENSION: Lazy<HashMap<&'static str, ImageFileFormat>> =
    Lazy::new(|| ImageFileFormat::ALL.iter().map(|f| (f.token(), *f)).collect());

impl PixelFormat {
    pub fn code(self) -> u32 {
        // Every variant has an explicit u32 discriminant.
        self.to_u32().unwrap_or_default()
    }

    pub fn from_code(code: u32) -> Result<Self> {
        Self::from_u32(code).ok_or(Error::UnknownFormatCode(code))
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        PIXEL_FORMATS_BY_TOKEN
            .get(token)
            .copied()
            .ok_or_else(|| Error::UnknownFormat(token.to_string()))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl ImageFileFormat {
    pub fn code(self) -> u32 {
        self.to_u32().unwrap_or_default()
    }

    pub fn from_code(code: u32) -> Result<Self> {
        Self::from_u32(code).ok_or(Error::UnknownFileFormatCode(code))
    }

    /// Resolve from a file extension, ignoring case.
    pub fn from_extension(ext: &str) -> Result<Self> {
        let lower = ext.to_ascii_lowercase();
        FILE_FORMATS_BY_EXTENSION
            .get(lower.as_str())
            .copied()
            .ok_or_else(|| Error::UnknownFileFormat(ext.to_string()))
    }

    /// Resolve from the extension of `path`.
    pub fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnknownFileFormat(path.display().to_string()))?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for ImageFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Numeric `D3DFORMAT` for a pixel-format token such as `"A8R8G8B8"`.
pub fn format_code_of(token: &str) -> Result<u32> {
    token.parse::<PixelFormat>().map(PixelFormat::code)
}

/// Pixel-format token for a numeric `D3DFORMAT`.
pub fn token_of(code: u32) -> Result<&'static str> {
    PixelFormat::from_code(code).map(PixelFormat::token)
}

/// Numeric `D3DXIMAGE_FILEFORMAT` for a file extension such as `"tga"`.
pub fn file_format_code_of(ext: &str) -> Result<u32> {
    ImageFileFormat::from_extension(ext).map(ImageFileFormat::code)
}

/// Lower-case file extension for a numeric `D3DXIMAGE_FILEFORMAT`.
pub fn file_extension_of(code: u32) -> Result<&'static str> {
    ImageFileFormat::from_code(code).map(ImageFileFormat::token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn pixel_formats_round_trip() {
        for format in PixelFormat::ALL {
            let code = format_code_of(format.token()).unwrap();
            assert_eq!(token_of(code).unwrap(), format.token());
            assert_eq!(format_code_of(token_of(code).unwrap()).unwrap(), code);
        }
    }

    #[test]
    fn pixel_format_table_is_a_bijection() {
        let mut codes: Vec<u32> = PixelFormat::ALL.iter().map(|f| f.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), PixelFormat::ALL.len());
        assert_eq!(PIXEL_FORMATS_BY_TOKEN.len(), PixelFormat::ALL.len());
    }

    #[test]
    fn known_codes() {
        assert_eq!(format_code_of("A8R8G8B8").unwrap(), 21);
        assert_eq!(format_code_of("L16").unwrap(), 81);
        assert_eq!(format_code_of("DXT1").unwrap(), 0x3154_5844);
        assert_eq!(format_code_of("DXT5").unwrap(), 0x3554_5844);
        assert_eq!(format_code_of("A32B32G32R32F").unwrap(), 116);
        assert_eq!(token_of(113).unwrap(), "A16B16G16R16F");
    }

    #[test]
    fn unknown_tokens_are_lookup_errors() {
        let err = format_code_of("NOT_A_FORMAT").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        // Tokens are case sensitive, like the D3DFMT names.
        assert!(format_code_of("a8r8g8b8").is_err());
        assert!(matches!(token_of(99), Err(Error::UnknownFormatCode(99))));
    }

    #[test]
    fn file_formats_round_trip() {
        for format in ImageFileFormat::ALL {
            let code = file_format_code_of(format.token()).unwrap();
            assert_eq!(file_extension_of(code).unwrap(), format.token());
        }
        assert_eq!(file_format_code_of("TGA").unwrap(), 2);
        assert_eq!(file_format_code_of("pfm").unwrap(), 8);
    }

    #[test]
    fn file_format_from_path() {
        assert_eq!(
            ImageFileFormat::for_path(Path::new("out/lena_lowpass.TGA")).unwrap(),
            ImageFileFormat::Tga
        );
        assert!(matches!(
            ImageFileFormat::for_path(Path::new("noext")),
            Err(Error::UnknownFileFormat(_))
        ));
        assert!(matches!(
            ImageFileFormat::for_path(Path::new("picture.gif")),
            Err(Error::UnknownFileFormat(ext)) if ext == "gif"
        ));
    }
}
