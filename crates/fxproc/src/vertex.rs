//! Screen-space vertex data for `DrawPrimitiveUP`.

use std::ops::{Deref, DerefMut};

use fxproc_core::ffi::D3DFVF_SCREEN_TEX1;

/// View a `#[repr(C)]` vertex type as the raw bytes handed to the device.
///
/// # Safety
///
/// Only implement on `#[repr(C)]` types made of plain numeric fields with no
/// padding.
pub unsafe trait AsBytes: Sized {
    fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self as *const Self as *const u8, std::mem::size_of::<Self>())
        }
    }
}

/// Pre-transformed vertex: position in pixels with reciprocal homogeneous
/// W, plus one 2D texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// RHW
    pub w: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    /// Vertex format code matching this layout (`D3DFVF_XYZRHW | D3DFVF_TEX1`).
    pub const FVF: u32 = D3DFVF_SCREEN_TEX1;
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    pub const fn new(x: f32, y: f32, z: f32, w: f32, u: f32, v: f32) -> Self {
        Self { x, y, z, w, u, v }
    }

    /// Vertex at `(x, y)` with `z = 0`, `rhw = 1` and texture coordinate `(u, v)`.
    pub const fn screen(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self::new(x, y, 0.0, 1.0, u, v)
    }
}

unsafe impl AsBytes for Vertex {}
unsafe impl<const N: usize> AsBytes for [Vertex; N] {}

/// Three independent vertices.
pub type Triangle = [Vertex; 3];

/// A mutable list of independent triangles, drawn as a triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangles {
    triangles: Vec<Triangle>,
}

impl Triangles {
    /// `count` triangles with every field zeroed.
    pub fn new(count: usize) -> Self {
        Self {
            triangles: vec![[Vertex::default(); 3]; count],
        }
    }

    pub(crate) fn as_ptr(&self) -> *const std::ffi::c_void {
        self.triangles.as_ptr() as *const std::ffi::c_void
    }
}

impl From<Vec<Triangle>> for Triangles {
    fn from(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }
}

impl Deref for Triangles {
    type Target = [Triangle];

    fn deref(&self) -> &[Triangle] {
        &self.triangles
    }
}

impl DerefMut for Triangles {
    fn deref_mut(&mut self) -> &mut [Triangle] {
        &mut self.triangles
    }
}

/// Four strip-ordered corners covering `width` x `height` pixels.
///
/// Corners are shifted by half a pixel so texel centers land on pixel
/// centers.
pub fn quad(width: f32, height: f32) -> [Vertex; 4] {
    let (x, y) = (-0.5, -0.5);
    [
        Vertex::screen(x, y, 0.0, 0.0),
        Vertex::screen(x + width, y, 1.0, 0.0),
        Vertex::screen(x, y + height, 0.0, 1.0),
        Vertex::screen(x + width, y + height, 1.0, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_fvf_stride() {
        assert_eq!(Vertex::STRIDE, 24);
        assert_eq!(std::mem::size_of::<Triangle>(), 72);
        assert_eq!(Vertex::FVF, 0x104);

        let v = Vertex::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(v.as_bytes().len(), 24);
        assert_eq!(&v.as_bytes()[4..8], &2.0f32.to_ne_bytes());
    }

    #[test]
    fn quad_covers_target_with_half_pixel_offset() {
        let q = quad(256.0, 128.0);
        assert_eq!(q[0], Vertex::new(-0.5, -0.5, 0.0, 1.0, 0.0, 0.0));
        assert_eq!(q[1], Vertex::new(255.5, -0.5, 0.0, 1.0, 1.0, 0.0));
        assert_eq!(q[2], Vertex::new(-0.5, 127.5, 0.0, 1.0, 0.0, 1.0));
        assert_eq!(q[3], Vertex::new(255.5, 127.5, 0.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn triangles_are_zeroed_and_mutable() {
        let mut tris = Triangles::new(2);
        assert_eq!(tris.len(), 2);
        assert!(tris.iter().flatten().all(|v| *v == Vertex::default()));

        tris[1][2] = Vertex::screen(30.0, 10.0, 0.0, 0.0);
        assert_eq!(tris[1][2].x, 30.0);
        assert_eq!(tris[1][2].w, 1.0);
    }
}
