//! Virtual-table dispatch for COM objects we have no interface definitions for.
//!
//! A COM object is a pointer to a pointer to an array of function pointers.
//! Each method we call is declared once in the [`com_methods!`] table below
//! with its interface, slot index and signature; call sites name the marker
//! type and get back a correctly typed function pointer. A version bump of
//! the native API touches only this table.

use std::ffi::{c_char, c_void};
use std::fmt;
use std::ptr::NonNull;

use crate::ffi::{
    D3DPRESENT_PARAMETERS, D3DSURFACE_DESC, D3DVOLUME_DESC, D3DXVECTOR4, HRESULT,
};

/// Non-null pointer to a native COM object.
///
/// `ComPtr` is a plain address: it does not add or drop references. Ownership
/// of the reference is tracked by whoever obtained it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComPtr(NonNull<c_void>);

impl ComPtr {
    /// Wrap a raw object pointer, rejecting null.
    pub fn new(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    pub fn as_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Fetch method `M` from this object's vtable.
    ///
    /// # Safety
    ///
    /// `self` must point to a live object whose vtable implements
    /// `M::INTERFACE` (or an interface deriving from it) with at least
    /// `M::SLOT + 1` entries.
    pub unsafe fn method<M: ComMethod>(self) -> M::Fn {
        debug_assert_eq!(
            std::mem::size_of::<M::Fn>(),
            std::mem::size_of::<*const c_void>()
        );
        let vtbl = unsafe { *(self.as_raw() as *const *const *const c_void) };
        let entry = unsafe { *vtbl.add(M::SLOT) };
        debug_assert!(
            !entry.is_null(),
            "null vtable entry for {}::{} (slot {})",
            M::INTERFACE,
            M::NAME,
            M::SLOT
        );
        unsafe { std::mem::transmute_copy::<*const c_void, M::Fn>(&entry) }
    }

    /// `IUnknown::Release`. Returns the remaining reference count.
    ///
    /// # Safety
    ///
    /// `self` must be a live COM object and the caller must own the reference
    /// being dropped.
    pub unsafe fn release(self) -> u32 {
        unsafe { (self.method::<Release>())(self.as_raw()) }
    }
}

impl fmt::Debug for ComPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComPtr({:#x})", self.addr())
    }
}

impl fmt::Display for ComPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

/// Native interfaces whose methods we dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    Unknown,
    Direct3D9,
    Device9,
    BaseTexture9,
    Texture9,
    CubeTexture9,
    VolumeTexture9,
    XBuffer,
    XEffect,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interface::Unknown => "IUnknown",
            Interface::Direct3D9 => "IDirect3D9",
            Interface::Device9 => "IDirect3DDevice9",
            Interface::BaseTexture9 => "IDirect3DBaseTexture9",
            Interface::Texture9 => "IDirect3DTexture9",
            Interface::CubeTexture9 => "IDirect3DCubeTexture9",
            Interface::VolumeTexture9 => "IDirect3DVolumeTexture9",
            Interface::XBuffer => "ID3DXBuffer",
            Interface::XEffect => "ID3DXEffect",
        };
        f.write_str(name)
    }
}

/// A method at a fixed vtable slot with a fixed signature.
pub trait ComMethod {
    const INTERFACE: Interface;
    const NAME: &'static str;
    const SLOT: usize;
    /// Native signature; the first argument is always `this`.
    type Fn: Copy;
}

/// One row of [`METHOD_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodEntry {
    pub interface: Interface,
    pub name: &'static str,
    pub slot: usize,
}

/// Slot index of `interface::name`, if it is declared.
pub fn slot_of(interface: Interface, name: &str) -> Option<usize> {
    METHOD_TABLE
        .iter()
        .find(|e| e.interface == interface && e.name == name)
        .map(|e| e.slot)
}

macro_rules! com_methods {
    ($(
        $(#[$meta:meta])*
        $marker:ident = $iface:ident :: $name:ident [$slot:literal] ($($arg:ty),*) -> $ret:ty;
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;

            impl ComMethod for $marker {
                const INTERFACE: Interface = Interface::$iface;
                const NAME: &'static str = stringify!($name);
                const SLOT: usize = $slot;
                type Fn = unsafe extern "system" fn(*mut c_void $(, $arg)*) -> $ret;
            }
        )*

        /// Every declared method, in declaration order.
        pub const METHOD_TABLE: &[MethodEntry] = &[
            $(
                MethodEntry {
                    interface: Interface::$iface,
                    name: stringify!($name),
                    slot: $slot,
                },
            )*
        ];
    };
}

com_methods! {
    Release = Unknown::Release[2]() -> u32;

    /// (adapter, device type, focus window, behavior flags, present params, out device)
    CreateDevice = Direct3D9::CreateDevice[16](
        u32, u32, *mut c_void, u32, *mut D3DPRESENT_PARAMETERS, *mut *mut c_void
    ) -> HRESULT;

    /// (width, height, levels, usage, format, pool, out texture, shared handle)
    CreateTexture = Device9::CreateTexture[23](
        u32, u32, u32, u32, u32, u32, *mut *mut c_void, *mut c_void
    ) -> HRESULT;
    /// (width, height, depth, levels, usage, format, pool, out texture, shared handle)
    CreateVolumeTexture = Device9::CreateVolumeTexture[24](
        u32, u32, u32, u32, u32, u32, u32, *mut *mut c_void, *mut c_void
    ) -> HRESULT;
    /// (edge length, levels, usage, format, pool, out texture, shared handle)
    CreateCubeTexture = Device9::CreateCubeTexture[25](
        u32, u32, u32, u32, u32, *mut *mut c_void, *mut c_void
    ) -> HRESULT;
    SetRenderTarget = Device9::SetRenderTarget[37](u32, *mut c_void) -> HRESULT;
    BeginScene = Device9::BeginScene[41]() -> HRESULT;
    EndScene = Device9::EndScene[42]() -> HRESULT;
    /// (rect count, rects, flags, color, z, stencil)
    Clear = Device9::Clear[43](u32, *const c_void, u32, u32, f32, u32) -> HRESULT;
    /// (primitive type, primitive count, vertex data, stride)
    DrawPrimitiveUp = Device9::DrawPrimitiveUP[83](u32, u32, *const c_void, u32) -> HRESULT;
    SetFvf = Device9::SetFVF[89](u32) -> HRESULT;

    GetType = BaseTexture9::GetType[10]() -> u32;
    GetLevelCount = BaseTexture9::GetLevelCount[13]() -> u32;

    TextureGetLevelDesc = Texture9::GetLevelDesc[17](u32, *mut D3DSURFACE_DESC) -> HRESULT;
    GetSurfaceLevel = Texture9::GetSurfaceLevel[18](u32, *mut *mut c_void) -> HRESULT;

    CubeGetLevelDesc = CubeTexture9::GetLevelDesc[17](u32, *mut D3DSURFACE_DESC) -> HRESULT;
    /// (face, level, out surface)
    GetCubeMapSurface = CubeTexture9::GetCubeMapSurface[18](u32, u32, *mut *mut c_void) -> HRESULT;

    VolumeGetLevelDesc = VolumeTexture9::GetLevelDesc[17](u32, *mut D3DVOLUME_DESC) -> HRESULT;

    GetBufferPointer = XBuffer::GetBufferPointer[3]() -> *mut c_void;
    GetBufferSize = XBuffer::GetBufferSize[4]() -> u32;

    // Effect parameter handles are passed as parameter names.
    SetFloat = XEffect::SetFloat[30](*const c_char, f32) -> HRESULT;
    SetVector = XEffect::SetVector[34](*const c_char, *const D3DXVECTOR4) -> HRESULT;
    SetTexture = XEffect::SetTexture[52](*const c_char, *mut c_void) -> HRESULT;
    SetTechnique = XEffect::SetTechnique[58](*const c_char) -> HRESULT;
    /// (out pass count, flags)
    EffectBegin = XEffect::Begin[63](*mut u32, u32) -> HRESULT;
    BeginPass = XEffect::BeginPass[64](u32) -> HRESULT;
    EndPass = XEffect::EndPass[66]() -> HRESULT;
    EffectEnd = XEffect::End[67]() -> HRESULT;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn table_matches_d3d9_headers() {
        let expected: &[(Interface, &str, usize)] = &[
            (Interface::Unknown, "Release", 2),
            (Interface::Direct3D9, "CreateDevice", 16),
            (Interface::Device9, "CreateTexture", 23),
            (Interface::Device9, "CreateVolumeTexture", 24),
            (Interface::Device9, "CreateCubeTexture", 25),
            (Interface::Device9, "SetRenderTarget", 37),
            (Interface::Device9, "BeginScene", 41),
            (Interface::Device9, "EndScene", 42),
            (Interface::Device9, "Clear", 43),
            (Interface::Device9, "DrawPrimitiveUP", 83),
            (Interface::Device9, "SetFVF", 89),
            (Interface::BaseTexture9, "GetType", 10),
            (Interface::BaseTexture9, "GetLevelCount", 13),
            (Interface::Texture9, "GetLevelDesc", 17),
            (Interface::Texture9, "GetSurfaceLevel", 18),
            (Interface::CubeTexture9, "GetLevelDesc", 17),
            (Interface::CubeTexture9, "GetCubeMapSurface", 18),
            (Interface::VolumeTexture9, "GetLevelDesc", 17),
            (Interface::XBuffer, "GetBufferPointer", 3),
            (Interface::XBuffer, "GetBufferSize", 4),
            (Interface::XEffect, "SetFloat", 30),
            (Interface::XEffect, "SetVector", 34),
            (Interface::XEffect, "SetTexture", 52),
            (Interface::XEffect, "SetTechnique", 58),
            (Interface::XEffect, "Begin", 63),
            (Interface::XEffect, "BeginPass", 64),
            (Interface::XEffect, "EndPass", 66),
            (Interface::XEffect, "End", 67),
        ];

        assert_eq!(METHOD_TABLE.len(), expected.len());
        for &(interface, name, slot) in expected {
            assert_eq!(slot_of(interface, name), Some(slot), "{interface}::{name}");
        }
    }

    #[test]
    fn marker_constants_agree_with_table() {
        assert_eq!(BeginScene::SLOT, 41);
        assert_eq!(BeginScene::INTERFACE, Interface::Device9);
        assert_eq!(DrawPrimitiveUp::NAME, "DrawPrimitiveUP");
        assert_eq!(EffectBegin::NAME, "Begin");
        assert_eq!(GetCubeMapSurface::SLOT, GetSurfaceLevel::SLOT);
    }

    #[test]
    fn null_pointer_is_rejected() {
        assert!(ComPtr::new(std::ptr::null_mut()).is_none());
    }

    // Minimal hand-built COM object: Release at slot 2, GetBufferSize at slot 4.
    #[repr(C)]
    struct FakeBuffer {
        vtbl: *const [*const c_void; 5],
        refs: Cell<u32>,
        size: u32,
    }

    unsafe extern "system" fn fake_release(this: *mut c_void) -> u32 {
        let obj = unsafe { &*(this as *const FakeBuffer) };
        obj.refs.set(obj.refs.get() - 1);
        obj.refs.get()
    }

    unsafe extern "system" fn fake_size(this: *mut c_void) -> u32 {
        unsafe { &*(this as *const FakeBuffer) }.size
    }

    #[test]
    fn dispatches_through_slot_index() {
        let vtbl: [*const c_void; 5] = [
            std::ptr::null(),
            std::ptr::null(),
            fake_release as *const c_void,
            std::ptr::null(),
            fake_size as *const c_void,
        ];
        let mut obj = FakeBuffer {
            vtbl: &vtbl,
            refs: Cell::new(2),
            size: 42,
        };
        let ptr = ComPtr::new(&mut obj as *mut FakeBuffer as *mut c_void).unwrap();

        let size = unsafe { (ptr.method::<GetBufferSize>())(ptr.as_raw()) };
        assert_eq!(size, 42);

        assert_eq!(unsafe { ptr.release() }, 1);
        assert_eq!(obj.refs.get(), 1);
    }
}
