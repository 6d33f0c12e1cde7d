//! Rust-implemented COM objects with D3D9-compatible vtables.
//!
//! Every object starts with a vtable pointer, so a `ComPtr` to it dispatches
//! exactly like a native object. Method implementations record a [`Call`]
//! and consult the shared failure table before doing anything.

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_void, CStr};
use std::rc::{Rc, Weak};

use fxproc_core::ffi::{
    D3DERR_INVALIDCALL, D3DPT_TRIANGLELIST, D3DPT_TRIANGLESTRIP, D3DPRESENT_PARAMETERS,
    D3DRTYPE_CUBETEXTURE, D3DRTYPE_SURFACE, D3DRTYPE_TEXTURE, D3DRTYPE_VOLUMETEXTURE,
    D3DSURFACE_DESC, D3DVOLUME_DESC, D3DXVECTOR4, HRESULT, S_OK,
};
use fxproc_core::vtable::*;

use super::{Call, MockShared};

pub(crate) const VTABLE_LEN: usize = 96;

/// What a mock object pretends to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Factory,
    Device,
    Texture,
    CubeTexture,
    VolumeTexture,
    Surface,
    Buffer,
    Effect,
}

impl ObjectKind {
    fn resource_type(self) -> u32 {
        match self {
            ObjectKind::Texture => D3DRTYPE_TEXTURE,
            ObjectKind::CubeTexture => D3DRTYPE_CUBETEXTURE,
            ObjectKind::VolumeTexture => D3DRTYPE_VOLUMETEXTURE,
            ObjectKind::Surface => D3DRTYPE_SURFACE,
            _ => 0,
        }
    }
}

/// Dimensions and format of a mock texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub levels: u32,
    pub format: u32,
    pub usage: u32,
    pub pool: u32,
}

impl TextureData {
    fn level(&self, level: u32) -> Option<(u32, u32, u32)> {
        if level >= self.levels {
            return None;
        }
        let shrink = |v: u32| (v >> level).max(1);
        Some((shrink(self.width), shrink(self.height), shrink(self.depth)))
    }
}

/// Compiled form of a mock effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectProgram {
    /// (technique name, pass count)
    pub techniques: Vec<(String, u32)>,
    pub parameters: Vec<String>,
}

pub(crate) enum ObjectData {
    None,
    Texture(TextureData),
    Surface { texture: u32, face: u32, level: u32 },
    Buffer(Vec<u8>),
    Effect {
        program: EffectProgram,
        technique: RefCell<Option<String>>,
    },
}

#[repr(C)]
pub(crate) struct MockObject {
    // Must stay the first field: COM callers read the vtable through it.
    vtbl: *const *const c_void,
    pub(crate) id: u32,
    pub(crate) kind: ObjectKind,
    pub(crate) refs: Cell<u32>,
    pub(crate) data: ObjectData,
    shared: Weak<MockShared>,
    _vtable: Box<[*const c_void; VTABLE_LEN]>,
}

impl MockObject {
    pub(crate) fn new(
        shared: &Rc<MockShared>,
        id: u32,
        kind: ObjectKind,
        data: ObjectData,
    ) -> Box<Self> {
        let vtable = vtable_for(kind);
        Box::new(Self {
            vtbl: vtable.as_ptr(),
            id,
            kind,
            refs: Cell::new(1),
            data,
            shared: Rc::downgrade(shared),
            _vtable: vtable,
        })
    }

    pub(crate) fn texture(&self) -> Option<TextureData> {
        match &self.data {
            ObjectData::Texture(t) => Some(*t),
            _ => None,
        }
    }

    fn shared(&self) -> Rc<MockShared> {
        self.shared
            .upgrade()
            .expect("mock object used after its MockRuntime was dropped")
    }
}

/// # Safety
///
/// `this` must be a pointer handed out by [`MockShared::spawn`].
unsafe fn this<'a>(this: *mut c_void) -> &'a MockObject {
    unsafe { &*(this as *const MockObject) }
}

unsafe fn name_of(handle: *const c_char) -> String {
    if handle.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(handle) }.to_string_lossy().into_owned()
}

macro_rules! install {
    ($table:expr, $method:ty, $f:expr) => {{
        let f: <$method as ComMethod>::Fn = $f;
        $table[<$method as ComMethod>::SLOT] = f as *const c_void;
    }};
}

fn vtable_for(kind: ObjectKind) -> Box<[*const c_void; VTABLE_LEN]> {
    let mut v = Box::new([std::ptr::null::<c_void>(); VTABLE_LEN]);
    install!(v, Release, release);
    match kind {
        ObjectKind::Factory => {
            install!(v, CreateDevice, create_device);
        }
        ObjectKind::Device => {
            install!(v, CreateTexture, create_texture);
            install!(v, CreateVolumeTexture, create_volume_texture);
            install!(v, CreateCubeTexture, create_cube_texture);
            install!(v, SetRenderTarget, set_render_target);
            install!(v, BeginScene, begin_scene);
            install!(v, EndScene, end_scene);
            install!(v, Clear, clear);
            install!(v, DrawPrimitiveUp, draw_primitive_up);
            install!(v, SetFvf, set_fvf);
        }
        ObjectKind::Texture => {
            install!(v, GetType, get_type);
            install!(v, GetLevelCount, get_level_count);
            install!(v, TextureGetLevelDesc, get_level_desc);
            install!(v, GetSurfaceLevel, get_surface_level);
        }
        ObjectKind::CubeTexture => {
            install!(v, GetType, get_type);
            install!(v, GetLevelCount, get_level_count);
            install!(v, CubeGetLevelDesc, get_level_desc);
            install!(v, GetCubeMapSurface, get_cube_map_surface);
        }
        ObjectKind::VolumeTexture => {
            install!(v, GetType, get_type);
            install!(v, GetLevelCount, get_level_count);
            install!(v, VolumeGetLevelDesc, get_volume_level_desc);
        }
        ObjectKind::Surface => {}
        ObjectKind::Buffer => {
            install!(v, GetBufferPointer, get_buffer_pointer);
            install!(v, GetBufferSize, get_buffer_size);
        }
        ObjectKind::Effect => {
            install!(v, SetFloat, set_float);
            install!(v, SetVector, set_vector);
            install!(v, SetTexture, set_texture);
            install!(v, SetTechnique, set_technique);
            install!(v, EffectBegin, effect_begin);
            install!(v, BeginPass, begin_pass);
            install!(v, EndPass, end_pass);
            install!(v, EffectEnd, effect_end);
        }
    }
    v
}

// ---------------------------------------------------------------------------
// IUnknown
// ---------------------------------------------------------------------------

unsafe extern "system" fn release(this_: *mut c_void) -> u32 {
    let obj = unsafe { this(this_) };
    let shared = obj.shared();
    let refs = obj.refs.get();
    if refs == 0 {
        shared.record(Call::DoubleRelease { id: obj.id });
        return 0;
    }
    obj.refs.set(refs - 1);
    shared.record(Call::Release {
        id: obj.id,
        kind: obj.kind,
        remaining: refs - 1,
    });
    refs - 1
}

// ---------------------------------------------------------------------------
// IDirect3D9
// ---------------------------------------------------------------------------

unsafe extern "system" fn create_device(
    this_: *mut c_void,
    _adapter: u32,
    device_type: u32,
    _window: *mut c_void,
    behavior: u32,
    _params: *mut D3DPRESENT_PARAMETERS,
    out: *mut *mut c_void,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::CreateDevice {
        device_type,
        behavior,
    });
    if let Some(hr) = shared.injected("CreateDevice") {
        return hr;
    }
    let device = shared.spawn(ObjectKind::Device, ObjectData::None);
    unsafe { *out = device };
    S_OK
}

// ---------------------------------------------------------------------------
// IDirect3DDevice9
// ---------------------------------------------------------------------------

unsafe extern "system" fn create_texture(
    this_: *mut c_void,
    width: u32,
    height: u32,
    levels: u32,
    usage: u32,
    format: u32,
    pool: u32,
    out: *mut *mut c_void,
    _shared_handle: *mut c_void,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::CreateTexture {
        width,
        height,
        levels,
        usage,
        format,
        pool,
    });
    if let Some(hr) = shared.injected("CreateTexture") {
        return hr;
    }
    let data = TextureData {
        width,
        height,
        depth: 1,
        levels: levels.max(1),
        format,
        usage,
        pool,
    };
    unsafe { *out = shared.spawn(ObjectKind::Texture, ObjectData::Texture(data)) };
    S_OK
}

unsafe extern "system" fn create_volume_texture(
    this_: *mut c_void,
    width: u32,
    height: u32,
    depth: u32,
    levels: u32,
    usage: u32,
    format: u32,
    pool: u32,
    out: *mut *mut c_void,
    _shared_handle: *mut c_void,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::CreateVolumeTexture {
        width,
        height,
        depth,
        levels,
        usage,
        format,
        pool,
    });
    if let Some(hr) = shared.injected("CreateVolumeTexture") {
        return hr;
    }
    let data = TextureData {
        width,
        height,
        depth,
        levels: levels.max(1),
        format,
        usage,
        pool,
    };
    unsafe { *out = shared.spawn(ObjectKind::VolumeTexture, ObjectData::Texture(data)) };
    S_OK
}

unsafe extern "system" fn create_cube_texture(
    this_: *mut c_void,
    size: u32,
    levels: u32,
    usage: u32,
    format: u32,
    pool: u32,
    out: *mut *mut c_void,
    _shared_handle: *mut c_void,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::CreateCubeTexture {
        size,
        levels,
        usage,
        format,
        pool,
    });
    if let Some(hr) = shared.injected("CreateCubeTexture") {
        return hr;
    }
    let data = TextureData {
        width: size,
        height: size,
        depth: 1,
        levels: levels.max(1),
        format,
        usage,
        pool,
    };
    unsafe { *out = shared.spawn(ObjectKind::CubeTexture, ObjectData::Texture(data)) };
    S_OK
}

unsafe extern "system" fn set_render_target(
    this_: *mut c_void,
    index: u32,
    surface: *mut c_void,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    let (texture, face, level) = match shared.lookup(surface) {
        Some(obj) => match obj.data {
            ObjectData::Surface {
                texture,
                face,
                level,
            } => (texture, face, level),
            _ => return D3DERR_INVALIDCALL,
        },
        None => return D3DERR_INVALIDCALL,
    };
    shared.record(Call::SetRenderTarget {
        index,
        texture,
        face,
        level,
    });
    shared.injected("SetRenderTarget").unwrap_or(S_OK)
}

unsafe extern "system" fn begin_scene(this_: *mut c_void) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::BeginScene);
    shared.injected("BeginScene").unwrap_or(S_OK)
}

unsafe extern "system" fn end_scene(this_: *mut c_void) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::EndScene);
    shared.injected("EndScene").unwrap_or(S_OK)
}

unsafe extern "system" fn clear(
    this_: *mut c_void,
    _count: u32,
    _rects: *const c_void,
    flags: u32,
    color: u32,
    _z: f32,
    _stencil: u32,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::Clear { flags, color });
    shared.injected("Clear").unwrap_or(S_OK)
}

unsafe extern "system" fn draw_primitive_up(
    this_: *mut c_void,
    primitive: u32,
    count: u32,
    data: *const c_void,
    stride: u32,
) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    let vertex_count = match primitive {
        D3DPT_TRIANGLESTRIP => count + 2,
        D3DPT_TRIANGLELIST => count * 3,
        _ => 0,
    };
    let vertices = (0..vertex_count as usize)
        .map(|i| unsafe {
            let at = (data as *const u8).add(i * stride as usize) as *const [f32; 6];
            at.read_unaligned()
        })
        .collect();
    shared.record(Call::DrawPrimitiveUp {
        primitive,
        count,
        stride,
        vertices,
    });
    shared.injected("DrawPrimitiveUP").unwrap_or(S_OK)
}

unsafe extern "system" fn set_fvf(this_: *mut c_void, fvf: u32) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::SetFvf(fvf));
    shared.injected("SetFVF").unwrap_or(S_OK)
}

// ---------------------------------------------------------------------------
// IDirect3DBaseTexture9 and friends
// ---------------------------------------------------------------------------

unsafe extern "system" fn get_type(this_: *mut c_void) -> u32 {
    let obj = unsafe { this(this_) };
    if obj.shared().injected("GetType").is_some() {
        return 0;
    }
    obj.kind.resource_type()
}

unsafe extern "system" fn get_level_count(this_: *mut c_void) -> u32 {
    unsafe { this(this_) }.texture().map_or(0, |t| t.levels)
}

unsafe extern "system" fn get_level_desc(
    this_: *mut c_void,
    level: u32,
    desc: *mut D3DSURFACE_DESC,
) -> HRESULT {
    let obj = unsafe { this(this_) };
    let Some(tex) = obj.texture() else {
        return D3DERR_INVALIDCALL;
    };
    let Some((width, height, _)) = tex.level(level) else {
        return D3DERR_INVALIDCALL;
    };
    unsafe {
        *desc = D3DSURFACE_DESC {
            Format: tex.format,
            Type: D3DRTYPE_SURFACE,
            Usage: tex.usage,
            Pool: tex.pool,
            MultiSampleType: 0,
            MultiSampleQuality: 0,
            Width: width,
            Height: height,
        };
    }
    S_OK
}

unsafe extern "system" fn get_volume_level_desc(
    this_: *mut c_void,
    level: u32,
    desc: *mut D3DVOLUME_DESC,
) -> HRESULT {
    let obj = unsafe { this(this_) };
    let Some(tex) = obj.texture() else {
        return D3DERR_INVALIDCALL;
    };
    let Some((width, height, depth)) = tex.level(level) else {
        return D3DERR_INVALIDCALL;
    };
    unsafe {
        *desc = D3DVOLUME_DESC {
            Format: tex.format,
            Type: fxproc_core::ffi::D3DRTYPE_VOLUME,
            Usage: tex.usage,
            Pool: tex.pool,
            Width: width,
            Height: height,
            Depth: depth,
        };
    }
    S_OK
}

fn spawn_surface(obj: &MockObject, face: u32, level: u32, out: *mut *mut c_void) -> HRESULT {
    let shared = obj.shared();
    if let Some(hr) = shared.injected("GetSurface") {
        return hr;
    }
    match obj.texture() {
        Some(tex) if level < tex.levels && face < 6 => {
            let surface = shared.spawn(
                ObjectKind::Surface,
                ObjectData::Surface {
                    texture: obj.id,
                    face,
                    level,
                },
            );
            unsafe { *out = surface };
            S_OK
        }
        _ => D3DERR_INVALIDCALL,
    }
}

unsafe extern "system" fn get_surface_level(
    this_: *mut c_void,
    level: u32,
    out: *mut *mut c_void,
) -> HRESULT {
    spawn_surface(unsafe { this(this_) }, 0, level, out)
}

unsafe extern "system" fn get_cube_map_surface(
    this_: *mut c_void,
    face: u32,
    level: u32,
    out: *mut *mut c_void,
) -> HRESULT {
    spawn_surface(unsafe { this(this_) }, face, level, out)
}

// ---------------------------------------------------------------------------
// ID3DXBuffer
// ---------------------------------------------------------------------------

unsafe extern "system" fn get_buffer_pointer(this_: *mut c_void) -> *mut c_void {
    match &unsafe { this(this_) }.data {
        ObjectData::Buffer(bytes) => bytes.as_ptr() as *mut c_void,
        _ => std::ptr::null_mut(),
    }
}

unsafe extern "system" fn get_buffer_size(this_: *mut c_void) -> u32 {
    match &unsafe { this(this_) }.data {
        ObjectData::Buffer(bytes) => bytes.len() as u32,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// ID3DXEffect
// ---------------------------------------------------------------------------

fn effect_parameter(obj: &MockObject, name: &str) -> HRESULT {
    match &obj.data {
        ObjectData::Effect { program, .. } if program.parameters.iter().any(|p| p == name) => S_OK,
        _ => D3DERR_INVALIDCALL,
    }
}

unsafe extern "system" fn set_float(this_: *mut c_void, handle: *const c_char, value: f32) -> HRESULT {
    let obj = unsafe { this(this_) };
    let name = unsafe { name_of(handle) };
    let hr = effect_parameter(obj, &name);
    obj.shared().record(Call::SetFloat { name, value });
    hr
}

unsafe extern "system" fn set_vector(
    this_: *mut c_void,
    handle: *const c_char,
    vector: *const D3DXVECTOR4,
) -> HRESULT {
    let obj = unsafe { this(this_) };
    let name = unsafe { name_of(handle) };
    let v = unsafe { *vector };
    let hr = effect_parameter(obj, &name);
    obj.shared().record(Call::SetVector {
        name,
        value: [v.x, v.y, v.z, v.w],
    });
    hr
}

unsafe extern "system" fn set_texture(
    this_: *mut c_void,
    handle: *const c_char,
    texture: *mut c_void,
) -> HRESULT {
    let obj = unsafe { this(this_) };
    let shared = obj.shared();
    let name = unsafe { name_of(handle) };
    let Some(texture) = shared.lookup(texture).map(|t| t.id) else {
        return D3DERR_INVALIDCALL;
    };
    let hr = effect_parameter(obj, &name);
    shared.record(Call::SetTexture { name, texture });
    hr
}

unsafe extern "system" fn set_technique(this_: *mut c_void, handle: *const c_char) -> HRESULT {
    let obj = unsafe { this(this_) };
    let name = unsafe { name_of(handle) };
    obj.shared().record(Call::SetTechnique(name.clone()));
    match &obj.data {
        ObjectData::Effect { program, technique }
            if program.techniques.iter().any(|(t, _)| *t == name) =>
        {
            *technique.borrow_mut() = Some(name);
            S_OK
        }
        _ => D3DERR_INVALIDCALL,
    }
}

unsafe extern "system" fn effect_begin(this_: *mut c_void, passes: *mut u32, _flags: u32) -> HRESULT {
    let obj = unsafe { this(this_) };
    let shared = obj.shared();
    if let Some(hr) = shared.injected("Begin") {
        return hr;
    }
    let ObjectData::Effect { program, technique } = &obj.data else {
        return D3DERR_INVALIDCALL;
    };
    let selected = technique.borrow();
    let Some(count) = selected.as_ref().and_then(|name| {
        program
            .techniques
            .iter()
            .find(|(t, _)| t == name)
            .map(|(_, n)| *n)
    }) else {
        return D3DERR_INVALIDCALL;
    };
    shared.record(Call::EffectBegin { passes: count });
    unsafe { *passes = count };
    S_OK
}

unsafe extern "system" fn begin_pass(this_: *mut c_void, pass: u32) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::BeginPass(pass));
    shared.injected("BeginPass").unwrap_or(S_OK)
}

unsafe extern "system" fn end_pass(this_: *mut c_void) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::EndPass);
    S_OK
}

unsafe extern "system" fn effect_end(this_: *mut c_void) -> HRESULT {
    let shared = unsafe { this(this_) }.shared();
    shared.record(Call::EffectEnd);
    S_OK
}
