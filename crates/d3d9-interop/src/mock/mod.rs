//! In-process stand-in for `d3d9.dll` and `d3dx9_*.dll`.
//!
//! [`MockRuntime`] owns a set of Rust-implemented COM objects laid out like
//! the native ones, so the whole runtime can be driven through real vtable
//! dispatch on any platform. Every native call is appended to a call log,
//! reference counts are observable per object, and any call can be made to
//! fail with a chosen `HRESULT`.
//!
//! Image "files" and effect "files" live in an in-memory store. The mock
//! effect compiler understands a line-based source format:
//!
//! ```text
//! technique LowPass 2     // technique name and pass count (default 1)
//! param baseMapTexture    // a settable parameter
//! error message text      // fail compilation with this diagnostic
//! ```

mod objects;
mod services;

pub use objects::{EffectProgram, ObjectKind, TextureData};
pub use services::MockServices;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;

use fxproc_core::ffi::{D3DXIMAGE_INFO, HRESULT};
use fxproc_core::ComPtr;

use crate::device::NativeDevice;
use objects::{MockObject, ObjectData};

/// One observed native call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateDevice {
        device_type: u32,
        behavior: u32,
    },
    CreateTexture {
        width: u32,
        height: u32,
        levels: u32,
        usage: u32,
        format: u32,
        pool: u32,
    },
    CreateCubeTexture {
        size: u32,
        levels: u32,
        usage: u32,
        format: u32,
        pool: u32,
    },
    CreateVolumeTexture {
        width: u32,
        height: u32,
        depth: u32,
        levels: u32,
        usage: u32,
        format: u32,
        pool: u32,
    },
    SetRenderTarget {
        index: u32,
        texture: u32,
        face: u32,
        level: u32,
    },
    BeginScene,
    EndScene,
    Clear {
        flags: u32,
        color: u32,
    },
    SetFvf(u32),
    DrawPrimitiveUp {
        primitive: u32,
        count: u32,
        stride: u32,
        /// x, y, z, rhw, u, v per vertex.
        vertices: Vec<[f32; 6]>,
    },
    SetFloat {
        name: String,
        value: f32,
    },
    SetVector {
        name: String,
        value: [f32; 4],
    },
    SetTexture {
        name: String,
        texture: u32,
    },
    SetTechnique(String),
    EffectBegin {
        passes: u32,
    },
    BeginPass(u32),
    EndPass,
    EffectEnd,
    Release {
        id: u32,
        kind: ObjectKind,
        remaining: u32,
    },
    DoubleRelease {
        id: u32,
    },
    GetImageInfo(String),
    CreateTextureFromFile(String),
    CreateCubeTextureFromFile(String),
    SaveTexture {
        path: String,
        file_format: u32,
        texture: u32,
    },
    CompileEffect(String),
}

/// Contents of the in-memory file store.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFile {
    Image(D3DXIMAGE_INFO),
    EffectSource(String),
}

struct Injected {
    hr: HRESULT,
    remaining: Option<u32>,
}

/// State shared by every mock object of one runtime.
pub(crate) struct MockShared {
    next_id: Cell<u32>,
    objects: RefCell<Vec<*mut MockObject>>,
    calls: RefCell<Vec<Call>>,
    files: RefCell<HashMap<String, MockFile>>,
    failures: RefCell<HashMap<&'static str, Injected>>,
}

impl MockShared {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            next_id: Cell::new(1),
            objects: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            files: RefCell::new(HashMap::new()),
            failures: RefCell::new(HashMap::new()),
        })
    }

    /// Create an object with one reference and return it as a raw COM pointer.
    pub(crate) fn spawn(self: &Rc<Self>, kind: ObjectKind, data: ObjectData) -> *mut c_void {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let raw = Box::into_raw(MockObject::new(self, id, kind, data));
        self.objects.borrow_mut().push(raw);
        raw as *mut c_void
    }

    /// The object at `ptr`, if it belongs to this runtime.
    pub(crate) fn lookup(&self, ptr: *mut c_void) -> Option<&MockObject> {
        let objects = self.objects.borrow();
        let raw = objects.iter().copied().find(|o| *o as *mut c_void == ptr)?;
        // Objects are only freed when `self` is dropped.
        Some(unsafe { &*raw })
    }

    pub(crate) fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    /// The HRESULT to fail `op` with, consuming one use of a counted failure.
    pub(crate) fn injected(&self, op: &'static str) -> Option<HRESULT> {
        let mut failures = self.failures.borrow_mut();
        let entry = failures.get_mut(op)?;
        let hr = entry.hr;
        match &mut entry.remaining {
            None => {}
            Some(0) => return None,
            Some(n) => *n -= 1,
        }
        Some(hr)
    }

    pub(crate) fn file(&self, path: &str) -> Option<MockFile> {
        self.files.borrow().get(path).cloned()
    }

    pub(crate) fn put_file(&self, path: &str, file: MockFile) {
        self.files.borrow_mut().insert(path.to_string(), file);
    }
}

impl Drop for MockShared {
    fn drop(&mut self) {
        for raw in self.objects.get_mut().drain(..) {
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

/// A mock D3D9 installation: factory, device, D3DX services and inspection
/// helpers for tests.
pub struct MockRuntime {
    shared: Rc<MockShared>,
    factory: ComPtr,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        let shared = MockShared::new();
        let factory = shared.spawn(ObjectKind::Factory, ObjectData::None);
        Self {
            factory: ComPtr::new(factory).expect("spawned objects are never null"),
            shared,
        }
    }

    /// The `IDirect3D9` factory. Use with [`crate::create_device`].
    pub fn factory(&self) -> ComPtr {
        self.factory
    }

    /// A factory plus a device created directly, skipping `CreateDevice`.
    pub fn native_device(&self) -> NativeDevice {
        let device = self.shared.spawn(ObjectKind::Device, ObjectData::None);
        NativeDevice {
            factory: self.factory,
            device: ComPtr::new(device).expect("spawned objects are never null"),
        }
    }

    /// D3DX services reading and writing this runtime's file store.
    pub fn services(&self) -> MockServices {
        MockServices::new(self.shared.clone())
    }

    /// Make `op` fail with `hr` from now on. `op` is the native method name
    /// (`"BeginScene"`, `"CreateTexture"`, `"D3DXSaveTextureToFile"`, ...).
    pub fn fail(&self, op: &'static str, hr: HRESULT) {
        self.shared
            .failures
            .borrow_mut()
            .insert(op, Injected { hr, remaining: None });
    }

    /// Make the next `times` calls of `op` fail with `hr`.
    pub fn fail_times(&self, op: &'static str, times: u32, hr: HRESULT) {
        self.shared.failures.borrow_mut().insert(
            op,
            Injected {
                hr,
                remaining: Some(times),
            },
        );
    }

    pub fn add_image(&self, path: &str, info: D3DXIMAGE_INFO) {
        self.shared.put_file(path, MockFile::Image(info));
    }

    pub fn add_effect_file(&self, path: &str, source: &str) {
        self.shared
            .put_file(path, MockFile::EffectSource(source.to_string()));
    }

    pub fn file(&self, path: &str) -> Option<MockFile> {
        self.shared.file(path)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.shared.calls.borrow_mut().clear();
    }

    /// Mock object id of `ptr`, as used in [`Call`] records.
    pub fn id_of(&self, ptr: ComPtr) -> Option<u32> {
        self.shared.lookup(ptr.as_raw()).map(|o| o.id)
    }

    pub fn ref_count(&self, ptr: ComPtr) -> Option<u32> {
        self.shared.lookup(ptr.as_raw()).map(|o| o.refs.get())
    }

    /// Take an extra reference, e.g. to simulate a leak.
    pub fn add_ref(&self, ptr: ComPtr) {
        if let Some(obj) = self.shared.lookup(ptr.as_raw()) {
            obj.refs.set(obj.refs.get() + 1);
        }
    }

    /// Number of objects of `kind` that still hold references.
    pub fn live_objects(&self, kind: ObjectKind) -> usize {
        self.shared
            .objects
            .borrow()
            .iter()
            .map(|o| unsafe { &**o })
            .filter(|o| o.kind == kind && o.refs.get() > 0)
            .count()
    }
}
