mod common;

use std::cell::Cell;
use std::ffi::{c_void, CStr};
use std::rc::Rc;

use d3d9_interop::mock::{Call, MockRuntime, MockServices, ObjectKind};
use d3d9_interop::D3dxServices;
use fxproc::{ErrorKind, FxContext, Options, ResourceKind, ShutdownReport};
use fxproc_core::ffi::{
    D3DRTYPE_CUBETEXTURE, D3DRTYPE_TEXTURE, D3DRTYPE_VOLUMETEXTURE, D3DXIMAGE_INFO, E_FAIL,
    HRESULT, S_OK,
};
use fxproc_core::{ComPtr, Error, PixelFormat};

use common::{context, double_releases, release_calls, TEST_FX};

fn image(width: u32, height: u32, format: u32, resource_type: u32) -> D3DXIMAGE_INFO {
    D3DXIMAGE_INFO {
        Width: width,
        Height: height,
        Depth: 1,
        MipLevels: 1,
        Format: format,
        ResourceType: resource_type,
        ImageFileFormat: 1,
    }
}

#[test]
fn release_is_idempotent() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    let texture = fx.create_render_target(32, 32, "A8R8G8B8", 1).unwrap();
    let effect = fx.effect_from_source(TEST_FX).unwrap();
    let texture_handle = texture.handle().unwrap();
    let effect_handle = effect.handle().unwrap();
    let texture_id = rt.id_of(texture_handle).unwrap();
    let effect_id = rt.id_of(effect_handle).unwrap();

    texture.release();
    texture.release();
    drop(texture);
    effect.release();
    drop(effect);

    assert_eq!(rt.ref_count(texture_handle), Some(0));
    assert_eq!(rt.ref_count(effect_handle), Some(0));
    assert_eq!(release_calls(&rt), [texture_id, effect_id]);
    assert_eq!(double_releases(&rt), 0);
    assert_eq!((fx.live_textures(), fx.live_effects()), (0, 0));
}

#[test]
fn released_resources_reject_use() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    let texture = fx.create_render_target(32, 32, "A8R8G8B8", 1).unwrap();
    let effect = fx.effect_from_source(TEST_FX).unwrap();

    texture.release();
    assert!(!texture.is_live());
    assert_eq!(texture.handle().unwrap_err().kind(), ErrorKind::Precondition);
    assert_eq!(
        effect.set_texture("baseMapTexture", &texture).unwrap_err().kind(),
        ErrorKind::Precondition
    );
    assert_eq!(
        fx.save_texture(&texture, "out.png").unwrap_err().kind(),
        ErrorKind::Precondition
    );

    effect.release();
    assert_eq!(
        effect.set_float("amount", 1.0).unwrap_err().kind(),
        ErrorKind::Precondition
    );
    assert_eq!(
        effect.select_technique("Red").unwrap_err().kind(),
        ErrorKind::Precondition
    );
}

#[test]
fn shutdown_releases_effects_textures_device_then_factory() {
    let rt = MockRuntime::new();
    let native = rt.native_device();
    let device_id = rt.id_of(native.device).unwrap();
    let factory_id = rt.id_of(native.factory).unwrap();
    let fx = unsafe { FxContext::with_native(native, Box::new(rt.services()), Options::default()) };

    let first = fx.create_render_target(8, 8, "A8R8G8B8", 1).unwrap();
    let second = fx.create_render_target_cube(8, "A8R8G8B8", 1).unwrap();
    let effect = fx.effect_from_source(TEST_FX).unwrap();
    let ids = [
        rt.id_of(effect.handle().unwrap()).unwrap(),
        rt.id_of(first.handle().unwrap()).unwrap(),
        rt.id_of(second.handle().unwrap()).unwrap(),
    ];
    rt.clear_calls();

    let report = fx.shutdown();
    assert_eq!(
        report,
        ShutdownReport {
            released_effects: 1,
            released_textures: 2,
            leaked_references: 0,
        }
    );
    assert_eq!(
        release_calls(&rt),
        [ids[0], ids[1], ids[2], device_id, factory_id]
    );

    // Wrappers outliving the context are inert.
    assert!(!first.is_live());
    drop(first);
    drop(second);
    drop(effect);
    assert_eq!(release_calls(&rt).len(), 5);
    assert_eq!(double_releases(&rt), 0);
    assert_eq!(rt.live_objects(ObjectKind::Device), 0);
}

#[test]
fn shutdown_reports_leaked_references() {
    let rt = MockRuntime::new();
    let native = rt.native_device();
    let device = native.device;
    let fx = unsafe { FxContext::with_native(native, Box::new(rt.services()), Options::default()) };
    rt.add_ref(device);

    let report = fx.shutdown();
    assert_eq!(report.leaked_references, 1);
    assert_eq!(rt.ref_count(device), Some(1));
}

#[test]
fn dropping_the_context_shuts_down_once() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    let texture = fx.create_render_target(8, 8, "A8R8G8B8", 1).unwrap();

    drop(fx);
    assert_eq!(rt.live_objects(ObjectKind::Device), 0);
    assert_eq!(rt.live_objects(ObjectKind::Factory), 0);
    assert_eq!(rt.live_objects(ObjectKind::Texture), 0);

    texture.release();
    drop(texture);
    assert_eq!(double_releases(&rt), 0);
}

#[test]
fn compile_errors_carry_diagnostics() {
    let rt = MockRuntime::new();
    let fx = context(&rt);

    let err = fx
        .effect_from_source("technique Red\nerror X3000: syntax error")
        .unwrap_err();
    match &err {
        Error::Compile {
            source_name,
            message,
        } => {
            assert_eq!(source_name, "<string>");
            assert_eq!(message, "(2): error: X3000: syntax error");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert_eq!(rt.live_objects(ObjectKind::Buffer), 0);
    assert_eq!(fx.live_effects(), 0);
}

#[test]
fn missing_effect_file_has_empty_diagnostics() {
    let rt = MockRuntime::new();
    let fx = context(&rt);

    let err = fx.open_effect("missing.fx").unwrap_err();
    assert!(matches!(
        err,
        Error::Compile { ref source_name, ref message }
            if source_name == "missing.fx" && message.is_empty()
    ));
}

#[test]
fn effect_files_compile_with_default_flags() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    rt.add_effect_file("filter_demo.fx", TEST_FX);

    let effect = fx.open_effect("filter_demo.fx").unwrap();
    assert_eq!(effect.name(), "filter_demo.fx");
    assert!(rt
        .calls()
        .contains(&Call::CompileEffect("filter_demo.fx".into())));
    assert_eq!(fx.live_effects(), 1);
}

#[test]
fn load_texture_follows_the_image_kind() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    rt.add_image("lena.jpg", image(512, 512, 20, D3DRTYPE_TEXTURE));
    rt.add_image("sky.dds", image(128, 128, 21, D3DRTYPE_CUBETEXTURE));
    rt.add_image("fog.dds", image(32, 32, 21, D3DRTYPE_VOLUMETEXTURE));

    let lena = fx.load_texture("lena.jpg").unwrap();
    assert_eq!(lena.kind(), ResourceKind::Texture2d);
    assert_eq!(lena.format(), PixelFormat::R8G8B8);
    assert_eq!((lena.width(), lena.height()), (512, 512));
    assert_eq!(lena.name(), "lena.jpg");

    let sky = fx.load_texture("sky.dds").unwrap();
    assert_eq!(sky.kind(), ResourceKind::Cube);

    let err = fx.load_texture("fog.dds").unwrap_err();
    assert!(matches!(err, Error::Load { ref path, .. } if path == "fog.dds"));
    assert_eq!(err.kind(), ErrorKind::Io);

    let err = fx.load_texture("missing.png").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(fx.live_textures(), 2);
}

#[test]
fn save_resolves_the_container_from_the_extension() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    let target = fx.create_render_target(8, 8, "A8R8G8B8", 1).unwrap();
    rt.clear_calls();

    let err = fx.save_texture(&target, "out.xyz").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
    assert!(rt.calls().is_empty());

    fx.save_texture(&target, "OUT.PNG").unwrap();
    assert!(matches!(
        rt.calls().last(),
        Some(Call::SaveTexture { file_format: 3, .. })
    ));

    rt.fail("D3DXSaveTextureToFile", E_FAIL);
    let err = fx.save_texture(&target, "out.bmp").unwrap_err();
    assert!(matches!(err, Error::Save { ref path, .. } if path == "out.bmp"));
    assert_eq!(err.kind(), ErrorKind::Io);
}

/// Mock services whose 2D loads return `recycled` when it is set, the way a
/// driver hands a freed address to the next object.
struct RecyclingServices {
    inner: MockServices,
    recycled: Rc<Cell<Option<ComPtr>>>,
}

impl D3dxServices for RecyclingServices {
    unsafe fn get_image_info_from_file(&self, path: &CStr, info: &mut D3DXIMAGE_INFO) -> HRESULT {
        unsafe { self.inner.get_image_info_from_file(path, info) }
    }

    unsafe fn create_texture_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        match self.recycled.take() {
            Some(object) => {
                *texture = object.as_raw();
                S_OK
            }
            None => unsafe { self.inner.create_texture_from_file(device, path, format, texture) },
        }
    }

    unsafe fn create_cube_texture_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        unsafe { self.inner.create_cube_texture_from_file(device, path, format, texture) }
    }

    unsafe fn save_texture_to_file(&self, path: &CStr, file_format: u32, texture: ComPtr) -> HRESULT {
        unsafe { self.inner.save_texture_to_file(path, file_format, texture) }
    }

    unsafe fn create_effect_from_file(
        &self,
        device: ComPtr,
        path: &CStr,
        flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT {
        unsafe { self.inner.create_effect_from_file(device, path, flags, effect, errors) }
    }

    unsafe fn create_effect(
        &self,
        device: ComPtr,
        source: &[u8],
        flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT {
        unsafe { self.inner.create_effect(device, source, flags, effect, errors) }
    }
}

#[test]
fn released_wrapper_stays_dead_when_its_address_is_reused() {
    let rt = MockRuntime::new();
    let recycled = Rc::new(Cell::new(None));
    let services = RecyclingServices {
        inner: rt.services(),
        recycled: recycled.clone(),
    };
    let mut fx =
        unsafe { FxContext::with_native(rt.native_device(), Box::new(services), Options::default()) };
    let effect = fx.effect_from_source(TEST_FX).unwrap();
    rt.add_image("a.png", image(64, 32, 21, D3DRTYPE_TEXTURE));

    let old = fx.load_texture("a.png").unwrap();
    let object = old.handle().unwrap();
    fx.set_render_target(&old, 0, 0).unwrap();
    old.release();
    assert_eq!(rt.ref_count(object), Some(0));

    // A new object at the same address, with its own reference.
    rt.add_ref(object);
    recycled.set(Some(object));
    let new = fx.load_texture("a.png").unwrap();
    assert_eq!(new.handle().unwrap(), object);

    assert!(!old.is_live());
    assert_eq!(old.handle().unwrap_err().kind(), ErrorKind::Precondition);
    assert_eq!(
        fx.draw_quad(&effect, "Red").unwrap_err().kind(),
        ErrorKind::Precondition
    );

    old.release();
    drop(old);
    assert!(new.is_live());
    assert_eq!(rt.ref_count(object), Some(1));

    drop(new);
    assert_eq!(rt.ref_count(object), Some(0));
    assert_eq!(double_releases(&rt), 0);
}
