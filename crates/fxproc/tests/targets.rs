mod common;

use d3d9_interop::mock::{Call, MockRuntime, ObjectKind};
use fxproc::{ErrorKind, Extent, ResourceKind, TargetState};
use fxproc_core::ffi::{D3DERR_INVALIDCALL, D3DERR_OUTOFVIDEOMEMORY};
use fxproc_core::Error;

use common::{context, draw_calls, TEST_FX};

#[test]
fn unknown_format_fails_before_allocation() {
    let rt = MockRuntime::new();
    let fx = context(&rt);

    let err = fx.create_render_target(64, 64, "NOT_A_FORMAT", 1).unwrap_err();
    assert!(matches!(err, Error::UnknownFormat(ref token) if token == "NOT_A_FORMAT"));
    assert_eq!(err.kind(), ErrorKind::Lookup);

    assert!(fx.create_render_target_cube(64, "NOT_A_FORMAT", 1).is_err());
    assert!(fx.create_volume_texture(8, 8, "NOT_A_FORMAT", 1, 2).is_err());
    assert!(rt.calls().is_empty());
}

#[test]
fn allocation_failure_is_a_creation_error() {
    let rt = MockRuntime::new();
    let fx = context(&rt);
    rt.fail("CreateTexture", D3DERR_OUTOFVIDEOMEMORY);

    let err = fx.create_render_target(4096, 4096, "A32B32G32R32F", 1).unwrap_err();
    assert!(matches!(err, Error::Creation { .. }));
    assert_eq!(err.kind(), ErrorKind::NativeCall);
    assert_eq!(err.hresult(), Some(D3DERR_OUTOFVIDEOMEMORY));
    assert_eq!(fx.live_textures(), 0);
}

#[test]
fn created_textures_describe_themselves() {
    let rt = MockRuntime::new();
    let fx = context(&rt);

    let target = fx.create_render_target(320, 200, "A8R8G8B8", 3).unwrap();
    assert_eq!(target.kind(), ResourceKind::Texture2d);
    assert_eq!((target.width(), target.height()), (320, 200));
    assert_eq!((target.levels(), target.slices()), (3, 0));
    assert_eq!(target.name(), "<renderTarget>");

    let cube = fx.create_render_target_cube(64, "R32F", 1).unwrap();
    assert_eq!(cube.kind(), ResourceKind::Cube);
    assert_eq!((cube.width(), cube.height()), (64, 64));
    assert_eq!(cube.name(), "<renderTargetCube>");

    let volume = fx.create_volume_texture(16, 8, "L8", 1, 4).unwrap();
    assert_eq!(volume.kind(), ResourceKind::Volume);
    assert_eq!((volume.width(), volume.height(), volume.slices()), (16, 8, 4));
    assert_eq!(volume.name(), "<volumeTexture>");

    let shown = target.to_string();
    assert!(shown.starts_with("width=320 height=200 format=A8R8G8B8 levels=3 slices=0 handle=0x"));
    assert!(shown.ends_with("name=\"<renderTarget>\""));

    assert_eq!(fx.live_textures(), 3);
    assert_eq!(
        rt.calls()[2],
        Call::CreateVolumeTexture {
            width: 16,
            height: 8,
            depth: 4,
            levels: 1,
            usage: 0,
            format: 50,
            pool: 1,
        }
    );
}

#[test]
fn mip_level_halves_the_extent() {
    let rt = MockRuntime::new();
    let mut fx = context(&rt);
    let effect = fx.effect_from_source(TEST_FX).unwrap();
    let target = fx.create_render_target(256, 100, "A8R8G8B8", 4).unwrap();

    fx.set_render_target(&target, 0, 0).unwrap();
    assert_eq!(
        fx.pipeline().extent(),
        Some(Extent {
            width: 256.0,
            height: 100.0
        })
    );

    fx.set_render_target(&target, 2, 0).unwrap();
    assert_eq!(
        fx.pipeline().extent(),
        Some(Extent {
            width: 64.0,
            height: 25.0
        })
    );
    assert_eq!(
        rt.calls().last(),
        Some(&Call::SetRenderTarget {
            index: 0,
            texture: rt.id_of(target.handle().unwrap()).unwrap(),
            face: 0,
            level: 2,
        })
    );

    rt.clear_calls();
    fx.draw_quad(&effect, "Red").unwrap();
    let Call::DrawPrimitiveUp { vertices, .. } = &draw_calls(&rt)[0] else {
        unreachable!();
    };
    assert_eq!(vertices[3][..2], [63.5, 24.5]);
}

#[test]
fn cube_faces_map_in_order() {
    let rt = MockRuntime::new();
    let mut fx = context(&rt);
    let cube = fx.create_render_target_cube(32, "A8R8G8B8", 1).unwrap();
    let id = rt.id_of(cube.handle().unwrap()).unwrap();

    for face in 0..6 {
        fx.set_render_target(&cube, 0, face).unwrap();
        assert_eq!(
            rt.calls().last(),
            Some(&Call::SetRenderTarget {
                index: 0,
                texture: id,
                face,
                level: 0,
            })
        );
    }

    rt.clear_calls();
    let err = fx.set_render_target(&cube, 0, 6).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(rt.calls().is_empty());
}

#[test]
fn volume_textures_are_not_render_targets() {
    let rt = MockRuntime::new();
    let mut fx = context(&rt);
    let volume = fx.create_volume_texture(8, 8, "A8R8G8B8", 1, 4).unwrap();
    let flat = fx.create_render_target(8, 8, "A8R8G8B8", 1).unwrap();

    let err = fx.set_render_target(&volume, 0, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(fx.pipeline().state(), TargetState::NoTarget);

    let err = fx.copy_level_to_volume_slice(&flat, &volume, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    let err = fx.copy_level_to_volume_slice(&flat, &volume, 4).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    let err = fx.copy_level_to_volume_slice(&volume, &flat, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn bind_always_releases_the_surface() {
    let rt = MockRuntime::new();
    let mut fx = context(&rt);
    let first = fx.create_render_target(64, 32, "A8R8G8B8", 1).unwrap();
    let second = fx.create_render_target(16, 16, "A8R8G8B8", 1).unwrap();

    fx.set_render_target(&first, 0, 0).unwrap();
    assert_eq!(rt.live_objects(ObjectKind::Surface), 0);

    rt.fail("SetRenderTarget", D3DERR_INVALIDCALL);
    let err = fx.set_render_target(&second, 0, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NativeCall);
    assert_eq!(rt.live_objects(ObjectKind::Surface), 0);
    assert_eq!(
        fx.pipeline().extent(),
        Some(Extent {
            width: 64.0,
            height: 32.0
        })
    );
}

#[test]
fn released_target_can_not_be_drawn_to() {
    let rt = MockRuntime::new();
    let mut fx = context(&rt);
    let effect = fx.effect_from_source(TEST_FX).unwrap();
    let target = fx.create_render_target(64, 64, "A8R8G8B8", 1).unwrap();
    fx.set_render_target(&target, 0, 0).unwrap();

    target.release();
    rt.clear_calls();

    assert_eq!(
        fx.clear(0, 0, 0, 0).unwrap_err().kind(),
        ErrorKind::Precondition
    );
    assert_eq!(
        fx.draw_quad(&effect, "Red").unwrap_err().kind(),
        ErrorKind::Precondition
    );
    assert_eq!(
        fx.set_render_target(&target, 0, 0).unwrap_err().kind(),
        ErrorKind::Precondition
    );
    assert!(rt.calls().is_empty());
}
