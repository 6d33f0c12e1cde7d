#![allow(dead_code)]

use d3d9_interop::mock::{Call, MockRuntime};
use fxproc::{FxContext, Options};

/// Effect source for the mock compiler.
pub const TEST_FX: &str = "\
technique Red
technique Blur 3
technique Nothing 0
param vTargetSize
param baseMapTexture
param amount
";

/// A context on a fresh mock device.
pub fn context(rt: &MockRuntime) -> FxContext {
    unsafe { FxContext::with_native(rt.native_device(), Box::new(rt.services()), Options::default()) }
}

pub fn begin_scene_count(rt: &MockRuntime) -> usize {
    rt.calls().iter().filter(|c| **c == Call::BeginScene).count()
}

pub fn draw_calls(rt: &MockRuntime) -> Vec<Call> {
    rt.calls()
        .into_iter()
        .filter(|c| matches!(c, Call::DrawPrimitiveUp { .. }))
        .collect()
}

pub fn release_calls(rt: &MockRuntime) -> Vec<u32> {
    rt.calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Release { id, .. } => Some(id),
            _ => None,
        })
        .collect()
}

pub fn double_releases(rt: &MockRuntime) -> usize {
    rt.calls()
        .iter()
        .filter(|c| matches!(c, Call::DoubleRelease { .. }))
        .count()
}
