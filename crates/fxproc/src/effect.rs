//! Compiled effects: parameter binding and draw submission.

use std::ffi::{c_void, CStr};
use std::fmt;
use std::rc::Rc;

use fxproc_core::ffi::{failed, D3DPT_TRIANGLELIST, D3DPT_TRIANGLESTRIP, D3DXVECTOR4, HRESULT};
use fxproc_core::vtable::{
    BeginPass, BeginScene, DrawPrimitiveUp, EffectBegin, EffectEnd, EndPass, EndScene,
    GetBufferPointer, GetBufferSize, SetFloat, SetFvf, SetTechnique, SetTexture, SetVector,
};
use fxproc_core::{check, ComPtr, Error, Result};
use tracing::{debug, error, trace, warn};

use crate::context::{c_name, Shared};
use crate::pipeline::{Extent, RenderPipeline};
use crate::registry::HandleId;
use crate::texture::Texture;
use crate::vertex::{quad, AsBytes, Triangles, Vertex};

/// Effect parameter that receives the bound target's size and its
/// reciprocal before every draw, if the effect declares it.
pub const TARGET_SIZE_PARAMETER: &str = "vTargetSize";

/// One compiled `ID3DXEffect`.
pub struct Effect {
    shared: Rc<Shared>,
    handle: ComPtr,
    id: HandleId,
    name: String,
}

impl Effect {
    /// Turn the outputs of a D3DX compile call into an `Effect` or a
    /// [`Error::Compile`]. Takes ownership of `raw` and `errors`.
    pub(crate) fn from_compiler(
        shared: &Rc<Shared>,
        hr: HRESULT,
        raw: *mut c_void,
        errors: *mut c_void,
        name: String,
    ) -> Result<Self> {
        let diagnostics = ComPtr::new(errors)
            .map(|buffer| unsafe { take_diagnostics(buffer) })
            .unwrap_or_default();

        let handle = match ComPtr::new(raw) {
            Some(handle) if !failed(hr) => handle,
            leftover => {
                if let Some(handle) = leftover {
                    unsafe { handle.release() };
                }
                error!("can't compile effect \"{name}\" (HRESULT {:#010x})", hr as u32);
                if !diagnostics.is_empty() {
                    error!("{diagnostics}");
                }
                return Err(Error::Compile {
                    source_name: name,
                    message: diagnostics,
                });
            }
        };
        if !diagnostics.is_empty() {
            warn!("\"{name}\": {diagnostics}");
        }

        let id = shared.registry.borrow_mut().effects.insert(handle, &name);
        debug!("compiled effect \"{name}\" ({handle})");
        Ok(Self {
            shared: shared.clone(),
            handle,
            id,
            name,
        })
    }

    /// File path, or `<string>` for effects compiled from source text.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_live(&self) -> bool {
        self.shared.registry.borrow().effects.contains(self.id)
    }

    /// The native handle, or a precondition error once released.
    pub fn handle(&self) -> Result<ComPtr> {
        if self.is_live() {
            Ok(self.handle)
        } else {
            Err(Error::precondition(format!(
                "effect \"{}\" has been released",
                self.name
            )))
        }
    }

    /// Drop the native reference now. Later calls do nothing.
    pub fn release(&self) {
        let removed = self.shared.registry.borrow_mut().effects.remove(self.id);
        if let Some(handle) = removed {
            unsafe { handle.release() };
            debug!("released effect \"{}\"", self.name);
        }
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    pub fn set_float(&self, name: &str, x: f32) -> Result<()> {
        let effect = self.handle()?;
        let c_name = c_name(name)?;
        let hr = unsafe { (effect.method::<SetFloat>())(effect.as_raw(), c_name.as_ptr(), x) };
        parameter_result(hr, name)
    }

    pub fn set_float4(&self, name: &str, x: f32, y: f32, z: f32, w: f32) -> Result<()> {
        let effect = self.handle()?;
        unsafe { set_vector(effect, name, &D3DXVECTOR4 { x, y, z, w }) }
    }

    /// Like [`set_float4`](Self::set_float4) for parameters the effect may
    /// not declare. Returns whether the value was bound.
    pub fn set_optional_float4(&self, name: &str, x: f32, y: f32, z: f32, w: f32) -> bool {
        match self.set_float4(name, x, y, z, w) {
            Ok(()) => true,
            Err(e) => {
                trace!("optional parameter skipped: {e}");
                false
            }
        }
    }

    pub fn set_texture(&self, name: &str, texture: &Texture) -> Result<()> {
        let effect = self.handle()?;
        let texture = texture.handle()?;
        let c_name = c_name(name)?;
        let hr = unsafe {
            (effect.method::<SetTexture>())(effect.as_raw(), c_name.as_ptr(), texture.as_raw())
        };
        parameter_result(hr, name)
    }

    /// Make `name` the active technique. Does not touch the device.
    pub fn select_technique(&self, name: &str) -> Result<()> {
        let effect = self.handle()?;
        unsafe { set_technique(effect, name) }
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    /// Draw one quad covering the bound render target with every pass of
    /// `technique`.
    pub fn draw_quad(&self, pipeline: &RenderPipeline, technique: &str) -> Result<()> {
        let (effect, extent) = self.prepare_draw(pipeline)?;
        let vertices = quad(extent.width, extent.height);
        unsafe {
            self.draw(
                effect,
                extent,
                technique,
                D3DPT_TRIANGLESTRIP,
                2,
                vertices.as_bytes().as_ptr() as *const c_void,
            )
        }
    }

    /// Draw `triangles` as a triangle list with every pass of `technique`.
    ///
    /// An empty list is checked like any other draw, then submits nothing.
    pub fn draw_triangles(
        &self,
        pipeline: &RenderPipeline,
        triangles: &Triangles,
        technique: &str,
    ) -> Result<()> {
        let (effect, extent) = self.prepare_draw(pipeline)?;
        if triangles.is_empty() {
            debug!("\"{}\": no triangles to draw with {technique}", self.name);
            return Ok(());
        }
        let count = u32::try_from(triangles.len())
            .map_err(|_| Error::precondition("too many triangles for one draw call"))?;
        unsafe {
            self.draw(
                effect,
                extent,
                technique,
                D3DPT_TRIANGLELIST,
                count,
                triangles.as_ptr(),
            )
        }
    }

    fn prepare_draw(&self, pipeline: &RenderPipeline) -> Result<(ComPtr, Extent)> {
        let effect = self.handle()?;
        if !Rc::ptr_eq(&self.shared, pipeline.shared()) {
            return Err(Error::precondition(format!(
                "effect \"{}\" belongs to another context",
                self.name
            )));
        }
        Ok((effect, pipeline.bound_extent()?))
    }

    /// Run one scene: target size, technique, then every pass. The effect
    /// and the scene are always ended once begun.
    ///
    /// # Safety
    ///
    /// `vertices` must hold the vertices `count` primitives of `primitive`
    /// need, `Vertex::STRIDE` bytes apart.
    unsafe fn draw(
        &self,
        effect: ComPtr,
        extent: Extent,
        technique: &str,
        primitive: u32,
        count: u32,
        vertices: *const c_void,
    ) -> Result<()> {
        let device = self.shared.device;
        let hr = unsafe { (device.method::<BeginScene>())(device.as_raw()) };
        check(hr, "IDirect3DDevice9::BeginScene")?;

        let result = unsafe {
            self.draw_in_scene(effect, extent, technique, primitive, count, vertices)
        };

        let hr = unsafe { (device.method::<EndScene>())(device.as_raw()) };
        result.and(check(hr, "IDirect3DDevice9::EndScene"))
    }

    unsafe fn draw_in_scene(
        &self,
        effect: ComPtr,
        extent: Extent,
        technique: &str,
        primitive: u32,
        count: u32,
        vertices: *const c_void,
    ) -> Result<()> {
        let device = self.shared.device;

        if let Err(e) = unsafe { set_vector(effect, TARGET_SIZE_PARAMETER, &extent.target_size()) } {
            trace!("\"{}\": {e}", self.name);
        }
        unsafe { set_technique(effect, technique)? };

        let hr = unsafe { (device.method::<SetFvf>())(device.as_raw(), Vertex::FVF) };
        check(hr, "IDirect3DDevice9::SetFVF")?;

        let mut passes = 0u32;
        let hr = unsafe { (effect.method::<EffectBegin>())(effect.as_raw(), &mut passes, 0) };
        check(hr, "ID3DXEffect::Begin")?;

        let result = (0..passes).try_for_each(|pass| unsafe {
            self.draw_pass(effect, pass, primitive, count, vertices)
        });

        let hr = unsafe { (effect.method::<EffectEnd>())(effect.as_raw()) };
        result.and(check(hr, "ID3DXEffect::End"))
    }

    unsafe fn draw_pass(
        &self,
        effect: ComPtr,
        pass: u32,
        primitive: u32,
        count: u32,
        vertices: *const c_void,
    ) -> Result<()> {
        trace!("\"{}\" pass {pass}: {count} primitives", self.name);
        let device = self.shared.device;

        let hr = unsafe { (effect.method::<BeginPass>())(effect.as_raw(), pass) };
        check(hr, "ID3DXEffect::BeginPass")?;

        let hr = unsafe {
            (device.method::<DrawPrimitiveUp>())(
                device.as_raw(),
                primitive,
                count,
                vertices,
                Vertex::STRIDE,
            )
        };
        let drawn = check(hr, "IDirect3DDevice9::DrawPrimitiveUP");

        let hr = unsafe { (effect.method::<EndPass>())(effect.as_raw()) };
        drawn.and(check(hr, "ID3DXEffect::EndPass"))
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle={} name=\"{}\"", self.handle, self.name)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

fn parameter_result(hr: HRESULT, name: &str) -> Result<()> {
    if failed(hr) {
        Err(Error::Parameter {
            name: name.to_string(),
            code: hr as u32,
        })
    } else {
        Ok(())
    }
}

unsafe fn set_vector(effect: ComPtr, name: &str, value: &D3DXVECTOR4) -> Result<()> {
    let c_name = c_name(name)?;
    let hr = unsafe { (effect.method::<SetVector>())(effect.as_raw(), c_name.as_ptr(), value) };
    parameter_result(hr, name)
}

unsafe fn set_technique(effect: ComPtr, name: &str) -> Result<()> {
    let c_name = c_name(name)?;
    let hr = unsafe { (effect.method::<SetTechnique>())(effect.as_raw(), c_name.as_ptr()) };
    if failed(hr) {
        return Err(Error::Technique {
            name: name.to_string(),
            code: hr as u32,
        });
    }
    Ok(())
}

/// Read the text of a compiler diagnostics buffer and release the buffer.
///
/// # Safety
///
/// `buffer` must be an owned reference to a live `ID3DXBuffer`.
unsafe fn take_diagnostics(buffer: ComPtr) -> String {
    let this = buffer.as_raw();
    let ptr = unsafe { (buffer.method::<GetBufferPointer>())(this) };
    let size = unsafe { (buffer.method::<GetBufferSize>())(this) } as usize;
    let text = if ptr.is_null() || size == 0 {
        String::new()
    } else {
        decode_diagnostics(unsafe { std::slice::from_raw_parts(ptr as *const u8, size) })
    };
    unsafe { buffer.release() };
    text
}

/// Compiler output up to the first NUL, lossily decoded, trailing
/// whitespace removed.
pub(crate) fn decode_diagnostics(bytes: &[u8]) -> String {
    let text = match CStr::from_bytes_until_nul(bytes) {
        Ok(text) => text.to_bytes(),
        Err(_) => bytes,
    };
    String::from_utf8_lossy(text).trim_end().to_string()
}
