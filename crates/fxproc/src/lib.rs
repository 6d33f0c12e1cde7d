//! Offline image processing with Direct3D 9 effects.
//!
//! Load an image, run effect techniques over it as full-screen quads or
//! triangle lists, save the result:
//!
//! ```rust,ignore
//! let mut fx = FxContext::new(Options::from_env())?;
//! let effect = fx.open_effect("filter_demo.fx")?;
//! let image = fx.load_texture("lena.jpg")?;
//! let out = fx.create_render_target(image.width(), image.height(), "A8R8G8B8", 1)?;
//!
//! effect.set_texture("baseMapTexture", &image)?;
//! fx.set_render_target(&out, 0, 0)?;
//! fx.draw_quad(&effect, "LowPass")?;
//! fx.save_texture(&out, "lena_lowpass.tga")?;
//! ```
//!
//! # Overview
//!
//! - [`FxContext`] owns the device and creates every resource.
//! - [`Texture`] and [`Effect`] release their native object on drop or on
//!   an explicit `release`, exactly once.
//! - [`RenderPipeline`] tracks the bound render target and its extent.
//! - [`Registry`] is the liveness bookkeeping behind all of the above.

pub mod config;
pub mod context;
pub mod effect;
pub mod pipeline;
pub mod registry;
pub mod texture;
pub mod vertex;

pub use config::Options;
pub use context::{FxContext, ShutdownReport};
pub use effect::Effect;
pub use fxproc_core::{Error, ErrorKind, ImageFileFormat, PixelFormat, Result};
pub use pipeline::{pack_argb, Extent, RenderPipeline, TargetState};
pub use registry::{HandleId, Registry};
pub use texture::{ResourceKind, Texture, TextureDesc};
pub use vertex::{Triangle, Triangles, Vertex};
