//! Low-pass then high-pass filter an image with `filter_demo.fx`.
//!
//! ```text
//! filter-demo [image]        # defaults to lena.jpg
//! ```
//!
//! Writes `lena_lowpass.tga` and `lena_highpass.tga` to the working
//! directory.

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use fxproc::{FxContext, Options};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let image = std::env::args().nth(1).unwrap_or_else(|| "lena.jpg".into());
    let mut fx = FxContext::new(Options::from_env()).context("can't start Direct3D 9")?;

    info!("load effect file");
    let effect = fx
        .open_effect(concat!(env!("CARGO_MANIFEST_DIR"), "/filter_demo.fx"))
        .context("can't compile filter_demo.fx")?;

    info!("load {image}");
    let lena = fx
        .load_texture(&image)
        .with_context(|| format!("can't load {image}"))?;

    info!("create render targets");
    let out = fx.create_render_target(lena.width(), lena.height(), "A8R8G8B8", 1)?;
    let out2 = fx.create_render_target(lena.width(), lena.height(), "A8R8G8B8", 1)?;

    effect.set_texture("baseMapTexture", &lena)?;
    fx.set_render_target(&out, 0, 0)?;

    info!("lowpass filter");
    fx.draw_quad(&effect, "LowPass")?;
    fx.save_texture(&out, "lena_lowpass.tga")?;
    info!("saved lena_lowpass.tga");

    info!("highpass filter");
    fx.set_render_target(&out2, 0, 0)?;
    effect.set_texture("baseMap2Texture", &out)?;
    fx.draw_quad(&effect, "HighPass")?;
    fx.save_texture(&out2, "lena_highpass.tga")?;
    info!("saved lena_highpass.tga");

    let report = fx.shutdown();
    info!(
        "released {} effects and {} textures",
        report.released_effects, report.released_textures
    );
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("filter-demo needs Direct3D 9 and only runs on Windows");
    std::process::exit(1);
}
