//! Rasterize a green quad and two red triangles into a 32x32 target and save
//! it as `out.tga`.

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use fxproc::{FxContext, Options, Vertex};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut fx = FxContext::new(Options::from_env()).context("can't start Direct3D 9")?;

    info!("load effect file");
    let effect = fx
        .open_effect(concat!(env!("CARGO_MANIFEST_DIR"), "/tri_demo.fx"))
        .context("can't compile tri_demo.fx")?;

    let out = fx.create_render_target(32, 32, "A8R8G8B8", 1)?;
    fx.set_render_target(&out, 0, 0)?;

    info!("render green quad");
    fx.draw_quad(&effect, "RasterizeQuad")?;

    let mut tris = fx.create_triangles(2);
    tris[0] = [
        Vertex::screen(0.0, 0.0, 0.0, 0.0),
        Vertex::screen(10.0, 0.0, 0.0, 0.0),
        Vertex::screen(10.0, 10.0, 0.0, 0.0),
    ];
    tris[1] = [
        Vertex::screen(20.0, 0.0, 0.0, 0.0),
        Vertex::screen(30.0, 0.0, 0.0, 0.0),
        Vertex::screen(30.0, 10.0, 0.0, 0.0),
    ];

    info!("render {} red triangles", tris.len());
    fx.draw_triangles(&effect, &tris, "RasterizeTri")?;

    fx.save_texture(&out, "out.tga")?;
    info!("saved out.tga");
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("tri-demo needs Direct3D 9 and only runs on Windows");
    std::process::exit(1);
}
