use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use canvasconfig::{CanvasConfig, ResolvedCanvas};
use renderer::{
    run_preview, CanvasProps, CanvasSize, PreviewCanvas, PreviewConfig, RenderFlags,
    ShaderRegistry, ShaderVariant,
};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn load_config(path: Option<&Path>) -> Result<CanvasConfig> {
    match path {
        Some(path) => CanvasConfig::load(path)
            .with_context(|| format!("failed to load canvas config {}", path.display())),
        None => Ok(CanvasConfig::default()),
    }
}

/// Built-in variants plus every `[[shader]]` entry of the config.
pub fn build_registry(config: &CanvasConfig) -> Result<ShaderRegistry> {
    let mut builder = ShaderRegistry::builder();
    for shader in &config.shaders {
        let path = config.shader_path(shader);
        let source = fs::read_to_string(&path).with_context(|| {
            format!(
                "failed to read shader {} ('{}') at {}",
                shader.id,
                shader.name,
                path.display()
            )
        })?;
        builder = builder.variant(ShaderVariant::new(shader.id, shader.name.clone(), source));
    }
    builder.build().context("failed to build shader registry")
}

pub fn run(config: &CanvasConfig, args: RunArgs) -> Result<()> {
    let registry = Arc::new(build_registry(config)?);
    let canvases = select_canvases(config.resolve_canvases(), &args)?;

    tracing::info!(
        canvases = canvases.len(),
        shaders = registry.variants().len(),
        "starting canvas preview"
    );

    let canvases = canvases
        .into_iter()
        .map(|canvas| {
            let variant = registry.lookup(canvas.shader);
            PreviewCanvas {
                title: format!("{} - {}", canvas.name, variant.display_name),
                props: props_for(&canvas),
                name: canvas.name,
            }
        })
        .collect();

    run_preview(PreviewConfig {
        registry,
        canvases,
    })
}

pub fn list_shaders(config: &CanvasConfig) -> Result<()> {
    let registry = build_registry(config)?;
    println!("Registered shaders:");
    for variant in registry.variants() {
        let origin = config
            .shaders
            .iter()
            .find(|shader| shader.id == variant.id)
            .map(|shader| config.shader_path(shader).display().to_string())
            .unwrap_or_else(|| "built-in".to_string());
        println!(
            "  {:>4}  {:<20} {}",
            variant.id, variant.display_name, origin
        );
    }
    Ok(())
}

pub fn check(config: &CanvasConfig) -> Result<()> {
    let registry = build_registry(config)?;
    let canvases = config.resolve_canvases();
    println!("Configuration OK: {} canvas(es)", canvases.len());
    for canvas in &canvases {
        let variant = registry.lookup(canvas.shader);
        let shader = if variant.id == canvas.shader {
            format!("{} ({})", variant.id, variant.display_name)
        } else {
            format!(
                "{} unknown, falls back to {} ({})",
                canvas.shader, variant.id, variant.display_name
            )
        };
        println!(
            "  {:<16} size={:<10} shader={} primary={} secondary={} suppress_center_fade={}",
            canvas.name,
            canvas.size.to_string(),
            shader,
            canvas.primary,
            canvas.secondary,
            canvas.suppress_center_fade
        );
    }
    Ok(())
}

/// Applies command-line overrides to the configured canvases.
fn select_canvases(
    mut canvases: Vec<ResolvedCanvas>,
    args: &RunArgs,
) -> Result<Vec<ResolvedCanvas>> {
    if let Some(name) = &args.canvas {
        canvases.retain(|canvas| &canvas.name == name);
        if canvases.is_empty() {
            bail!("no canvas named '{name}' in the configuration");
        }
    }

    for canvas in &mut canvases {
        if let Some(shader) = args.shader {
            canvas.shader = shader;
        }
        if let Some(size) = args.size {
            canvas.size = size;
        }
        canvas.primary |= args.primary;
        canvas.secondary |= args.secondary;
        canvas.suppress_center_fade |= args.suppress_center_fade;
    }
    Ok(canvases)
}

fn props_for(canvas: &ResolvedCanvas) -> CanvasProps {
    CanvasProps::new(
        canvas.shader,
        CanvasSize::new(canvas.size.width, canvas.size.height),
    )
    .with_flags(RenderFlags {
        primary_condition: canvas.primary,
        secondary_condition: canvas.secondary,
        suppress_center_fade: canvas.suppress_center_fade,
    })
}
