use std::path::PathBuf;

use canvasconfig::CanvasDimensions;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "lagentry-canvas",
    author,
    version,
    about = "Animated shader canvas preview",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Canvas configuration TOML; built-in defaults are used when omitted.
    #[arg(long, global = true, env = "LAGENTRY_CANVAS_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Only open the canvas with this name from the config.
    #[arg(long, value_name = "NAME")]
    pub canvas: Option<String>,

    /// Shader variant id to render on every opened canvas.
    #[arg(long, value_name = "ID")]
    pub shader: Option<i32>,

    /// Canvas size in pixels (e.g. `1280x720`, or `600` for a square).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<CanvasDimensions>,

    /// Start with the primary condition set (urgent palette).
    #[arg(long)]
    pub primary: bool,

    /// Start with the secondary condition set (upcoming palette).
    #[arg(long)]
    pub secondary: bool,

    /// Disable the radial dimming near the canvas center.
    #[arg(long)]
    pub suppress_center_fade: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the registered shader variants.
    Shaders,
    /// Validate the configuration and print the resolved canvases.
    Check,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<CanvasDimensions, String> {
    if value.trim().is_empty() {
        return Err("size must not be empty".to_string());
    }
    value.parse()
}
