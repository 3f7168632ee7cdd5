mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = run::load_config(cli.config.as_deref())?;
    match cli.command {
        Some(Command::Shaders) => run::list_shaders(&config),
        Some(Command::Check) => run::check(&config),
        None => run::run(&config, cli.run),
    }
}
