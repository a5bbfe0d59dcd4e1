mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semsim", about = "SEM focus and alignment trainer")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List samples, detectors and magnifications in a calibration library
    Library(commands::library::LibraryArgs),
    /// Render one frame for a set of instrument settings
    Render(commands::render::RenderArgs),
    /// Render a focus wobble series for aperture alignment
    Wobble(commands::wobble::WobbleArgs),
    /// Re-render a frame from a saved parameter sidecar
    Replay(commands::replay::ReplayArgs),
    /// Print or save a default session config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Library(args) => commands::library::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Wobble(args) => commands::wobble::run(args),
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
