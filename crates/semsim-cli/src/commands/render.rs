use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::{apply_settings, SessionArgs, SettingsArgs};
use crate::summary::print_frame_summary;

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Output PNG path; the parameter sidecar is written next to it
    #[arg(short, long, default_value = "frame.png")]
    pub output: PathBuf,
}

pub fn run(args: &RenderArgs) -> Result<()> {
    let mut sim = args.session.open()?;
    apply_settings(&mut sim, &args.settings)?;

    let sidecar = sim
        .save(&args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;

    if let Some(frame) = sim.current_frame() {
        print_frame_summary(frame);
    }
    println!("Saved to {}", args.output.display());
    println!("Parameters saved to {}", sidecar.display());
    Ok(())
}
