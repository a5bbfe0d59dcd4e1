use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use semsim_core::io::params::read_params;
use semsim_core::state::StateUpdate;

use super::SessionArgs;
use crate::summary::print_frame_summary;

#[derive(Args)]
pub struct ReplayArgs {
    /// Parameter sidecar written by `render`
    pub params: PathBuf,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Sample the frame was taken on
    #[arg(long)]
    pub sample: Option<String>,

    /// Detector the frame was taken with
    #[arg(long)]
    pub detector: Option<String>,

    /// Output PNG path
    #[arg(short, long, default_value = "replay.png")]
    pub output: PathBuf,
}

pub fn run(args: &ReplayArgs) -> Result<()> {
    let record = read_params(&args.params)
        .with_context(|| format!("Failed to read {}", args.params.display()))?;

    let mut sim = args.session.open()?;
    if let Some(ref sample) = args.sample {
        sim.select_sample(sample)?;
    }
    if args.detector.is_some() {
        sim.set_state(&StateUpdate {
            detector: args.detector.clone(),
            ..StateUpdate::default()
        })?;
    }
    let frame = sim.apply_params(&record)?;

    let major = frame.kernel.halfwidth_major_nm;
    let minor = frame.kernel.halfwidth_minor_nm;
    print_frame_summary(frame);
    if major == record.halfwidth_major_nm && minor == record.halfwidth_minor_nm {
        println!("Beam spot matches the saved parameters");
    } else {
        println!(
            "Beam spot differs: saved {} x {} nm, now {} x {} nm",
            record.halfwidth_major_nm, record.halfwidth_minor_nm, major, minor
        );
    }

    sim.save(&args.output)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;
    println!("Saved to {}", args.output.display());
    Ok(())
}
