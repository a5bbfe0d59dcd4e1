use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use semsim_core::io::params::save_frame;

use super::{apply_settings, SessionArgs, SettingsArgs};

#[derive(Args)]
pub struct WobbleArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Focus modulation amplitude in mm
    #[arg(long, default_value = "0.5")]
    pub amplitude: f64,

    /// Number of frames to render
    #[arg(long, default_value = "16")]
    pub frames: u64,

    /// Output directory for the frame series
    #[arg(short, long, default_value = "wobble")]
    pub output: PathBuf,
}

pub fn run(args: &WobbleArgs) -> Result<()> {
    if args.frames == 0 {
        anyhow::bail!("--frames must be at least 1");
    }
    let mut sim = args.session.open()?;
    apply_settings(&mut sim, &args.settings)?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    println!("Focus wobble");
    println!("  Amplitude: {} mm", args.amplitude);
    println!("  Frames:    {}", args.frames);
    println!("  Output:    {}", args.output.display());
    println!();

    let pb = ProgressBar::new(args.frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Rendering");

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for tick in 0..args.frames {
        let frame = sim.render_wobble(args.amplitude, tick)?;
        let (cx, cy) = (frame.viewport.center_x, frame.viewport.center_y);
        min_x = min_x.min(cx);
        max_x = max_x.max(cx);
        min_y = min_y.min(cy);
        max_y = max_y.max(cy);

        let path = args.output.join(format!("wobble_{tick:03}.png"));
        save_frame(&frame, &path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    let walk = (max_x - min_x).hypot(max_y - min_y);
    println!();
    println!("Image walk: {:.2} source px", walk);
    if walk < 0.5 {
        println!("Aperture is aligned");
    } else {
        println!("Aperture is misaligned; adjust --aperture-x/--aperture-y to stop the walk");
    }
    Ok(())
}
