use anyhow::{Context, Result};
use clap::Args;
use semsim_core::library::CalibrationLibrary;

use crate::summary::print_library;

#[derive(Args)]
pub struct LibraryArgs {
    /// Calibration image directory (containing `Images/`, or `Images/` itself)
    pub images: std::path::PathBuf,

    /// Decode every image to check it is readable
    #[arg(long)]
    pub verify: bool,
}

pub fn run(args: &LibraryArgs) -> Result<()> {
    let mut library = CalibrationLibrary::open(&args.images)
        .with_context(|| format!("Failed to open library {}", args.images.display()))?;

    if args.verify {
        for sample in library.samples() {
            for detector in library.detectors(&sample) {
                library.preload(&sample, &detector)?;
            }
        }
    }

    print_library(&library);

    if args.verify {
        println!("{} image(s) decoded", library.cached_count());
    }
    Ok(())
}
