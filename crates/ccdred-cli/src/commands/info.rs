use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ccdred_core::io::read_fits;
use ccdred_core::stats::median_mut;

/// Keys the reduction reads to classify, name and trim a frame.
const DECISION_KEYS: [&str; 12] = [
    "OBSTYPE", "OBJECT", "DATE-OBS", "INSTCONF", "CCDSUM", "GRATING", "SLIT", "FILTER",
    "FILTER2", "CAM_TARG", "GRT_TARG", "TRIMSEC",
];

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let frame = read_fits(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let (height, width) = frame.shape();

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}", width, height);
    for key in DECISION_KEYS {
        match frame.header.get(key) {
            Some(value) => println!("{:<13}{}", format!("{key}:"), value),
            None => println!("{:<13}-", format!("{key}:")),
        }
    }

    let stats = frame.statistics();
    let mut values: Vec<f32> = frame.data.iter().copied().collect();
    println!("Min / max:   {:.1} / {:.1}", stats.min, stats.max);
    println!("Mean:        {:.2}", stats.mean);
    println!("Median:      {:.2}", median_mut(&mut values));

    let history = frame.header.history();
    if !history.is_empty() {
        println!("History:");
        for entry in history {
            println!("  {}", entry);
        }
    }

    Ok(())
}
