use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use ccdred_core::combine::{combine_with_history, ClipParams};
use ccdred_core::consts::DEFAULT_SATURATION_LIMIT;
use ccdred_core::frame::Frame;
use ccdred_core::io::{read_fits, write_fits};

#[derive(Clone, ValueEnum)]
pub enum MasterKind {
    Bias,
    Flat,
}

#[derive(Args)]
pub struct CombineArgs {
    /// Input FITS frames, all with the same shape
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Which clipping defaults to start from
    #[arg(long, value_enum, default_value = "bias")]
    pub kind: MasterKind,

    /// Lower clipping threshold in sigma
    #[arg(long)]
    pub low_sigma: Option<f32>,

    /// Upper clipping threshold in sigma
    #[arg(long)]
    pub high_sigma: Option<f32>,

    /// Skip flats peaking above this level
    #[arg(long, default_value_t = DEFAULT_SATURATION_LIMIT)]
    pub saturation: f32,

    /// Output file path
    #[arg(short, long, default_value = "master.fits")]
    pub output: PathBuf,
}

pub fn run(args: &CombineArgs) -> Result<()> {
    let mut params = match args.kind {
        MasterKind::Bias => ClipParams::bias(),
        MasterKind::Flat => ClipParams::flat(),
    };
    if let Some(low) = args.low_sigma {
        params.low_sigma = low;
    }
    if let Some(high) = args.high_sigma {
        params.high_sigma = high;
    }
    if params.low_sigma <= 0.0 || params.high_sigma <= 0.0 {
        bail!("Clipping thresholds must be positive");
    }

    let frames = args
        .files
        .iter()
        .map(|path| read_fits(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect::<Result<Vec<Frame>>>()?;
    println!(
        "Combining {} frames (-{}/+{} sigma, {} passes)",
        frames.len(),
        params.low_sigma,
        params.high_sigma,
        params.iterations
    );

    let saturation = match args.kind {
        MasterKind::Bias => None,
        MasterKind::Flat => Some(args.saturation),
    };
    let master = combine_with_history(&frames, &params, saturation)?;
    write_fits(&master, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let stats = master.statistics();
    println!(
        "Wrote {} ({}x{}, mean {:.2})",
        args.output.display(),
        master.width(),
        master.height(),
        stats.mean
    );
    Ok(())
}
