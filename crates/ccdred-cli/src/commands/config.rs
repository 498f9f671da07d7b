use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ccdred_core::frame::ObsType;
use ccdred_core::pipeline::{CalibrationGroup, FrameRecord, NightManifest, ReductionConfig};
use ccdred_core::pipeline::manifest::EphemerisRecord;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit an example night manifest instead of the reduction config
    #[arg(long)]
    pub manifest: bool,
}

/// Print or save the default ReductionConfig (or a manifest template) as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let (what, toml_str) = if args.manifest {
        let toml_str = toml::to_string_pretty(&manifest_template())
            .context("Failed to serialize manifest template")?;
        ("Manifest template", toml_str)
    } else {
        ("Default config", ReductionConfig::default().to_toml_string()?)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write {} to {}", what.to_lowercase(), path.display()))?;
        println!("{what} saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}

/// One bias group, one flat group and one science group with its flats.
fn manifest_template() -> NightManifest {
    let mut flat = FrameRecord::new("0002_quartz_400m2.fits", ObsType::Flat);
    flat.grating = "SYZY_400".to_string();
    flat.slit = "1.0_LONG_SLIT".to_string();

    let mut science = FrameRecord::new("0003_ngc2070.fits", ObsType::Object);
    science.object = "NGC2070".to_string();
    science.grating = flat.grating.clone();
    science.slit = flat.slit.clone();

    NightManifest {
        instrument: "Red".to_string(),
        technique: "Spectroscopy".to_string(),
        ephemeris: EphemerisRecord {
            sunset: "2017-03-14T23:07:00".to_string(),
            evening_twilight: "2017-03-15T00:16:00".to_string(),
            morning_twilight: "2017-03-15T09:06:00".to_string(),
            sunrise: "2017-03-15T10:15:00".to_string(),
        },
        groups: vec![
            CalibrationGroup::new(vec![FrameRecord::new("0001_bias.fits", ObsType::Bias)]),
            CalibrationGroup::new(vec![flat.clone()]),
            CalibrationGroup::new(vec![flat, science]),
        ],
    }
}
