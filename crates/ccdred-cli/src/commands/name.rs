use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ccdred_core::io::read_fits;
use ccdred_core::mode::GoodmanModeResolver;
use ccdred_core::naming::{FlatCatalogNamer, FlatSetup, NameMode};
use ccdred_core::pipeline::NightManifest;

#[derive(Args)]
pub struct NameArgs {
    /// FITS frame whose header drives the name
    pub file: PathBuf,

    /// Night manifest supplying the technique and ephemeris
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Science target to embed (spectroscopy only)
    #[arg(long, default_value = "")]
    pub target: String,

    /// Print the wildcard key used to search for a compatible flat
    #[arg(long)]
    pub lookup: bool,
}

pub fn run(args: &NameArgs) -> Result<()> {
    let manifest = NightManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let technique = manifest.technique()?;
    let ephemeris = manifest.ephemeris()?;
    let frame = read_fits(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mode = if args.lookup {
        NameMode::Lookup
    } else {
        NameMode::Create
    };
    let namer = FlatCatalogNamer::new(technique, &ephemeris, &GoodmanModeResolver);
    let setup = FlatSetup::from_header(&frame.header);
    let key = namer.name_for(&frame.header, &setup, args.target.trim(), mode)?;

    println!("{}", key);
    if !key.is_wildcard() {
        println!("{}", key.normalized());
    }
    Ok(())
}
