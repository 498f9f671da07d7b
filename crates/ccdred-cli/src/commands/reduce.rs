use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ccdred_core::cosmic::CosmicMethod;
use ccdred_core::mode::GoodmanModeResolver;
use ccdred_core::normalize::NormalizeMethod;
use ccdred_core::pipeline::{
    DirectoryStore, NightManifest, ProgressReporter, ReductionConfig, ReductionStage, Reducer,
    RunReport,
};
use serde::Serialize;
use tracing::info;

use crate::summary::{print_reduce_summary, print_run_report};

#[derive(Clone, ValueEnum)]
pub enum CosmicArg {
    Dcr,
    Lacosmic,
    None,
}

#[derive(Clone, ValueEnum)]
pub enum NormalizeArg {
    Mean,
    Simple,
    Full,
}

#[derive(Args)]
pub struct ReduceArgs {
    /// Night manifest (TOML) listing the classified groups
    pub manifest: PathBuf,

    /// Reduction config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the raw frames
    #[arg(long)]
    pub raw_path: Option<PathBuf>,

    /// Output directory for masters and reduced frames
    #[arg(long)]
    pub red_path: Option<PathBuf>,

    /// Skip bias groups and bias subtraction
    #[arg(long)]
    pub ignore_bias: bool,

    /// Skip flat fielding
    #[arg(long)]
    pub ignore_flats: bool,

    /// Empty a non-empty output directory before reducing
    #[arg(long)]
    pub auto_clean: bool,

    /// Also write the frame after every reduction step
    #[arg(long)]
    pub save_intermediate: bool,

    /// Record the combination parameters as HISTORY on master frames
    #[arg(long)]
    pub master_history: bool,

    /// Cosmic ray rejection method
    #[arg(long, value_enum)]
    pub cosmic: Option<CosmicArg>,

    /// Directory holding dcr.par
    #[arg(long)]
    pub dcr_par_dir: Option<PathBuf>,

    /// Keep the files written for and by dcr
    #[arg(long)]
    pub keep_cosmic_files: bool,

    /// Master flat normalization
    #[arg(long, value_enum)]
    pub normalize: Option<NormalizeArg>,

    /// Polynomial order of the normalization model
    #[arg(long)]
    pub norm_order: Option<usize>,

    /// Flats peaking above this level are left out of master flats
    #[arg(long)]
    pub saturation: Option<f32>,

    /// Write the run report (config plus per-group outcomes) as TOML
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Layout of the `--report` file.
#[derive(Serialize)]
struct ReportFile<'a> {
    manifest: &'a Path,
    config: &'a ReductionConfig,
    run: &'a RunReport,
}

/// Group progress on an indicatif bar.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:28} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: ReductionStage, total_items: Option<usize>) {
        self.bar.set_length(total_items.unwrap_or(0) as u64);
        self.bar.set_position(0);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }
}

pub fn run(args: &ReduceArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => ReductionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReductionConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate()?;

    let manifest = NightManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;

    print_reduce_summary(&config, &args.manifest, &manifest);

    let store = DirectoryStore::new(&config.raw_path, &config.red_path);
    let reporter = Arc::new(BarReporter::new()?);
    let report = Reducer::new(&config, &store, &GoodmanModeResolver)
        .run_reported(&manifest, reporter.clone())
        .context("Reduction aborted")?;
    reporter.bar.finish_with_message("Done");

    print_run_report(&report);

    if let Some(ref path) = args.report {
        let file = ReportFile {
            manifest: &args.manifest,
            config: &config,
            run: &report,
        };
        let toml_str = toml::to_string_pretty(&file).context("Failed to serialize run report")?;
        std::fs::write(path, toml_str)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Run report saved to {}", path.display());
    }
    Ok(())
}

fn apply_overrides(config: &mut ReductionConfig, args: &ReduceArgs) {
    if let Some(ref p) = args.raw_path {
        config.raw_path = p.clone();
    }
    if let Some(ref p) = args.red_path {
        config.red_path = p.clone();
    }
    config.ignore_bias |= args.ignore_bias;
    config.ignore_flats |= args.ignore_flats;
    config.auto_clean |= args.auto_clean;
    config.save_intermediate |= args.save_intermediate;
    config.master_history |= args.master_history;
    config.keep_cosmic_files |= args.keep_cosmic_files;
    if let Some(ref method) = args.cosmic {
        config.cosmic = match method {
            CosmicArg::Dcr => CosmicMethod::Dcr,
            CosmicArg::Lacosmic => CosmicMethod::LaCosmic,
            CosmicArg::None => CosmicMethod::None,
        };
    }
    if let Some(ref dir) = args.dcr_par_dir {
        config.dcr_par_dir = Some(dir.clone());
    }
    if let Some(ref method) = args.normalize {
        config.flat_normalize = match method {
            NormalizeArg::Mean => NormalizeMethod::Mean,
            NormalizeArg::Simple => NormalizeMethod::Simple,
            NormalizeArg::Full => NormalizeMethod::Full,
        };
    }
    if let Some(order) = args.norm_order {
        config.norm_order = order;
    }
    if let Some(limit) = args.saturation {
        config.saturation_limit = limit;
    }
}
