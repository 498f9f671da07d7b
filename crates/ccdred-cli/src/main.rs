mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccdred", about = "CCD calibration and reduction for spectrograph nights")]
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
    /// Reduce a classified night from its manifest
    Reduce(commands::reduce::ReduceArgs),
    /// Combine FITS frames into a master bias or flat
    Combine(commands::combine::CombineArgs),
    /// Print the master flat name for a frame
    Name(commands::name::NameArgs),
    /// Show the header keys reduction decisions depend on
    Info(commands::info::InfoArgs),
    /// Print the default reduction config as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Reduce(args) => commands::reduce::run(args),
        Commands::Combine(args) => commands::combine::run(args),
        Commands::Name(args) => commands::name::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
