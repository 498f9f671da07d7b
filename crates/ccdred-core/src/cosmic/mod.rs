pub mod dcr;
pub mod laplacian;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CcdError, Result};
use crate::frame::Frame;

pub use dcr::DcrRejector;
pub use laplacian::{LaplacianParams, LaplacianRejector};

/// Cosmic-ray rejection method selected for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CosmicMethod {
    /// External `dcr` executable.
    #[default]
    Dcr,
    /// In-process Laplacian detection.
    #[serde(alias = "laplacian")]
    LaCosmic,
    None,
}

impl fmt::Display for CosmicMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dcr => write!(f, "dcr"),
            Self::LaCosmic => write!(f, "lacosmic"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for CosmicMethod {
    type Err = CcdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dcr" => Ok(Self::Dcr),
            "lacosmic" | "laplacian" => Ok(Self::LaCosmic),
            "none" => Ok(Self::None),
            other => Err(CcdError::Configuration(format!(
                "unknown cosmic ray method '{other}'"
            ))),
        }
    }
}

/// Where a rejector may place scratch files, and the provenance prefix the
/// frame carries at this point.
#[derive(Clone, Copy, Debug)]
pub struct CosmicContext<'a> {
    pub work_dir: &'a Path,
    pub prefix: &'a str,
}

pub trait CosmicRayRejector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return a cleaned copy of `frame`.
    fn reject(&self, frame: &Frame, ctx: &CosmicContext<'_>) -> Result<Frame>;
}
