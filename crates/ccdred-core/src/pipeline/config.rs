use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::combine::ClipParams;
use crate::consts::{DEFAULT_NORM_ORDER, DEFAULT_SATURATION_LIMIT};
use crate::cosmic::{
    CosmicMethod, CosmicRayRejector, DcrRejector, LaplacianParams, LaplacianRejector,
};
use crate::error::{CcdError, Result};
use crate::normalize::NormalizeMethod;
use crate::slit::SlitTrimParams;

/// Run-wide reduction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Directory holding the raw frames named in the manifest.
    pub raw_path: PathBuf,
    /// Output directory for masters and reduced frames.
    pub red_path: PathBuf,
    pub ignore_bias: bool,
    pub ignore_flats: bool,
    /// Frames peaking above this value are left out of master flats.
    pub saturation_limit: f32,
    pub flat_normalize: NormalizeMethod,
    pub norm_order: usize,
    pub cosmic: CosmicMethod,
    /// Directory holding `dcr.par`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcr_par_dir: Option<PathBuf>,
    pub keep_cosmic_files: bool,
    /// Write the frame after every reduction step, not only the final one.
    pub save_intermediate: bool,
    /// Empty a non-empty reduced directory instead of refusing to run.
    pub auto_clean: bool,
    /// Record the combination parameters as HISTORY on master frames.
    pub master_history: bool,
    pub bias_clip: ClipParams,
    pub flat_clip: ClipParams,
    pub slit_trim: SlitTrimParams,
    pub lacosmic: LaplacianParams,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("."),
            red_path: PathBuf::from("RED"),
            ignore_bias: false,
            ignore_flats: false,
            saturation_limit: DEFAULT_SATURATION_LIMIT,
            flat_normalize: NormalizeMethod::default(),
            norm_order: DEFAULT_NORM_ORDER,
            cosmic: CosmicMethod::default(),
            dcr_par_dir: None,
            keep_cosmic_files: false,
            save_intermediate: false,
            auto_clean: false,
            master_history: false,
            bias_clip: ClipParams::bias(),
            flat_clip: ClipParams::flat(),
            slit_trim: SlitTrimParams::default(),
            lacosmic: LaplacianParams::default(),
        }
    }
}

impl ReductionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| CcdError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CcdError::Configuration(format!("cannot serialize configuration: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.saturation_limit <= 0.0 {
            return Err(CcdError::Configuration(format!(
                "saturation limit must be positive, got {}",
                self.saturation_limit
            )));
        }
        for (name, clip) in [("bias", &self.bias_clip), ("flat", &self.flat_clip)] {
            if clip.low_sigma <= 0.0 || clip.high_sigma <= 0.0 {
                return Err(CcdError::Configuration(format!(
                    "{name} clipping sigmas must be positive"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.slit_trim.threshold) {
            return Err(CcdError::Configuration(
                "slit trim threshold must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Rejector for the configured method, `None` when cleaning is off.
    pub fn cosmic_rejector(&self) -> Option<Box<dyn CosmicRayRejector>> {
        match self.cosmic {
            CosmicMethod::Dcr => Some(Box::new(DcrRejector::new(
                self.dcr_par_dir.clone(),
                self.keep_cosmic_files,
            ))),
            CosmicMethod::LaCosmic => Some(Box::new(LaplacianRejector::new(self.lacosmic))),
            CosmicMethod::None => None,
        }
    }
}
