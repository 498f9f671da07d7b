//! Night manifest: the classified, grouped frame list a reduction run consumes.
//!
//! ```toml
//! instrument = "Red"
//! technique = "Spectroscopy"
//!
//! [ephemeris]
//! sunset = "2017-03-14T23:07:00"
//! evening_twilight = "2017-03-15T00:16:00"
//! morning_twilight = "2017-03-15T09:06:00"
//! sunrise = "2017-03-15T10:15:00"
//!
//! [[groups]]
//! [[groups.frames]]
//! file = "0001_bias.fits"
//! obstype = "BIAS"
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{NO_FILTER, NO_GRATING};
use crate::error::{CcdError, Result};
use crate::frame::{Instrument, ObsType, Technique};
use crate::naming::{FlatSetup, NightEphemeris};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NightManifest {
    pub instrument: String,
    pub technique: String,
    pub ephemeris: EphemerisRecord,
    #[serde(default)]
    pub groups: Vec<CalibrationGroup>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EphemerisRecord {
    pub sunset: String,
    pub evening_twilight: String,
    pub morning_twilight: String,
    pub sunrise: String,
}

/// Frames sharing one instrument configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalibrationGroup {
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
}

/// One row of the classifier output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameRecord {
    pub file: String,
    pub obstype: ObsType,
    #[serde(default)]
    pub object: String,
    #[serde(default = "no_grating")]
    pub grating: String,
    #[serde(default)]
    pub slit: String,
    #[serde(default = "no_filter")]
    pub filter: String,
    #[serde(default = "no_filter")]
    pub filter2: String,
    #[serde(default)]
    pub binning: Option<String>,
}

fn no_grating() -> String {
    NO_GRATING.to_string()
}

fn no_filter() -> String {
    NO_FILTER.to_string()
}

impl FrameRecord {
    pub fn new(file: impl Into<String>, obstype: ObsType) -> Self {
        Self {
            file: file.into(),
            obstype,
            object: String::new(),
            grating: no_grating(),
            slit: String::new(),
            filter: no_filter(),
            filter2: no_filter(),
            binning: None,
        }
    }
}

impl NightManifest {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CcdError::Manifest(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| CcdError::Manifest(format!("{}: {e}", path.display())))
    }

    pub fn technique(&self) -> Result<Technique> {
        self.technique.parse()
    }

    pub fn instrument(&self) -> Result<Instrument> {
        self.instrument.parse()
    }

    pub fn ephemeris(&self) -> Result<NightEphemeris> {
        let e = &self.ephemeris;
        NightEphemeris::parse(
            &e.sunset,
            &e.evening_twilight,
            &e.morning_twilight,
            &e.sunrise,
        )
    }

    /// First frame listed, used as the night's geometry sample.
    pub fn sample_file(&self) -> Option<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.frames.iter())
            .map(|f| f.file.as_str())
            .next()
    }

    pub fn frame_count(&self) -> usize {
        self.groups.iter().map(|g| g.frames.len()).sum()
    }
}

impl CalibrationGroup {
    pub fn new(frames: Vec<FrameRecord>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn obstypes(&self) -> BTreeSet<ObsType> {
        self.frames.iter().map(|f| f.obstype.clone()).collect()
    }

    pub fn frames_of<'a>(&'a self, obstype: &'a ObsType) -> impl Iterator<Item = &'a FrameRecord> {
        self.frames.iter().filter(move |f| &f.obstype == obstype)
    }

    pub fn files_of(&self, obstype: &ObsType) -> Vec<String> {
        self.frames_of(obstype).map(|f| f.file.clone()).collect()
    }

    /// Setup columns taken from the first member; the group shares them.
    pub fn setup(&self) -> FlatSetup {
        self.frames
            .first()
            .map(|f| FlatSetup {
                grating: f.grating.clone(),
                slit: f.slit.clone(),
                filter: f.filter.clone(),
                filter2: f.filter2.clone(),
            })
            .unwrap_or_default()
    }

    /// `OBJECT` name of the first science exposure, empty if there is none.
    pub fn target_name(&self) -> String {
        self.frames_of(&ObsType::Object)
            .map(|f| f.object.trim().to_string())
            .next()
            .unwrap_or_default()
    }
}
