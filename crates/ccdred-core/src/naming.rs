//! Canonical master flat names.
//!
//! The name is the only compatibility contract between a master flat created
//! on one run and the science frames that later look it up: two setups are
//! flat-compatible iff their keys are equal, or equal up to the illumination
//! wildcard in lookup mode.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::consts::{MASTER_BIAS_BASE, MASTER_FLAT_BASE, NO_FILTER, NO_GRATING};
use crate::error::{CcdError, Result};
use crate::frame::{parse_timestamp, Header, Technique};
use crate::mode::ModeResolver;

/// Sun and twilight boundaries of one night.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NightEphemeris {
    pub sunset: NaiveDateTime,
    pub evening_twilight: NaiveDateTime,
    pub morning_twilight: NaiveDateTime,
    pub sunrise: NaiveDateTime,
}

impl NightEphemeris {
    /// Build from the timestamp strings produced by the night classifier.
    pub fn parse(
        sunset: &str,
        evening_twilight: &str,
        morning_twilight: &str,
        sunrise: &str,
    ) -> Result<Self> {
        Ok(Self {
            sunset: parse_timestamp(sunset)?,
            evening_twilight: parse_timestamp(evening_twilight)?,
            morning_twilight: parse_timestamp(morning_twilight)?,
            sunrise: parse_timestamp(sunrise)?,
        })
    }

    /// Bucket an exposure start time. Boundaries are exclusive, so a frame
    /// taken exactly on one lands in [`IlluminationContext::Other`].
    pub fn classify(&self, t: NaiveDateTime) -> IlluminationContext {
        if t < self.sunset || t > self.sunrise {
            IlluminationContext::Dome
        } else if (self.sunset < t && t < self.evening_twilight)
            || (self.morning_twilight < t && t < self.sunrise)
        {
            IlluminationContext::Sky
        } else if self.evening_twilight < t && t < self.morning_twilight {
            IlluminationContext::Night
        } else {
            IlluminationContext::Other
        }
    }
}

/// When a flat exposure was taken relative to the night boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IlluminationContext {
    Dome,
    Sky,
    Night,
    Other,
}

impl IlluminationContext {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Dome => "_dome",
            Self::Sky => "_sky",
            Self::Night => "_night",
            Self::Other => "_other",
        }
    }
}

impl fmt::Display for IlluminationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.suffix()[1..])
    }
}

/// Whether a name is being minted for a new master flat or used to search
/// for an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameMode {
    Create,
    Lookup,
}

/// Instrument configuration columns shared by every member of a group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlatSetup {
    pub grating: String,
    pub slit: String,
    pub filter: String,
    pub filter2: String,
}

impl FlatSetup {
    /// Setup read from a frame's own header, for frames outside a manifest.
    pub fn from_header(header: &Header) -> Self {
        let read = |key: &str, default: &str| {
            header
                .get_string(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            grating: read("GRATING", NO_GRATING),
            slit: read("SLIT", ""),
            filter: read("FILTER", NO_FILTER),
            filter2: read("FILTER2", NO_FILTER),
        }
    }
}

/// A master flat file name, possibly holding a `*` wildcard.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlatKey(String);

impl FlatKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.contains('*')
    }

    /// Whether a concrete file name satisfies this key.
    pub fn matches(&self, file_name: &str) -> bool {
        if !self.is_wildcard() {
            return self.0 == file_name;
        }
        let pattern: Vec<String> = self.0.split('*').map(regex::escape).collect();
        Regex::new(&format!("^{}$", pattern.join(".*")))
            .map(|re| re.is_match(file_name))
            .unwrap_or(false)
    }

    /// Name of the normalized companion file.
    pub fn normalized(&self) -> String {
        format!("norm_{}", self.0)
    }
}

impl fmt::Display for FlatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn grating_decoration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_-]").expect("static pattern"))
}

fn slit_decoration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[A-Za-z" ]"#).expect("static pattern"))
}

/// Grating identifier reduced to its numeric part (`SYZY_400` -> `400`).
pub fn grating_code(grating: &str) -> String {
    grating_decoration().replace_all(grating, "").into_owned()
}

/// Slit width reduced to its numeric part (`1.0" long slit` -> `1.0`).
pub fn slit_code(slit: &str) -> String {
    slit_decoration().replace_all(slit, "").into_owned()
}

/// Derives master flat keys for one night.
pub struct FlatCatalogNamer<'a> {
    technique: Technique,
    ephemeris: &'a NightEphemeris,
    modes: &'a dyn ModeResolver,
}

impl<'a> FlatCatalogNamer<'a> {
    pub fn new(
        technique: Technique,
        ephemeris: &'a NightEphemeris,
        modes: &'a dyn ModeResolver,
    ) -> Self {
        Self {
            technique,
            ephemeris,
            modes,
        }
    }

    /// Illumination suffix for a header, or `*` in lookup mode.
    fn illumination_suffix(&self, header: &Header, mode: NameMode) -> Result<String> {
        match mode {
            NameMode::Lookup => Ok("*".to_string()),
            NameMode::Create => {
                let raw = header
                    .get_string("DATE-OBS")
                    .ok_or(CcdError::MissingKeyword("DATE-OBS"))?;
                let t = parse_timestamp(&raw)?;
                Ok(self.ephemeris.classify(t).suffix().to_string())
            }
        }
    }

    /// Key for a master flat built from (or compatible with) `setup`.
    ///
    /// `header` supplies the exposure time and the angles used for the mode
    /// code; `target_name` is only added when non-empty.
    pub fn name_for(
        &self,
        header: &Header,
        setup: &FlatSetup,
        target_name: &str,
        mode: NameMode,
    ) -> Result<FlatKey> {
        let illumination = self.illumination_suffix(header, mode)?;
        let mut name = String::from(MASTER_FLAT_BASE);

        match self.technique {
            Technique::Spectroscopy => {
                if !target_name.is_empty() {
                    name.push('_');
                    name.push_str(target_name);
                }
                let grating = setup.grating.trim();
                if grating != NO_GRATING && !grating.is_empty() {
                    name.push('_');
                    name.push_str(&grating_code(grating));
                    name.push_str(&self.modes.code_for_header(header));
                } else {
                    name.push_str("_no_grating");
                }
                let filter2 = setup.filter2.trim();
                if filter2 != NO_FILTER && !filter2.is_empty() {
                    name.push('_');
                    name.push_str(filter2);
                }
                name.push('_');
                name.push_str(&slit_code(&setup.slit));
            }
            Technique::Imaging => {
                name.push('_');
                name.push_str(&setup.filter.trim().replace(['-', '/'], "_"));
            }
        }

        name.push_str(&illumination);
        name.push_str(".fits");
        Ok(FlatKey(name))
    }
}

/// Master bias file name; `existing` is how many master biases the reduced
/// directory already holds.
pub fn master_bias_name(existing: usize) -> String {
    if existing == 0 {
        format!("{MASTER_BIAS_BASE}.fits")
    } else {
        format!("{MASTER_BIAS_BASE}_{}.fits", existing + 1)
    }
}
