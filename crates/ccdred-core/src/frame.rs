use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::TIMESTAMP_FORMAT;
use crate::error::{CcdError, Result};

/// A single CCD exposure.
/// Pixel values are f32 in ADU.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (rows, cols).
    /// Rows run along the spatial axis, columns along the dispersion axis.
    pub data: Array2<f32>,
    pub header: Header,
    /// File name (no directory) the frame was read from or will be written to.
    pub filename: String,
}

impl Frame {
    pub fn new(data: Array2<f32>, header: Header) -> Self {
        Self {
            data,
            header,
            filename: String::new(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Replace the pixel array, keeping header and name.
    pub fn with_data(&self, data: Array2<f32>) -> Self {
        Self {
            data,
            header: self.header.clone(),
            filename: self.filename.clone(),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Detector binning from `CCDSUM`.
    pub fn binning(&self) -> Result<Binning> {
        let raw = self
            .header
            .get_string("CCDSUM")
            .ok_or(CcdError::MissingKeyword("CCDSUM"))?;
        raw.parse()
    }

    pub fn obstype(&self) -> ObsType {
        self.header
            .get_string("OBSTYPE")
            .map(ObsType::from)
            .unwrap_or(ObsType::Other(String::new()))
    }

    /// Observation start time from `DATE-OBS`.
    pub fn date_obs(&self) -> Result<NaiveDateTime> {
        let raw = self
            .header
            .get_string("DATE-OBS")
            .ok_or(CcdError::MissingKeyword("DATE-OBS"))?;
        parse_timestamp(&raw)
    }

    /// Largest pixel value, used for saturation gating.
    pub fn peak(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn statistics(&self) -> PixelStats {
        PixelStats::of(&self.data)
    }

    /// Recompute the pixel statistic keywords from the current array.
    pub fn refresh_statistics(&mut self) {
        let stats = self.statistics();
        self.header.set("DATAMIN", stats.min as f64);
        self.header.set("DATAMAX", stats.max as f64);
        self.header.set("DATAMEAN", stats.mean);
    }
}

/// Summary statistics of a pixel array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelStats {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
}

impl PixelStats {
    pub fn of(data: &Array2<f32>) -> Self {
        if data.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        for &v in data.iter() {
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
        }
        Self {
            min,
            max,
            mean: sum / data.len() as f64,
        }
    }
}

/// A single header value.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for HeaderValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Ordered keyword record plus free-form HISTORY entries.
///
/// Structural keywords (SIMPLE, BITPIX, NAXIS*, BSCALE, BZERO, END) are owned
/// by the FITS codec and never stored here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
    history: Vec<String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        let key = key.to_ascii_uppercase();
        self.cards.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Value rendered as a trimmed string, whatever its type.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string().trim().to_string())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn set(&mut self, key: &str, value: impl Into<HeaderValue>) {
        let key = key.to_ascii_uppercase();
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        let key = key.to_ascii_uppercase();
        let idx = self.cards.iter().position(|(k, _)| *k == key)?;
        Some(self.cards.remove(idx).1)
    }

    pub fn add_history(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Parse an ISO-8601-like timestamp (`2017-03-14T23:10:01.25`).
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .map_err(|_| CcdError::InvalidTimestamp(trimmed.to_string()))
}

/// Observing technique of a night.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Technique {
    Spectroscopy,
    Imaging,
}

impl FromStr for Technique {
    type Err = CcdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spectroscopy" | "spec" => Ok(Self::Spectroscopy),
            "imaging" | "image" => Ok(Self::Imaging),
            other => Err(CcdError::Configuration(format!(
                "unrecognized technique '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spectroscopy => write!(f, "Spectroscopy"),
            Self::Imaging => write!(f, "Imaging"),
        }
    }
}

/// Camera variant of the spectrograph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    Red,
    Blue,
}

impl FromStr for Instrument {
    type Err = CcdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "blue" => Ok(Self::Blue),
            other => Err(CcdError::Configuration(format!(
                "unrecognized instrument '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "Red"),
            Self::Blue => write!(f, "Blue"),
        }
    }
}

/// Observation type from `OBSTYPE`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObsType {
    Bias,
    Flat,
    Object,
    Comp,
    Other(String),
}

impl From<String> for ObsType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&str> for ObsType {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "BIAS" | "ZERO" => Self::Bias,
            "FLAT" => Self::Flat,
            "OBJECT" => Self::Object,
            "COMP" | "ARC" => Self::Comp,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<ObsType> for String {
    fn from(t: ObsType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for ObsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias => write!(f, "BIAS"),
            Self::Flat => write!(f, "FLAT"),
            Self::Object => write!(f, "OBJECT"),
            Self::Comp => write!(f, "COMP"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// On-chip binning. Serial runs along the dispersion axis, parallel along
/// the spatial axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binning {
    pub serial: u32,
    pub parallel: u32,
}

impl Default for Binning {
    fn default() -> Self {
        Self {
            serial: 1,
            parallel: 1,
        }
    }
}

impl FromStr for Binning {
    type Err = CcdError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<u32> = s
            .split_whitespace()
            .map(|p| p.parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| CcdError::Configuration(format!("invalid binning '{s}'")))?;
        match parts.as_slice() {
            [serial, parallel] if *serial > 0 && *parallel > 0 => Ok(Self {
                serial: *serial,
                parallel: *parallel,
            }),
            _ => Err(CcdError::Configuration(format!("invalid binning '{s}'"))),
        }
    }
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.serial, self.parallel)
    }
}
