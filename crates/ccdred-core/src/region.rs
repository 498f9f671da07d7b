use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use tracing::{info, warn};

use crate::consts::{
    BLUE_OVERSCAN_COLUMNS, RED_OVERSCAN_COLUMNS, SPEC_TRIM_FIRST_COLUMN, SPEC_TRIM_LAST_COLUMN,
};
use crate::error::{CcdError, Result};
use crate::frame::{Frame, Instrument, Technique};

/// Inclusive, 1-based bounds along one axis. `None` spans the full axis.
pub type AxisBounds = Option<(usize, usize)>;

/// Rectangular pixel section in FITS notation `[x1:x2,y1:y2]`.
///
/// `x` runs along columns (dispersion axis), `y` along rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: AxisBounds,
    pub y: AxisBounds,
}

impl Region {
    pub fn new(x: AxisBounds, y: AxisBounds) -> Self {
        Self { x, y }
    }

    /// Column-only section spanning every row.
    pub fn columns(first: usize, last: usize) -> Self {
        Self {
            x: Some((first, last)),
            y: None,
        }
    }

    /// Row-only section spanning every column.
    pub fn rows(first: usize, last: usize) -> Self {
        Self {
            x: None,
            y: Some((first, last)),
        }
    }

    /// Convert to zero-based half-open `(rows, cols)` ranges for an array of
    /// the given shape, checking the bounds.
    pub fn to_ranges(&self, shape: (usize, usize)) -> Result<(Range<usize>, Range<usize>)> {
        let (h, w) = shape;
        let cols = axis_range(self.x, w).ok_or_else(|| self.out_of_bounds(shape))?;
        let rows = axis_range(self.y, h).ok_or_else(|| self.out_of_bounds(shape))?;
        Ok((rows, cols))
    }

    /// Shape of the section when applied to an array of the given shape.
    pub fn shape_within(&self, shape: (usize, usize)) -> Result<(usize, usize)> {
        let (rows, cols) = self.to_ranges(shape)?;
        Ok((rows.len(), cols.len()))
    }

    fn out_of_bounds(&self, shape: (usize, usize)) -> CcdError {
        CcdError::InvalidSection(format!(
            "{self} outside {}x{} image",
            shape.1, shape.0
        ))
    }
}

fn axis_range(bounds: AxisBounds, len: usize) -> Option<Range<usize>> {
    match bounds {
        None => Some(0..len),
        Some((first, last)) if first >= 1 && first <= last && last <= len => Some(first - 1..last),
        Some(_) => None,
    }
}

impl FromStr for Region {
    type Err = CcdError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CcdError::InvalidSection(s.to_string());
        let inner = s
            .trim()
            .trim_matches('\'')
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(invalid)?;
        let (x, y) = inner.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            x: parse_axis(x).ok_or_else(invalid)?,
            y: parse_axis(y).ok_or_else(invalid)?,
        })
    }
}

fn parse_axis(raw: &str) -> Option<AxisBounds> {
    let raw = raw.trim();
    if raw == ":" || raw == "*" {
        return Some(None);
    }
    let (a, b) = raw.split_once(':')?;
    let first: usize = a.trim().parse().ok()?;
    let last: usize = b.trim().parse().ok()?;
    if first == 0 || first > last {
        return None;
    }
    Some(Some((first, last)))
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = |b: AxisBounds| match b {
            Some((a, z)) => format!("{a}:{z}"),
            None => ":".to_string(),
        };
        write!(f, "[{},{}]", axis(self.x), axis(self.y))
    }
}

/// Geometric regions shared by every group of a night.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NightRegions {
    pub trim: Region,
    pub overscan: Option<Region>,
}

impl NightRegions {
    /// Resolve trim and overscan from one sample frame.
    pub fn resolve(
        technique: Technique,
        instrument: Instrument,
        sample: Option<&Frame>,
    ) -> Result<Self> {
        warn!("Determining trim section and overscan region from a single sample frame; assuming one binning per night");
        let trim = resolve_trim(technique, instrument, sample)?;
        let overscan = resolve_overscan(technique, instrument, sample)?;
        info!(trim = %trim, overscan = ?overscan.map(|r| r.to_string()), "Resolved night regions");
        Ok(Self { trim, overscan })
    }
}

fn require_sample(sample: Option<&Frame>) -> Result<&Frame> {
    sample.ok_or_else(|| {
        CcdError::Configuration("no sample frame available to resolve regions".into())
    })
}

/// Trim region for the night.
///
/// Spectroscopy uses fixed physical column limits scaled by serial binning;
/// imaging trusts the frame's own `TRIMSEC`.
pub fn resolve_trim(
    technique: Technique,
    _instrument: Instrument,
    sample: Option<&Frame>,
) -> Result<Region> {
    let frame = require_sample(sample)?;
    match technique {
        Technique::Spectroscopy => {
            let serial = frame.binning()?.serial as f64;
            let first = (SPEC_TRIM_FIRST_COLUMN / serial).ceil() as usize;
            let last = (SPEC_TRIM_LAST_COLUMN / serial).floor() as usize;
            Ok(Region::columns(first.max(1), last))
        }
        Technique::Imaging => {
            let raw = frame.header.get_string("TRIMSEC").ok_or_else(|| {
                CcdError::Configuration("imaging frame has no TRIMSEC keyword".into())
            })?;
            raw.parse()
                .map_err(|_| CcdError::Configuration(format!("unparsable TRIMSEC '{raw}'")))
        }
    }
}

/// Overscan region for the night, `None` for imaging.
pub fn resolve_overscan(
    technique: Technique,
    instrument: Instrument,
    sample: Option<&Frame>,
) -> Result<Option<Region>> {
    let frame = require_sample(sample)?;
    match technique {
        Technique::Spectroscopy => {
            let serial = frame.binning()?.serial as f64;
            let (first, last) = match instrument {
                Instrument::Red => RED_OVERSCAN_COLUMNS,
                Instrument::Blue => BLUE_OVERSCAN_COLUMNS,
            };
            let first = ((first / serial).ceil() as usize).max(1);
            let last = (last / serial).floor() as usize;
            if last < first {
                return Err(CcdError::Configuration(format!(
                    "overscan window collapses at serial binning {serial}"
                )));
            }
            Ok(Some(Region::new(
                Some((first, last)),
                Some((1, frame.height())),
            )))
        }
        Technique::Imaging => {
            warn!("Imaging mode has no overscan region, bias frames are used instead");
            Ok(None)
        }
    }
}
