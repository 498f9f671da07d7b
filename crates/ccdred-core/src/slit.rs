use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{SLIT_EDGE_MARGIN, SLIT_ILLUMINATION_THRESHOLD};
use crate::frame::Frame;
use crate::region::Region;
use crate::stats::median_mut;

/// Parameters for locating the illuminated slit on a master flat.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlitTrimParams {
    /// Fraction of the profile peak a row must reach to count as illuminated.
    pub threshold: f32,
    /// Rows dropped inside each detected edge.
    pub margin: usize,
}

impl Default for SlitTrimParams {
    fn default() -> Self {
        Self {
            threshold: SLIT_ILLUMINATION_THRESHOLD,
            margin: SLIT_EDGE_MARGIN,
        }
    }
}

/// Spatial illumination profile: median of every row along the dispersion axis.
pub fn spatial_profile(flat: &Frame) -> Vec<f32> {
    let mut scratch = Vec::with_capacity(flat.width());
    flat.data
        .axis_iter(Axis(0))
        .map(|row| {
            scratch.clear();
            scratch.extend(row.iter().copied());
            median_mut(&mut scratch)
        })
        .collect()
}

/// Find the row range actually lit through the slit.
///
/// Returns `None` when the lit span already covers the whole frame, or when
/// the profile carries no usable signal.
pub fn slit_trim_section(flat: &Frame, params: &SlitTrimParams) -> Option<Region> {
    let profile = spatial_profile(flat);
    let peak = profile
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !peak.is_finite() || peak <= 0.0 {
        debug!("Flat has no positive spatial profile, no slit trim");
        return None;
    }

    let cut = peak * params.threshold;
    let lit = |v: &f32| v.is_finite() && *v >= cut;
    let first = profile.iter().position(lit)?;
    let last = profile.iter().rposition(lit)?;

    if first == 0 && last + 1 == profile.len() {
        debug!("Slit illuminates the full frame height, no slit trim");
        return None;
    }
    let first = first + params.margin;
    let last = last.checked_sub(params.margin)?;
    if first > last {
        return None;
    }

    let section = Region::rows(first + 1, last + 1);
    info!(section = %section, "Found slit trim section");
    Some(section)
}
