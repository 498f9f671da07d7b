use tracing::{debug, info, warn};

use crate::error::{CcdError, Result};
use crate::frame::Frame;

use super::sigma_clip::{clipped_median_stack, ClipParams};

/// A combined calibration product and the name it is catalogued under.
#[derive(Clone, Debug)]
pub struct MasterFrame {
    pub frame: Frame,
    pub name: String,
}

impl MasterFrame {
    pub fn new(mut frame: Frame, name: impl Into<String>) -> Self {
        let name = name.into();
        frame.filename = name.clone();
        Self { frame, name }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.frame.shape()
    }
}

/// Combine same-configuration frames into one master frame.
///
/// When `saturation_limit` is given, frames whose peak exceeds it are logged
/// and skipped. Fails with [`CcdError::EmptyInput`] when nothing survives.
/// The result inherits the first contributing frame's header with recomputed
/// pixel statistics.
pub fn combine(
    frames: &[Frame],
    params: &ClipParams,
    saturation_limit: Option<f32>,
) -> Result<Frame> {
    let usable: Vec<&Frame> = frames
        .iter()
        .filter(|f| match saturation_limit {
            Some(limit) if f.peak() > limit => {
                warn!(
                    file = %f.filename,
                    peak = f.peak(),
                    limit,
                    "Removing saturated frame, raise the saturation limit to keep it"
                );
                false
            }
            _ => true,
        })
        .collect();

    let first = usable.first().ok_or_else(|| {
        CcdError::EmptyInput(format!(
            "{} frame(s) given, none below the saturation limit",
            frames.len()
        ))
    })?;

    debug!(
        frames = usable.len(),
        low_sigma = params.low_sigma,
        high_sigma = params.high_sigma,
        "Combining frames"
    );
    let stack: Vec<_> = usable.iter().map(|f| &f.data).collect();
    let data = clipped_median_stack(&stack, params)?;

    let mut master = first.with_data(data);
    master.header.set("NCOMBINE", usable.len());
    master.refresh_statistics();
    info!(
        combined = usable.len(),
        skipped = frames.len() - usable.len(),
        "Combined master frame"
    );
    Ok(master)
}

/// Like [`combine`], recording the combination parameters as HISTORY.
pub fn combine_with_history(
    frames: &[Frame],
    params: &ClipParams,
    saturation_limit: Option<f32>,
) -> Result<Frame> {
    let mut master = combine(frames, params, saturation_limit)?;
    let used = master
        .header
        .get("NCOMBINE")
        .and_then(|v| v.as_i64())
        .unwrap_or(frames.len() as i64);
    master.header.add_history(format!(
        "Median combined {} frames with sigma clipping low={} high={}",
        used,
        params.low_sigma,
        params.high_sigma
    ));
    Ok(master)
}
