//! Pure array transforms used by every reduction step.
//!
//! Each function returns a new [`Frame`] with a HISTORY entry describing the
//! correction; the input is never modified.

use ndarray::{s, Array2, Zip};

use crate::consts::EPSILON;
use crate::error::{CcdError, Result};
use crate::frame::Frame;
use crate::region::Region;
use crate::stats::median_mut;

/// Subtract the overscan level row by row.
///
/// For every row the median of the overscan columns is subtracted from the
/// whole row. Rows outside the region's vertical span use the median of the
/// per-row levels.
pub fn overscan_subtract(frame: &Frame, region: &Region) -> Result<Frame> {
    let (rows, cols) = region.to_ranges(frame.shape())?;
    let mut levels = vec![f32::NAN; frame.height()];
    let mut scratch = Vec::with_capacity(cols.len());
    for row in rows.clone() {
        scratch.clear();
        scratch.extend(frame.data.slice(s![row, cols.clone()]).iter().copied());
        levels[row] = median_mut(&mut scratch);
    }

    let mut covered: Vec<f32> = rows.clone().map(|r| levels[r]).collect();
    let fallback = median_mut(&mut covered);
    for level in levels.iter_mut().filter(|l| l.is_nan()) {
        *level = fallback;
    }

    let mut data = frame.data.clone();
    for (row, mut line) in data.rows_mut().into_iter().enumerate() {
        let level = levels[row];
        line.mapv_inplace(|v| v - level);
    }

    let mut out = frame.with_data(data);
    out.header.add_history(format!(
        "Overscan subtracted using median of region {region}"
    ));
    Ok(out)
}

/// Keep only the pixels inside `region`.
pub fn trim(frame: &Frame, region: &Region) -> Result<Frame> {
    let (rows, cols) = region.to_ranges(frame.shape())?;
    let data = frame.data.slice(s![rows, cols]).to_owned();
    let mut out = frame.with_data(data);
    out.header.add_history(format!("Trimmed to section {region}"));
    Ok(out)
}

/// Pixel-wise `frame - master`.
pub fn subtract(frame: &Frame, master: &Frame) -> Result<Frame> {
    check_shape(frame, master)?;
    let data = &frame.data - &master.data;
    let mut out = frame.with_data(data);
    out.header
        .add_history(format!("Subtracted master {}", display_name(master)));
    Ok(out)
}

/// Pixel-wise `frame / flat`. Pixels where the flat is not positive are left
/// unchanged.
pub fn divide(frame: &Frame, flat: &Frame) -> Result<Frame> {
    check_shape(frame, flat)?;
    let mut data = Array2::<f32>::zeros(frame.shape());
    Zip::from(&mut data)
        .and(&frame.data)
        .and(&flat.data)
        .for_each(|out, &v, &f| {
            *out = if f > EPSILON { v / f } else { v };
        });
    let mut out = frame.with_data(data);
    out.header
        .add_history(format!("Divided by flat {}", display_name(flat)));
    Ok(out)
}

fn check_shape(frame: &Frame, other: &Frame) -> Result<()> {
    if frame.shape() != other.shape() {
        return Err(CcdError::ShapeMismatch {
            expected: frame.shape(),
            actual: other.shape(),
        });
    }
    Ok(())
}

fn display_name(frame: &Frame) -> &str {
    if frame.filename.is_empty() {
        "<memory>"
    } else {
        &frame.filename
    }
}
