use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{
    BIAS_CLIP_SIGMA, DEFAULT_CLIP_ITERATIONS, EPSILON, FLAT_CLIP_SIGMA, PARALLEL_PIXEL_THRESHOLD,
};
use crate::error::{CcdError, Result};
use crate::stats::{median_mut, rms_about};

/// Parameters for per-pixel sigma-clipped median combination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipParams {
    /// Values below `median - low_sigma * sigma` are rejected.
    pub low_sigma: f32,
    /// Values above `median + high_sigma * sigma` are rejected.
    pub high_sigma: f32,
    /// Maximum number of rejection passes per pixel.
    pub iterations: usize,
}

impl ClipParams {
    pub fn symmetric(sigma: f32) -> Self {
        Self {
            low_sigma: sigma,
            high_sigma: sigma,
            iterations: DEFAULT_CLIP_ITERATIONS,
        }
    }

    /// ±3σ, used for master bias.
    pub fn bias() -> Self {
        Self::symmetric(BIAS_CLIP_SIGMA)
    }

    /// ±1σ, used for master flats.
    pub fn flat() -> Self {
        Self::symmetric(FLAT_CLIP_SIGMA)
    }
}

impl Default for ClipParams {
    fn default() -> Self {
        Self::bias()
    }
}

/// Combine a stack of equally-shaped arrays with a sigma-clipped median.
///
/// Per pixel: take the median of the surviving values and the RMS deviation
/// about it, reject values outside `[median - low*sigma, median + high*sigma]`,
/// and repeat until nothing is rejected or the iteration budget is spent.
/// The output is the median of the survivors. Each pixel keeps its own set of
/// contributing frames.
pub fn clipped_median_stack(stack: &[&Array2<f32>], params: &ClipParams) -> Result<Array2<f32>> {
    let first = stack
        .first()
        .ok_or_else(|| CcdError::EmptyInput("no arrays to combine".into()))?;
    let (h, w) = first.dim();
    for arr in stack.iter().skip(1) {
        if arr.dim() != (h, w) {
            return Err(CcdError::ShapeMismatch {
                expected: (h, w),
                actual: arr.dim(),
            });
        }
    }
    let n = stack.len();

    if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        // Row-parallel: each row allocates its own scratch buffer
        let rows: Vec<Vec<f32>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut values = Vec::with_capacity(n);
                (0..w)
                    .map(|col| {
                        values.clear();
                        values.extend(stack.iter().map(|a| a[[row, col]]));
                        clip_pixel(&mut values, params)
                    })
                    .collect()
            })
            .collect();

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((h, w), flat)
            .map_err(|e| CcdError::EmptyInput(format!("combined array has wrong size: {e}")))
    } else {
        let mut result = Array2::<f32>::zeros((h, w));
        let mut values = Vec::with_capacity(n);
        for row in 0..h {
            for col in 0..w {
                values.clear();
                values.extend(stack.iter().map(|a| a[[row, col]]));
                result[[row, col]] = clip_pixel(&mut values, params);
            }
        }
        Ok(result)
    }
}

/// Clip one pixel's values in place and return the median of the survivors.
pub fn clip_pixel(values: &mut Vec<f32>, params: &ClipParams) -> f32 {
    let mut scratch = values.clone();
    for _ in 0..params.iterations {
        if values.len() <= 2 {
            break;
        }
        scratch.clear();
        scratch.extend_from_slice(values);
        let center = median_mut(&mut scratch);
        let sigma = rms_about(values, center);
        if sigma < EPSILON {
            break;
        }
        let lo = center - params.low_sigma * sigma;
        let hi = center + params.high_sigma * sigma;
        let before = values.len();
        values.retain(|&v| v >= lo && v <= hi);
        if values.is_empty() {
            // Every value rejected: fall back to the unclipped median
            return center;
        }
        if values.len() == before {
            break;
        }
    }
    median_mut(values)
}
