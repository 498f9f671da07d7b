use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_COSMIC_CONTRAST, DEFAULT_COSMIC_ITERATIONS, DEFAULT_COSMIC_SIGMA, EPSILON,
    PARALLEL_PIXEL_THRESHOLD,
};
use crate::error::Result;
use crate::frame::Frame;
use crate::stats::median_mut;

use super::{CosmicContext, CosmicRayRejector};

const MEDIAN_HALF_WINDOW: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaplacianParams {
    /// Detection threshold on the residual against the local median, in noise units.
    pub sigma: f32,
    /// Minimum excess over the mean of the four neighbours, in noise units.
    /// Separates sharp hits from resolved sources.
    pub contrast: f32,
    pub iterations: usize,
    /// Electrons per ADU, used for the Poisson part of the noise model.
    pub gain: f32,
}

impl Default for LaplacianParams {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_COSMIC_SIGMA,
            contrast: DEFAULT_COSMIC_CONTRAST,
            iterations: DEFAULT_COSMIC_ITERATIONS,
            gain: 1.0,
        }
    }
}

/// In-process cosmic ray cleaner.
///
/// Each pass builds a 5x5 median background, flags pixels that stand out
/// both from that background and from their direct neighbours (the discrete
/// Laplacian), and replaces them by the background value. Passes repeat until
/// nothing is flagged or the iteration limit is hit.
#[derive(Clone, Copy, Debug, Default)]
pub struct LaplacianRejector {
    pub params: LaplacianParams,
}

impl LaplacianRejector {
    pub fn new(params: LaplacianParams) -> Self {
        Self { params }
    }

    /// Clean `data` in place, returning the number of replaced pixels.
    pub fn clean(&self, data: &mut Array2<f32>) -> usize {
        let (h, w) = data.dim();
        if h < 3 || w < 3 {
            return 0;
        }
        let mut total = 0;
        for pass in 0..self.params.iterations.max(1) {
            let background = median_filter(data, MEDIAN_HALF_WINDOW);
            let floor = residual_sigma(data, &background);
            let flagged = self.detect(data, &background, floor);
            if flagged.is_empty() {
                break;
            }
            for &(r, c) in &flagged {
                data[[r, c]] = background[[r, c]];
            }
            debug!(pass, flagged = flagged.len(), "Laplacian cosmic ray pass");
            total += flagged.len();
        }
        total
    }

    fn detect(&self, data: &Array2<f32>, background: &Array2<f32>, floor: f32) -> Vec<(usize, usize)> {
        let (h, w) = data.dim();
        let p = self.params;
        let gain = p.gain.max(EPSILON);
        let mut flagged = Vec::new();
        for r in 0..h {
            for c in 0..w {
                let v = data[[r, c]];
                let bg = background[[r, c]];
                let noise = (floor * floor + bg.max(0.0) / gain).sqrt().max(EPSILON);
                if (v - bg) / noise < p.sigma {
                    continue;
                }
                let up = data[[r.saturating_sub(1), c]];
                let down = data[[(r + 1).min(h - 1), c]];
                let left = data[[r, c.saturating_sub(1)]];
                let right = data[[r, (c + 1).min(w - 1)]];
                let excess = v - 0.25 * (up + down + left + right);
                if excess / noise >= p.contrast {
                    flagged.push((r, c));
                }
            }
        }
        flagged
    }
}

impl CosmicRayRejector for LaplacianRejector {
    fn name(&self) -> &'static str {
        "lacosmic"
    }

    fn reject(&self, frame: &Frame, _ctx: &CosmicContext<'_>) -> Result<Frame> {
        let mut data = frame.data.clone();
        let replaced = self.clean(&mut data);
        let mut out = frame.with_data(data);
        out.header.add_history(format!(
            "Cosmic rays rejected with Laplacian filter, {replaced} pixels replaced"
        ));
        Ok(out)
    }
}

/// Sliding-window median with edge clamping, row-parallel for large frames.
pub fn median_filter(data: &Array2<f32>, half: usize) -> Array2<f32> {
    let (h, w) = data.dim();
    let filter_row = |r: usize| -> Vec<f32> {
        let rows = r.saturating_sub(half)..(r + half + 1).min(h);
        let mut window = Vec::with_capacity((2 * half + 1).pow(2));
        (0..w)
            .map(|c| {
                window.clear();
                let cols = c.saturating_sub(half)..(c + half + 1).min(w);
                for rr in rows.clone() {
                    for cc in cols.clone() {
                        window.push(data[[rr, cc]]);
                    }
                }
                median_mut(&mut window)
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(filter_row).collect()
    } else {
        (0..h).map(filter_row).collect()
    };
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((h, w), flat).unwrap_or_else(|_| data.clone())
}

/// Robust scatter of `data - background` (1.4826 x MAD).
fn residual_sigma(data: &Array2<f32>, background: &Array2<f32>) -> f32 {
    let mut residuals: Vec<f32> = data
        .iter()
        .zip(background.iter())
        .map(|(&v, &b)| v - b)
        .collect();
    let center = median_mut(&mut residuals);
    for r in residuals.iter_mut() {
        *r = (*r - center).abs();
    }
    1.4826 * median_mut(&mut residuals)
}
