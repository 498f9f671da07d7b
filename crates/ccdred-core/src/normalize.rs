use std::fmt;

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{EPSILON, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{CcdError, Result};
use crate::frame::Frame;

/// How a master flat is brought to unit response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMethod {
    /// Divide by the global mean.
    Mean,
    /// Fit one model to the spatially averaged dispersion profile.
    #[default]
    Simple,
    /// Fit a model to every row independently.
    Full,
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Simple => write!(f, "simple"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Normalize a master flat. `order` is the Chebyshev order used by the
/// model-based methods and ignored by `Mean`.
pub fn normalize(master: &Frame, method: NormalizeMethod, order: usize) -> Result<Frame> {
    let data = match method {
        NormalizeMethod::Mean => normalize_mean(&master.data)?,
        NormalizeMethod::Simple => normalize_simple(&master.data, order)?,
        NormalizeMethod::Full => normalize_full(&master.data, order)?,
    };
    debug!(%method, order, "Normalized master flat");
    let mut out = master.with_data(data);
    out.filename = format!("norm_{}", master.filename);
    out.header.add_history(match method {
        NormalizeMethod::Mean => "Flat normalized by its mean".to_string(),
        _ => format!("Flat normalized with {method} Chebyshev model of order {order}"),
    });
    out.refresh_statistics();
    Ok(out)
}

fn normalize_mean(data: &Array2<f32>) -> Result<Array2<f32>> {
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / data.len().max(1) as f64;
    if mean.abs() < EPSILON as f64 {
        return Err(CcdError::EmptyInput(
            "master flat has zero mean, cannot normalize".into(),
        ));
    }
    Ok(data.mapv(|v| (v as f64 / mean) as f32))
}

fn normalize_simple(data: &Array2<f32>, order: usize) -> Result<Array2<f32>> {
    let profile = data
        .mean_axis(Axis(0))
        .ok_or_else(|| CcdError::EmptyInput("master flat has no rows".into()))?;
    let model = fit_chebyshev(profile.view(), order)?;
    let mut out = data.clone();
    for row in out.rows_mut() {
        divide_by_model(row, &model);
    }
    Ok(out)
}

fn normalize_full(data: &Array2<f32>, order: usize) -> Result<Array2<f32>> {
    let mut out = data.clone();
    let fit_row = |row: ArrayViewMut1<f32>| -> Result<()> {
        let model = fit_chebyshev(row.view(), order)?;
        divide_by_model(row, &model);
        Ok(())
    };
    if data.len() >= PARALLEL_PIXEL_THRESHOLD {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .map(fit_row)
            .collect::<Result<Vec<()>>>()?;
    } else {
        for row in out.axis_iter_mut(Axis(0)) {
            fit_row(row)?;
        }
    }
    Ok(out)
}

fn divide_by_model(mut row: ArrayViewMut1<f32>, model: &Array1<f32>) {
    for (v, &m) in row.iter_mut().zip(model.iter()) {
        if m > EPSILON {
            *v /= m;
        }
    }
}

/// Least-squares Chebyshev fit of `samples` over their index, evaluated back
/// at every index. The order is clamped to what the sample count supports.
pub fn fit_chebyshev(samples: ArrayView1<f32>, order: usize) -> Result<Array1<f32>> {
    let n = samples.len();
    if n == 0 {
        return Err(CcdError::EmptyInput("cannot fit an empty profile".into()));
    }
    let terms = (order + 1).min(n);
    let design = DMatrix::<f64>::from_fn(n, terms, |i, k| chebyshev(k, scaled(i, n)));
    let rhs = DVector::<f64>::from_iterator(n, samples.iter().map(|&v| v as f64));
    let coeffs = design
        .clone()
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(|e| CcdError::EmptyInput(format!("flat model fit failed: {e}")))?;
    let fitted = &design * &coeffs;
    Ok(fitted.iter().map(|&v| v as f32).collect())
}

/// Map index `i` of `n` onto [-1, 1].
fn scaled(i: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        2.0 * i as f64 / (n - 1) as f64 - 1.0
    }
}

/// Chebyshev polynomial of the first kind, `T_k(x)`, by recurrence.
fn chebyshev(k: usize, x: f64) -> f64 {
    match k {
        0 => 1.0,
        1 => x,
        _ => {
            let (mut prev, mut cur) = (1.0, x);
            for _ in 2..=k {
                let next = 2.0 * x * cur - prev;
                prev = cur;
                cur = next;
            }
            cur
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn chebyshev_recurrence_matches_closed_form() {
        let x = 0.3;
        assert!((chebyshev(2, x) - (2.0 * x * x - 1.0)).abs() < 1e-12);
        assert!((chebyshev(3, x) - (4.0 * x * x * x - 3.0 * x)).abs() < 1e-12);
    }

    #[test]
    fn low_order_fit_reproduces_a_line() {
        let samples = array![1.0f32, 2.0, 3.0, 4.0, 5.0];
        let fit = fit_chebyshev(samples.view(), 1).unwrap();
        for (a, b) in fit.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
