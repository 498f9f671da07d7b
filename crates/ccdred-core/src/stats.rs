use std::cmp::Ordering;

use num_traits::Float;

fn cmp<T: Float>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Median of a slice, reordering it in place.
///
/// Uses `select_nth_unstable_by` for O(n) median without full sort.
/// Returns NaN for an empty slice.
pub fn median_mut<T: Float>(values: &mut [T]) -> T {
    let n = values.len();
    if n == 0 {
        T::nan()
    } else if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, cmp).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, cmp);
        values[..mid].select_nth_unstable_by(mid - 1, cmp);
        (values[mid - 1] + values[mid]) / (T::one() + T::one())
    }
}

/// Median of a slice without touching the caller's data.
pub fn median<T: Float>(values: &[T]) -> T {
    let mut scratch = values.to_vec();
    median_mut(&mut scratch)
}

pub fn mean<T: Float>(values: &[T]) -> T {
    if values.is_empty() {
        return T::nan();
    }
    let sum = values.iter().fold(T::zero(), |acc, &v| acc + v);
    sum / T::from(values.len()).unwrap_or_else(T::one)
}

/// Root-mean-square deviation of `values` about `center`.
pub fn rms_about<T: Float>(values: &[T], center: T) -> T {
    if values.is_empty() {
        return T::zero();
    }
    let sum_sq = values
        .iter()
        .fold(T::zero(), |acc, &v| acc + (v - center) * (v - center));
    (sum_sq / T::from(values.len()).unwrap_or_else(T::one)).sqrt()
}
