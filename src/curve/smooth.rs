use num_traits::Float;

use super::fit::solve;
use crate::{Error, Result};

/// Trailing moving average over `window` samples.
///
/// The first `window` outputs average the growing prefix `values[0..=i]`, so the output
/// has the same length as the input and no warm-up values are dropped.
pub fn running_mean<T: Float>(values: &[T], window: usize) -> Result<Vec<T>> {
    if window == 0 {
        return Err(Error::InvalidWindow(window));
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = T::zero();
    let width = T::from(window).ok_or(Error::InvalidWindow(window))?;

    for (i, &v) in values.iter().enumerate() {
        sum = sum + v;
        if i < window {
            let count = T::from(i + 1).ok_or(Error::InvalidWindow(window))?;
            out.push(sum / count);
        } else {
            sum = sum - values[i - window];
            out.push(sum / width);
        }
    }

    Ok(out)
}

/// Smooths (and optionally differentiates) `values` with a Savitzky-Golay filter.
///
/// Each output point is the value (or `deriv`-th derivative) at the center of a
/// least-squares polynomial of the given `order` fitted over a window of `window`
/// samples. The signal is extended at both ends by point reflection around the first
/// and last samples before filtering, so the output has the same length as the input.
///
/// `window` must be a positive odd number of at least `order + 2`, and the input must be
/// longer than half the window. If `deriv` exceeds `order`, the result is all zeros.
pub fn savitzky_golay<T: Float>(
    values: &[T],
    window: usize,
    order: usize,
    deriv: usize,
) -> Result<Vec<T>> {
    if window % 2 != 1 {
        return Err(Error::InvalidWindow(window));
    }
    if window < order + 2 {
        return Err(Error::WindowTooSmall { window, order });
    }

    let half = (window - 1) / 2;
    let n = values.len();
    if n <= half {
        return Err(Error::InsufficientPoints {
            required: half + 1,
            actual: n,
        });
    }
    if deriv > order {
        return Ok(vec![T::zero(); n]);
    }

    let coefficients = savitzky_golay_coefficients::<T>(half, order, deriv)?;

    let first = values[0];
    let last = values[n - 1];
    let mut padded = Vec::with_capacity(n + 2 * half);
    padded.extend((1..=half).rev().map(|k| first - (values[k] - first).abs()));
    padded.extend_from_slice(values);
    padded.extend((1..=half).map(|k| last + (values[n - 1 - k] - last).abs()));

    let out = padded
        .windows(window)
        .map(|w| {
            w.iter()
                .zip(&coefficients)
                .fold(T::zero(), |acc, (&y, &c)| acc + y * c)
        })
        .collect();

    Ok(out)
}

// Row `deriv` of the pseudo-inverse of the Vandermonde matrix over offsets -half..=half,
// scaled by deriv!. The fit runs on offsets mapped to [-1, 1], so the row is rescaled by
// half^-deriv to express the derivative per sample.
fn savitzky_golay_coefficients<T: Float>(half: usize, order: usize, deriv: usize) -> Result<Vec<T>> {
    let m = order + 1;
    let h = T::from(half).unwrap_or_else(T::one);
    let offsets: Vec<T> = (0..2 * half + 1)
        .map(|k| T::from(k as i64 - half as i64).unwrap_or_else(T::zero) / h)
        .collect();
    let vandermonde: Vec<Vec<T>> = offsets
        .iter()
        .map(|&o| (0..m).map(|j| o.powi(j as i32)).collect())
        .collect();

    let mut gram = vec![vec![T::zero(); m]; m];
    for row in &vandermonde {
        for r in 0..m {
            for c in 0..m {
                gram[r][c] = gram[r][c] + row[r] * row[c];
            }
        }
    }

    let mut unit = vec![T::zero(); m];
    unit[deriv] = T::one();
    let c = solve(gram, unit)?;

    let factorial = (1..=deriv).fold(T::one(), |acc, k| acc * T::from(k).unwrap_or_else(T::one));
    let scale = factorial / h.powi(deriv as i32);

    Ok(vandermonde
        .iter()
        .map(|row| row.iter().zip(&c).fold(T::zero(), |acc, (&b, &c)| acc + b * c) * scale)
        .collect())
}
