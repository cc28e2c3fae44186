use std::fmt::Display;

use num_traits::Float;

use crate::Result;

mod derivative;
mod fit;
mod smooth;

pub use derivative::{gradient, second_derivative};
pub use fit::{polyfit, Polynomial};
pub use smooth::{running_mean, savitzky_golay};

/// Default running mean window (in samples).
pub const DEFAULT_RUNNING_MEAN_WINDOW: usize = 5;

/// Default Savitzky-Golay window (in samples). Must be odd.
pub const DEFAULT_SAVITZKY_GOLAY_WINDOW: usize = 21;

/// Default Savitzky-Golay polynomial order.
pub const DEFAULT_SAVITZKY_GOLAY_ORDER: usize = 3;

/// Default degree of the polynomial fitted by [Curve::Polynomial].
pub const DEFAULT_POLYNOMIAL_DEGREE: usize = 3;

/// Describes how a sorted, normalized score array is turned into the curve whose
/// second derivative is scanned for the threshold.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Curve {
    /// Use the scores as-is.
    Raw,
    /// Trailing moving average over `window` samples.
    RunningMean { window: usize },
    /// Savitzky-Golay smoothing.
    SavitzkyGolay { window: usize, order: usize },
    /// Global least-squares polynomial fit, evaluated at every index.
    Polynomial { degree: usize },
}

impl Default for Curve {
    fn default() -> Self {
        Curve::RunningMean {
            window: DEFAULT_RUNNING_MEAN_WINDOW,
        }
    }
}

impl Display for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Curve::Raw => write!(f, "raw"),
            Curve::RunningMean { window } => write!(f, "mean{}", window),
            Curve::SavitzkyGolay { window, order } => write!(f, "savgol{}x{}", window, order),
            Curve::Polynomial { degree } => write!(f, "poly{}", degree),
        }
    }
}

impl Curve {
    /// Applies this transform to `values`. The output always has the same length as the input.
    pub fn apply<T: Float>(&self, values: &[T]) -> Result<Vec<T>> {
        match *self {
            Curve::Raw => Ok(values.to_vec()),
            Curve::RunningMean { window } => running_mean(values, window),
            Curve::SavitzkyGolay { window, order } => savitzky_golay(values, window, order, 0),
            Curve::Polynomial { degree } => {
                let x: Vec<T> = (0..values.len())
                    .map(|i| T::from(i).unwrap_or_else(T::zero))
                    .collect();
                let poly = polyfit(&x, values, degree)?;
                Ok(x.iter().map(|&x| poly.eval(x)).collect())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_curve_display() {
        assert_eq!(Curve::Raw.to_string(), "raw");
        assert_eq!(Curve::default().to_string(), "mean5");
        assert_eq!(
            Curve::SavitzkyGolay {
                window: 21,
                order: 3
            }
            .to_string(),
            "savgol21x3"
        );
        assert_eq!(Curve::Polynomial { degree: 3 }.to_string(), "poly3");
    }

    #[test]
    fn test_curve_preserves_length() {
        let values: Vec<f64> = (0..30).map(|i| (i as f64 / 29.0).powi(2)).collect();
        let curves = [
            Curve::Raw,
            Curve::default(),
            Curve::SavitzkyGolay {
                window: 7,
                order: 2,
            },
            Curve::Polynomial { degree: 3 },
        ];
        for curve in curves {
            let out = curve.apply(&values).unwrap();
            assert_eq!(out.len(), values.len(), "{}", curve);
        }
    }

    #[test]
    fn test_polynomial_curve_reproduces_quadratic() {
        let values: Vec<f64> = (0..20).map(|i| 0.5 + 0.01 * (i * i) as f64).collect();
        let out = Curve::Polynomial { degree: 2 }.apply(&values).unwrap();
        for (a, b) in out.iter().zip(&values) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
