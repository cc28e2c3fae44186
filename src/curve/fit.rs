use num_traits::Float;

use crate::{Error, Result};

/// A polynomial fitted by [polyfit].
///
/// The fit is computed on abscissae mapped to `[0, 1]`, so [Polynomial::coefficients]
/// are expressed in that normalized variable. Use [Polynomial::eval] to evaluate the
/// polynomial in the original units.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial<T> {
    coefficients: Vec<T>,
    shift: T,
    scale: T,
}

impl<T: Float> Polynomial<T> {
    /// Coefficients in ascending power order, in the normalized variable `(x - shift) / scale`.
    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluates the polynomial at `x` using Horner's method.
    pub fn eval(&self, x: T) -> T {
        let t = (x - self.shift) / self.scale;
        self.coefficients
            .iter()
            .rev()
            .fold(T::zero(), |acc, &c| acc * t + c)
    }
}

/// Least-squares fit of a polynomial of the given `degree` through `(x, y)`.
///
/// At least `degree + 1` points are required.
pub fn polyfit<T: Float>(x: &[T], y: &[T], degree: usize) -> Result<Polynomial<T>> {
    let n = x.len().min(y.len());
    if n < degree + 1 {
        return Err(Error::InsufficientPoints {
            required: degree + 1,
            actual: n,
        });
    }

    let (min, max) = x[..n]
        .iter()
        .fold((T::infinity(), T::neg_infinity()), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let shift = min;
    let scale = if max > min { max - min } else { T::one() };

    // Normal equations: (V^T V) c = V^T y, where V is the Vandermonde matrix.
    let m = degree + 1;
    let mut ata = vec![vec![T::zero(); m]; m];
    let mut aty = vec![T::zero(); m];
    let mut powers = vec![T::one(); 2 * m - 1];
    for i in 0..n {
        let t = (x[i] - shift) / scale;
        for k in 1..powers.len() {
            powers[k] = powers[k - 1] * t;
        }
        for r in 0..m {
            aty[r] = aty[r] + powers[r] * y[i];
            for c in 0..m {
                ata[r][c] = ata[r][c] + powers[r + c];
            }
        }
    }

    let coefficients = solve(ata, aty)?;

    Ok(Polynomial {
        coefficients,
        shift,
        scale,
    })
}

/// Solves the square system `a * x = b` using Gaussian elimination with partial pivoting.
pub(crate) fn solve<T: Float>(mut a: Vec<Vec<T>>, mut b: Vec<T>) -> Result<Vec<T>> {
    let n = b.len();
    let norm = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(T::zero(), |acc, v| acc.max(v.abs()));
    let tolerance = T::epsilon() * norm * T::from(n).unwrap_or_else(T::one);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if !(a[pivot][col].abs() > tolerance) {
            return Err(Error::SingularSystem);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == T::zero() {
                continue;
            }
            for k in col..n {
                a[row][k] = a[row][k] - factor * a[col][k];
            }
            b[row] = b[row] - factor * b[col];
        }
    }

    let mut x = vec![T::zero(); n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum = sum - a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }

    Ok(x)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_polyfit_recovers_cubic() {
        let f = |x: f64| 1.0 + 2.0 * x - 0.5 * x * x + 0.1 * x * x * x;
        let x: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&x| f(x)).collect();
        let poly = polyfit(&x, &y, 3).unwrap();
        assert_eq!(poly.degree(), 3);
        for &x in &[0.0, 3.5, 10.0, 24.0] {
            assert!((poly.eval(x) - f(x)).abs() < 1e-6, "x={}", x);
        }
    }

    #[test]
    fn test_polyfit_line_through_noisy_points() {
        let x = [0.0f64, 1.0, 2.0, 3.0];
        let y = [1.5, 2.5, 5.5, 6.5];
        let poly = polyfit(&x, &y, 1).unwrap();
        // Slope 1.8, intercept 1.3; in the normalized variable x / 3 the slope is 5.4.
        let c = poly.coefficients();
        assert!((c[0] - 1.3).abs() < 1e-9);
        assert!((c[1] - 5.4).abs() < 1e-9);
        assert!((poly.eval(0.0) - 1.3).abs() < 1e-9);
        assert!((poly.eval(3.0) - 6.7).abs() < 1e-9);
    }

    #[test]
    fn test_polyfit_insufficient_points() {
        let x = [0.0f64, 1.0, 2.0];
        let y = [0.0f64, 1.0, 4.0];
        assert!(matches!(
            polyfit(&x, &y, 3),
            Err(Error::InsufficientPoints {
                required: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_polyfit_repeated_abscissa_is_singular() {
        let x = [1.0f64, 1.0, 1.0];
        let y = [0.0f64, 1.0, 2.0];
        assert!(matches!(polyfit(&x, &y, 1), Err(Error::SingularSystem)));
    }

    #[test]
    fn test_solve() {
        let a = vec![vec![0.0f64, 2.0], vec![1.0, 1.0]];
        let b = vec![4.0, 3.0];
        let x = solve(a, b).unwrap();
        assert_eq!(x, vec![1.0, 2.0]);
    }
}
