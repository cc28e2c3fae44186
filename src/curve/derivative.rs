use num_traits::Float;

use crate::{Error, Result};

/// Discrete derivative of `values` assuming unit spacing.
///
/// Interior points use central differences, the two end points use one-sided
/// first-order differences. At least two points are required.
pub fn gradient<T: Float>(values: &[T]) -> Result<Vec<T>> {
    let n = values.len();
    if n < 2 {
        return Err(Error::InsufficientPoints {
            required: 2,
            actual: n,
        });
    }

    let two = T::one() + T::one();
    let mut out = Vec::with_capacity(n);
    out.push(values[1] - values[0]);
    for i in 1..n - 1 {
        out.push((values[i + 1] - values[i - 1]) / two);
    }
    out.push(values[n - 1] - values[n - 2]);

    Ok(out)
}

/// Shorthand for `gradient(gradient(values))`.
pub fn second_derivative<T: Float>(values: &[T]) -> Result<Vec<T>> {
    gradient(&gradient(values)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gradient() {
        let g = gradient(&[1.0f64, 2.0, 4.0, 7.0, 11.0]).unwrap();
        assert_eq!(g, vec![1.0, 1.5, 2.5, 3.5, 4.0]);
    }

    #[test]
    fn test_gradient_two_points() {
        let g = gradient(&[3.0f32, 1.0]).unwrap();
        assert_eq!(g, vec![-2.0, -2.0]);
    }

    #[test]
    fn test_gradient_too_short() {
        assert!(matches!(
            gradient::<f64>(&[1.0]),
            Err(Error::InsufficientPoints {
                required: 2,
                actual: 1
            })
        ));
        assert!(gradient::<f64>(&[]).is_err());
    }

    #[test]
    fn test_second_derivative_of_quadratic() {
        let values: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
        let d2 = second_derivative(&values).unwrap();
        // Exact in the interior, smeared at the edges by the one-sided differences.
        for v in &d2[2..8] {
            assert_eq!(*v, 2.0);
        }
        assert_eq!(d2[0], 1.0);
        assert_eq!(d2[1], 1.5);
        assert_eq!(d2[8], 1.5);
        assert_eq!(d2[9], 1.0);
    }
}
