use crate::point::Point;
use crate::polynomial::Polynomial;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by least-squares fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("a degree-{degree} fit needs more than {degree} points, got {points}")]
    Underdetermined { points: usize, degree: usize },
    #[error("normal equations are singular; the points do not determine a unique fit")]
    SingularMatrix,
}

/// A fitted polynomial with goodness-of-fit diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFit {
    pub polynomial: Polynomial,
    pub residual_sum_squares: f64,
    /// Coefficient of determination; 1.0 for an exact fit.
    pub r_squared: f64,
}

/// Least-squares fit of a degree-`degree` polynomial to a point set.
///
/// Builds the normal equations from the Vandermonde moments and solves them
/// by LU decomposition. Duplicate x values are allowed (repeated
/// measurements); a degenerate basis surfaces as [`FitError::SingularMatrix`].
pub fn fit_polynomial(points: &[Point], degree: usize) -> Result<PolynomialFit, FitError> {
    if points.len() <= degree {
        return Err(FitError::Underdetermined {
            points: points.len(),
            degree,
        });
    }

    let n = degree + 1;

    // power_sums[k] = sum x^k for k in 0..=2*degree;
    // moments[k] = sum y * x^k for k in 0..=degree.
    let mut power_sums = vec![0.0; 2 * degree + 1];
    let mut moments = vec![0.0; n];
    for p in points {
        let mut x_pow = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += x_pow;
            if k < n {
                moments[k] += p.y * x_pow;
            }
            x_pow *= p.x;
        }
    }

    let a = DMatrix::from_fn(n, n, |i, j| power_sums[i + j]);
    let b = DVector::from_fn(n, |i, _| moments[i]);
    let solved = a.lu().solve(&b).ok_or(FitError::SingularMatrix)?;

    let polynomial = Polynomial::new(solved.iter().copied().collect());

    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64;
    let residual_sum_squares = points
        .iter()
        .map(|p| {
            let r = p.y - polynomial.evaluate(p.x);
            r * r
        })
        .sum::<f64>();
    let total_sum_squares = points
        .iter()
        .map(|p| {
            let d = p.y - mean_y;
            d * d
        })
        .sum::<f64>();
    let r_squared = if total_sum_squares > 0.0 {
        1.0 - residual_sum_squares / total_sum_squares
    } else {
        1.0
    };

    Ok(PolynomialFit {
        polynomial,
        residual_sum_squares,
        r_squared,
    })
}

/// First-degree convenience wrapper: fits y = a1 * x + a0.
pub fn fit_line(points: &[Point]) -> Result<PolynomialFit, FitError> {
    fit_polynomial(points, 1)
}

#[cfg(test)]
mod tests {
    use super::{fit_line, fit_polynomial, FitError};
    use crate::point::Point;
    use approx::assert_relative_eq;

    #[test]
    fn fits_exact_line() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(2.0, 4.0),
        ];
        let fit = fit_line(&points).expect("fit");
        let coeffs = fit.polynomial.coefficients();

        assert_relative_eq!(coeffs[0], 0.0, epsilon = 1e-10); // intercept
        assert_relative_eq!(coeffs[1], 2.0, epsilon = 1e-10); // slope
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-10);
        assert!(fit.residual_sum_squares < 1e-18);
    }

    #[test]
    fn fits_noisy_line_with_minimal_residual() {
        let points = [
            Point::new(0.0, 0.1),
            Point::new(1.0, 1.9),
            Point::new(2.0, 4.1),
            Point::new(3.0, 5.9),
        ];
        let fit = fit_line(&points).expect("fit");
        let slope = fit.polynomial.coefficients()[1];

        assert_relative_eq!(slope, 2.0, epsilon = 0.1);
        assert!(fit.r_squared > 0.99);
        assert!(fit.residual_sum_squares > 0.0);
    }

    #[test]
    fn fits_exact_parabola() {
        // y = 1 - 3x + 2x^2
        let points: Vec<Point> = [-1.0, 0.0, 1.0, 2.0, 3.0]
            .iter()
            .map(|&x| Point::new(x, 1.0 - 3.0 * x + 2.0 * x * x))
            .collect();
        let fit = fit_polynomial(&points, 2).expect("fit");
        let coeffs = fit.polynomial.coefficients();

        assert_relative_eq!(coeffs[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(coeffs[1], -3.0, epsilon = 1e-8);
        assert_relative_eq!(coeffs[2], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn rejects_underdetermined_input() {
        let points = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        assert_eq!(
            fit_polynomial(&points, 2),
            Err(FitError::Underdetermined {
                points: 2,
                degree: 2
            })
        );
    }

    #[test]
    fn singular_normal_equations_are_reported() {
        // All points share one x: the line is not determined.
        let points = [
            Point::new(1.0, 1.0),
            Point::new(1.0, 2.0),
            Point::new(1.0, 3.0),
        ];
        assert_eq!(fit_line(&points), Err(FitError::SingularMatrix));
    }

    #[test]
    fn constant_data_has_unit_r_squared() {
        let points = [
            Point::new(0.0, 5.0),
            Point::new(1.0, 5.0),
            Point::new(2.0, 5.0),
        ];
        let fit = fit_line(&points).expect("fit");
        assert_relative_eq!(fit.polynomial.evaluate(10.0), 5.0, epsilon = 1e-10);
        assert_relative_eq!(fit.r_squared, 1.0);
    }
}
