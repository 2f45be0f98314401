use crate::point::{duplicate_abscissa, sorted_by_x, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing an interpolating polynomial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("interpolation requires at least 2 points, got {0}")]
    InsufficientPoints(usize),
    #[error("duplicate x value {0} in point set")]
    DuplicateAbscissa(f64),
}

fn validated(points: &[Point]) -> Result<Vec<Point>, InterpolationError> {
    if points.len() < 2 {
        return Err(InterpolationError::InsufficientPoints(points.len()));
    }
    let sorted = sorted_by_x(points);
    if let Some(x) = duplicate_abscissa(&sorted) {
        return Err(InterpolationError::DuplicateAbscissa(x));
    }
    Ok(sorted)
}

/// Lagrange interpolation through n distinct points.
///
/// Each `evaluate` recomputes the basis-polynomial sum directly: O(n²) per
/// call, with no precomputed coefficients. Fine at classroom scale and it
/// keeps the basis values available for step-by-step display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lagrange {
    points: Vec<Point>,
}

impl Lagrange {
    pub fn new(points: &[Point]) -> Result<Self, InterpolationError> {
        Ok(Self {
            points: validated(points)?,
        })
    }

    /// The interpolation nodes, ordered by x.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Evaluates the interpolating polynomial at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.points
            .iter()
            .zip(self.basis_at(x))
            .map(|(p, basis)| p.y * basis)
            .sum()
    }

    /// Values of the n basis polynomials L_i at `x`.
    pub fn basis_at(&self, x: f64) -> Vec<f64> {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let xi = self.points[i].x;
                (0..n)
                    .filter(|&j| j != i)
                    .map(|j| {
                        let xj = self.points[j].x;
                        (x - xj) / (xi - xj)
                    })
                    .product()
            })
            .collect()
    }

    /// Human-readable form of each basis polynomial, for the details view.
    pub fn basis_polynomials(&self) -> Vec<String> {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let xi = self.points[i].x;
                let factors: Vec<String> = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| {
                        let xj = self.points[j].x;
                        format!("(x - {xj:.2})/({xi:.2} - {xj:.2})")
                    })
                    .collect();
                factors.join(" * ")
            })
            .collect()
    }

    /// Human-readable form of the full interpolating polynomial.
    pub fn polynomial_string(&self) -> String {
        let terms: Vec<String> = self
            .points
            .iter()
            .zip(self.basis_polynomials())
            .map(|(p, basis)| format!("{:.2} * ({basis})", p.y))
            .collect();
        terms.join(" + ")
    }
}

/// Newton divided-difference interpolation through n distinct points.
///
/// Construction builds the triangular divided-difference table once; the
/// table is kept so shells can show the intermediate differences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonDividedDifference {
    points: Vec<Point>,
    /// Row i holds f[x_i], f[x_i, x_{i+1}], ..., f[x_i, ..., x_{n-1}].
    table: Vec<Vec<f64>>,
}

impl NewtonDividedDifference {
    pub fn new(points: &[Point]) -> Result<Self, InterpolationError> {
        let points = validated(points)?;
        let table = build_table(&points);
        Ok(Self { points, table })
    }

    /// The interpolation nodes, ordered by x.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The triangular divided-difference table; row i has n - i entries.
    pub fn table(&self) -> &[Vec<f64>] {
        &self.table
    }

    /// Coefficients of the Newton form: the top row of the table.
    pub fn coefficients(&self) -> &[f64] {
        &self.table[0]
    }

    /// Evaluates the Newton form at `x` by Horner-style accumulation.
    pub fn evaluate(&self, x: f64) -> f64 {
        let coefficients = self.coefficients();
        let n = coefficients.len();
        let mut result = coefficients[n - 1];
        for k in (0..n - 1).rev() {
            result = result * (x - self.points[k].x) + coefficients[k];
        }
        result
    }

    /// Human-readable terms of the Newton polynomial, for the details view:
    /// `["1.0000", "2.0000(x - 1.00)", "0.5000(x - 1.00)(x - 2.00)", ...]`.
    pub fn polynomial_terms(&self) -> Vec<String> {
        let coefficients = self.coefficients();
        let mut terms = vec![format!("{:.4}", coefficients[0])];
        let mut product = String::new();
        for (k, &c) in coefficients.iter().enumerate().skip(1) {
            product.push_str(&format!("(x - {:.2})", self.points[k - 1].x));
            terms.push(format!("{c:.4}{product}"));
        }
        terms
    }

    /// The divided-difference table formatted for tabular display.
    /// The first row holds headers; data row i holds x_i followed by the
    /// n - i differences starting at point i.
    pub fn formatted_table(&self) -> Vec<Vec<String>> {
        let n = self.points.len();
        let mut headers = vec!["x".to_string(), "f(x)".to_string()];
        for order in 1..n {
            headers.push(format!("f[{order}]"));
        }

        let mut rows = vec![headers];
        for (i, row) in self.table.iter().enumerate() {
            let mut formatted = vec![format!("{:.4}", self.points[i].x)];
            formatted.extend(row.iter().map(|value| format!("{value:.4}")));
            rows.push(formatted);
        }
        rows
    }
}

fn build_table(points: &[Point]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut table: Vec<Vec<f64>> = points.iter().map(|p| vec![p.y]).collect();

    for order in 1..n {
        for i in 0..n - order {
            let higher = table[i + 1][order - 1];
            let lower = table[i][order - 1];
            let span = points[i + order].x - points[i].x;
            table[i].push((higher - lower) / span);
        }
    }
    table
}
