use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense polynomial with coefficients in ascending degree order.
///
/// `coefficients[k]` multiplies x^k. Produced by curve fitting; also the
/// model behind the linear-function plotter (`Polynomial::line`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Creates a polynomial from ascending-degree coefficients.
    /// Trailing zero coefficients are dropped; the zero polynomial keeps
    /// a single coefficient.
    pub fn new(mut coefficients: Vec<f64>) -> Self {
        while coefficients.len() > 1 && coefficients.last() == Some(&0.0) {
            coefficients.pop();
        }
        if coefficients.is_empty() {
            coefficients.push(0.0);
        }
        Self { coefficients }
    }

    /// The line y = slope * x + intercept.
    pub fn line(intercept: f64, slope: f64) -> Self {
        Self::new(vec![intercept, slope])
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Evaluates the polynomial at `x` by Horner's scheme.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }
}

impl fmt::Display for Polynomial {
    /// Renders the equation the way the demos label their plots,
    /// e.g. `y = 2.0000x^2 - 3.0000x + 1.0000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y = ")?;
        let mut first = true;
        for (k, &c) in self.coefficients.iter().enumerate().rev() {
            if c == 0.0 && self.degree() > 0 {
                continue;
            }
            if first {
                if c < 0.0 {
                    write!(f, "-")?;
                }
                first = false;
            } else if c < 0.0 {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            match k {
                0 => write!(f, "{:.4}", c.abs())?,
                1 => write!(f, "{:.4}x", c.abs())?,
                _ => write!(f, "{:.4}x^{k}", c.abs())?,
            }
        }
        if first {
            write!(f, "0.0000")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Polynomial;
    use approx::assert_relative_eq;

    #[test]
    fn horner_evaluation() {
        // 1 - 3x + 2x^2
        let p = Polynomial::new(vec![1.0, -3.0, 2.0]);
        assert_eq!(p.degree(), 2);
        assert_relative_eq!(p.evaluate(0.0), 1.0);
        assert_relative_eq!(p.evaluate(1.0), 0.0);
        assert_relative_eq!(p.evaluate(2.0), 3.0);
    }

    #[test]
    fn line_constructor() {
        let line = Polynomial::line(1.0, 2.0);
        assert_eq!(line.degree(), 1);
        assert_relative_eq!(line.evaluate(3.0), 7.0);
    }

    #[test]
    fn trailing_zeros_are_trimmed() {
        let p = Polynomial::new(vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(p.degree(), 1);
        assert_eq!(Polynomial::new(vec![]).degree(), 0);
    }

    #[test]
    fn display_formats_equation() {
        assert_eq!(
            Polynomial::new(vec![1.0, -3.0, 2.0]).to_string(),
            "y = 2.0000x^2 - 3.0000x + 1.0000"
        );
        assert_eq!(Polynomial::line(0.0, 2.0).to_string(), "y = 2.0000x");
        assert_eq!(Polynomial::new(vec![0.0]).to_string(), "y = 0.0000");
    }
}
