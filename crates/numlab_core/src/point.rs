use crate::expr::EvalError;
use serde::{Deserialize, Serialize};

/// An (x, y) pair of real numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Returns a copy of `points` ordered by x.
///
/// Shells hand over rows in whatever order the user typed them; the
/// interpolation engines require ascending x.
pub fn sorted_by_x(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
    sorted
}

/// Finds a duplicated x value in an x-sorted point set, if any.
pub fn duplicate_abscissa(sorted: &[Point]) -> Option<f64> {
    sorted
        .windows(2)
        .find(|pair| pair[0].x == pair[1].x)
        .map(|pair| pair[0].x)
}

/// Samples a function over a uniform grid for plotting.
///
/// Grid points where evaluation fails (singularities, domain errors) are
/// skipped rather than aborting the whole series, so a shell can still draw
/// the defined parts of e.g. `1/x` or `log(x)`.
pub fn sample<F>(f: F, x_min: f64, x_max: f64, samples: usize) -> Vec<Point>
where
    F: Fn(f64) -> Result<f64, EvalError>,
{
    if samples == 0 || !x_min.is_finite() || !x_max.is_finite() || x_max <= x_min {
        return Vec::new();
    }
    if samples == 1 {
        return f(x_min).map(|y| vec![Point::new(x_min, y)]).unwrap_or_default();
    }

    let step = (x_max - x_min) / (samples - 1) as f64;
    let mut series = Vec::with_capacity(samples);
    for i in 0..samples {
        let x = x_min + step * i as f64;
        if let Ok(y) = f(x) {
            series.push(Point::new(x, y));
        }
    }
    series
}
