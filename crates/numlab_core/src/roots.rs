use crate::autodiff::Dual;
use crate::expr::EvalError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Threshold under which a secant denominator or a derivative counts as zero.
const DEGENERATE_EPS: f64 = 1e-10;

/// Configuration shared by all root-finding methods.
///
/// Tolerance applies to both the residual magnitude and the
/// successive-estimate difference. The divergence threshold bounds iterate
/// magnitude; past it the run is reported as diverging instead of looping
/// until the iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub divergence_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            divergence_threshold: 1e6,
        }
    }
}

impl SolverConfig {
    fn validate(&self) -> Result<(), RootError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(RootError::InvalidConfig {
                reason: "tolerance must be positive and finite",
            });
        }
        if self.max_iterations == 0 {
            return Err(RootError::InvalidConfig {
                reason: "max_iterations must be greater than zero",
            });
        }
        if !self.divergence_threshold.is_finite() || self.divergence_threshold <= 0.0 {
            return Err(RootError::InvalidConfig {
                reason: "divergence_threshold must be positive and finite",
            });
        }
        Ok(())
    }
}

/// One step of a root-finding run.
///
/// `x` is the estimate visited this step and `fx` the function value there
/// (for fixed-point iteration, the residual g(x) - x). Bisection also
/// records the bracket it searched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub x: f64,
    pub fx: f64,
    pub error: f64,
    pub bracket: Option<[f64; 2]>,
}

/// How a solve run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Converged,
    /// The iteration cap was reached; `root` is the best estimate so far.
    MaxIterationsExceeded,
}

/// Result of a root-finding run, including the full trace for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub root: f64,
    pub residual: f64,
    pub iterations: usize,
    pub status: Status,
    pub trace: Vec<IterationRecord>,
}

/// Failure kinds shared by the root-finding methods.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RootError {
    #[error("invalid solver config: {reason}")]
    InvalidConfig { reason: &'static str },
    #[error("interval must satisfy a < b, got [{a}, {b}]")]
    InvalidInterval { a: f64, b: f64 },
    #[error("f(a) and f(b) must have opposite signs: f({a}) = {fa}, f({b}) = {fb}")]
    NoSignChange { a: f64, b: f64, fa: f64, fb: f64 },
    #[error("initial guesses must be distinct, got {0}")]
    IdenticalGuesses(f64),
    #[error("secant denominator vanished at iteration {iteration}")]
    DivisionByZero { iteration: usize },
    #[error("derivative vanished at x = {x} (iteration {iteration})")]
    ZeroDerivative { x: f64, iteration: usize },
    #[error("iterates diverging: |{x}| exceeds {threshold} at iteration {iteration}")]
    Diverged {
        x: f64,
        threshold: f64,
        iteration: usize,
    },
    #[error("function evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// A failed solve, carrying the iterations completed before the failure.
/// Precondition violations carry an empty trace.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct SolveFailure {
    pub kind: RootError,
    pub trace: Vec<IterationRecord>,
}

impl From<RootError> for SolveFailure {
    fn from(kind: RootError) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }
}

fn checked(value: f64) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

/// Bisection on an interval [a, b] with f(a) and f(b) of opposite sign.
///
/// Each step halves the bracket, keeping the half that retains the sign
/// change. Converges when the half-width or the midpoint residual drops
/// under the tolerance.
pub fn bisection<F>(f: F, a: f64, b: f64, config: &SolverConfig) -> Result<Solution, SolveFailure>
where
    F: Fn(f64) -> Result<f64, EvalError>,
{
    config.validate()?;
    if !(a < b) {
        return Err(RootError::InvalidInterval { a, b }.into());
    }

    let fa = f(a).and_then(checked).map_err(RootError::Eval)?;
    let fb = f(b).and_then(checked).map_err(RootError::Eval)?;
    if fa * fb >= 0.0 {
        return Err(RootError::NoSignChange { a, b, fa, fb }.into());
    }

    let (mut lo, mut hi, mut flo) = (a, b, fa);
    let mut trace = Vec::new();

    for iteration in 1..=config.max_iterations {
        let mid = 0.5 * (lo + hi);
        let fmid = match f(mid).and_then(checked) {
            Ok(value) => value,
            Err(e) => {
                return Err(SolveFailure {
                    kind: RootError::Eval(e),
                    trace,
                })
            }
        };
        let half_width = 0.5 * (hi - lo);
        trace.push(IterationRecord {
            iteration,
            x: mid,
            fx: fmid,
            error: half_width,
            bracket: Some([lo, hi]),
        });

        if fmid.abs() < config.tolerance || half_width < config.tolerance {
            return Ok(Solution {
                root: mid,
                residual: fmid,
                iterations: iteration,
                status: Status::Converged,
                trace,
            });
        }

        if flo * fmid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            flo = fmid;
        }
    }

    let last = trace[trace.len() - 1];
    Ok(Solution {
        root: last.x,
        residual: last.fx,
        iterations: config.max_iterations,
        status: Status::MaxIterationsExceeded,
        trace,
    })
}

/// Secant method from two initial estimates.
pub fn secant<F>(
    f: F,
    x0: f64,
    x1: f64,
    config: &SolverConfig,
) -> Result<Solution, SolveFailure>
where
    F: Fn(f64) -> Result<f64, EvalError>,
{
    config.validate()?;
    if x0 == x1 {
        return Err(RootError::IdenticalGuesses(x0).into());
    }

    let mut prev = x0;
    let mut cur = x1;
    let mut f_prev = f(prev).and_then(checked).map_err(RootError::Eval)?;
    let mut f_cur = f(cur).and_then(checked).map_err(RootError::Eval)?;
    let mut trace = Vec::new();

    for iteration in 1..=config.max_iterations {
        let denom = f_cur - f_prev;
        if denom.abs() < DEGENERATE_EPS {
            return Err(SolveFailure {
                kind: RootError::DivisionByZero { iteration },
                trace,
            });
        }

        let next = cur - f_cur * (cur - prev) / denom;
        let f_next = match f(next).and_then(checked) {
            Ok(value) => value,
            Err(e) => {
                return Err(SolveFailure {
                    kind: RootError::Eval(e),
                    trace,
                })
            }
        };
        let step = (next - cur).abs();
        trace.push(IterationRecord {
            iteration,
            x: next,
            fx: f_next,
            error: step,
            bracket: None,
        });

        if step < config.tolerance || f_next.abs() < config.tolerance {
            return Ok(Solution {
                root: next,
                residual: f_next,
                iterations: iteration,
                status: Status::Converged,
                trace,
            });
        }
        if next.abs() > config.divergence_threshold {
            return Err(SolveFailure {
                kind: RootError::Diverged {
                    x: next,
                    threshold: config.divergence_threshold,
                    iteration,
                },
                trace,
            });
        }

        prev = cur;
        f_prev = f_cur;
        cur = next;
        f_cur = f_next;
    }

    Ok(Solution {
        root: cur,
        residual: f_cur,
        iterations: config.max_iterations,
        status: Status::MaxIterationsExceeded,
        trace,
    })
}

/// Simple (fixed-point) iteration on x = g(x).
///
/// `fx` in the trace holds the fixed-point residual g(x) - x. Divergence is
/// detected by iterate magnitude crossing the configured threshold.
pub fn fixed_point<G>(g: G, x0: f64, config: &SolverConfig) -> Result<Solution, SolveFailure>
where
    G: Fn(f64) -> Result<f64, EvalError>,
{
    config.validate()?;

    let mut x = x0;
    let mut trace = Vec::new();

    for iteration in 1..=config.max_iterations {
        let next = match g(x).and_then(checked) {
            Ok(value) => value,
            Err(e) => {
                return Err(SolveFailure {
                    kind: RootError::Eval(e),
                    trace,
                })
            }
        };
        let residual = next - x;
        trace.push(IterationRecord {
            iteration,
            x: next,
            fx: residual,
            error: residual.abs(),
            bracket: None,
        });

        if residual.abs() < config.tolerance {
            return Ok(Solution {
                root: next,
                residual,
                iterations: iteration,
                status: Status::Converged,
                trace,
            });
        }
        if next.abs() > config.divergence_threshold {
            return Err(SolveFailure {
                kind: RootError::Diverged {
                    x: next,
                    threshold: config.divergence_threshold,
                    iteration,
                },
                trace,
            });
        }

        x = next;
    }

    let last = trace[trace.len() - 1];
    Ok(Solution {
        root: x,
        residual: last.fx,
        iterations: config.max_iterations,
        status: Status::MaxIterationsExceeded,
        trace,
    })
}

/// Newton-Raphson with an explicit derivative.
pub fn newton_raphson<F, D>(
    f: F,
    df: D,
    x0: f64,
    config: &SolverConfig,
) -> Result<Solution, SolveFailure>
where
    F: Fn(f64) -> Result<f64, EvalError>,
    D: Fn(f64) -> Result<f64, EvalError>,
{
    newton_iterate(|x| Ok((f(x)?, df(x)?)), x0, config)
}

/// Newton-Raphson with the derivative obtained by dual-number evaluation.
///
/// One call of `f` at `Dual::variable(x)` yields both f(x) and f'(x), so a
/// shell that only has the user's expression can still run Newton:
/// `newton_raphson_autodiff(|x| expr.eval(x), x0, &config)`.
pub fn newton_raphson_autodiff<F>(
    f: F,
    x0: f64,
    config: &SolverConfig,
) -> Result<Solution, SolveFailure>
where
    F: Fn(Dual) -> Result<Dual, EvalError>,
{
    newton_iterate(
        |x| {
            let y = f(Dual::variable(x))?;
            Ok((y.val, y.eps))
        },
        x0,
        config,
    )
}

fn newton_iterate<E>(mut eval: E, x0: f64, config: &SolverConfig) -> Result<Solution, SolveFailure>
where
    E: FnMut(f64) -> Result<(f64, f64), EvalError>,
{
    config.validate()?;

    let mut x = x0;
    let mut trace = Vec::new();

    for iteration in 1..=config.max_iterations {
        let (fx, dfx) = match eval(x) {
            Ok(pair) => pair,
            Err(e) => {
                return Err(SolveFailure {
                    kind: RootError::Eval(e),
                    trace,
                })
            }
        };
        if !fx.is_finite() || !dfx.is_finite() {
            return Err(SolveFailure {
                kind: RootError::Eval(EvalError::NonFinite),
                trace,
            });
        }

        if dfx.abs() < DEGENERATE_EPS {
            if fx.abs() < config.tolerance {
                // Flat spot on an already-converged estimate.
                trace.push(IterationRecord {
                    iteration,
                    x,
                    fx,
                    error: 0.0,
                    bracket: None,
                });
                return Ok(Solution {
                    root: x,
                    residual: fx,
                    iterations: iteration,
                    status: Status::Converged,
                    trace,
                });
            }
            return Err(SolveFailure {
                kind: RootError::ZeroDerivative { x, iteration },
                trace,
            });
        }

        let next = x - fx / dfx;
        let step = (next - x).abs();
        trace.push(IterationRecord {
            iteration,
            x,
            fx,
            error: step,
            bracket: None,
        });

        if fx.abs() < config.tolerance || step < config.tolerance {
            // Report the iterate the residual was measured at, not `next`.
            return Ok(Solution {
                root: x,
                residual: fx,
                iterations: iteration,
                status: Status::Converged,
                trace,
            });
        }
        if next.abs() > config.divergence_threshold {
            return Err(SolveFailure {
                kind: RootError::Diverged {
                    x: next,
                    threshold: config.divergence_threshold,
                    iteration,
                },
                trace,
            });
        }

        x = next;
    }

    let last = trace[trace.len() - 1];
    Ok(Solution {
        root: x,
        residual: last.fx,
        iterations: config.max_iterations,
        status: Status::MaxIterationsExceeded,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        bisection, fixed_point, newton_raphson, newton_raphson_autodiff, secant, RootError,
        SolverConfig, Status,
    };
    use crate::expr::parse;
    use approx::assert_relative_eq;

    const SQRT_2: f64 = std::f64::consts::SQRT_2;

    fn quadratic(x: f64) -> Result<f64, crate::expr::EvalError> {
        Ok(x * x - 2.0)
    }

    #[test]
    fn bisection_converges_to_sqrt_two() {
        let config = SolverConfig::default();
        let solution = bisection(quadratic, 1.0, 2.0, &config).expect("solve");

        assert_eq!(solution.status, Status::Converged);
        assert_relative_eq!(solution.root, SQRT_2, epsilon = 1e-6);
        // ceil(log2((2 - 1) / 1e-6)) = 20 steps at most.
        assert!(solution.iterations <= 20);
        assert_eq!(solution.trace.len(), solution.iterations);
        assert!(solution.trace.iter().all(|r| r.bracket.is_some()));
    }

    #[test]
    fn bisection_rejects_interval_without_sign_change() {
        let config = SolverConfig::default();
        let failure = bisection(quadratic, 2.0, 3.0, &config).expect_err("must fail");
        assert!(matches!(failure.kind, RootError::NoSignChange { .. }));
        assert!(failure.trace.is_empty());
    }

    #[test]
    fn bisection_rejects_inverted_interval() {
        let config = SolverConfig::default();
        let failure = bisection(quadratic, 2.0, 1.0, &config).expect_err("must fail");
        assert!(matches!(failure.kind, RootError::InvalidInterval { .. }));
    }

    #[test]
    fn bisection_reports_iteration_exhaustion_with_trace() {
        let config = SolverConfig {
            tolerance: 1e-15,
            max_iterations: 5,
            ..SolverConfig::default()
        };
        let solution = bisection(quadratic, 1.0, 2.0, &config).expect("solve");
        assert_eq!(solution.status, Status::MaxIterationsExceeded);
        assert_eq!(solution.trace.len(), 5);
        assert!((solution.root - SQRT_2).abs() < 0.1);
    }

    #[test]
    fn secant_converges_to_sqrt_two() {
        let config = SolverConfig::default();
        let solution = secant(quadratic, 1.0, 2.0, &config).expect("solve");
        assert_eq!(solution.status, Status::Converged);
        assert_relative_eq!(solution.root, SQRT_2, epsilon = 1e-6);
        assert!(solution.iterations < config.max_iterations);
    }

    #[test]
    fn secant_rejects_identical_guesses() {
        let config = SolverConfig::default();
        let failure = secant(quadratic, 1.5, 1.5, &config).expect_err("must fail");
        assert_eq!(failure.kind, RootError::IdenticalGuesses(1.5));
    }

    #[test]
    fn secant_detects_vanishing_denominator() {
        // Constant function: f(x0) == f(x1) for any pair of guesses.
        let config = SolverConfig::default();
        let failure = secant(|_| Ok(1.0), 0.0, 1.0, &config).expect_err("must fail");
        assert!(matches!(failure.kind, RootError::DivisionByZero { iteration: 1 }));
    }

    #[test]
    fn fixed_point_converges_via_babylonian_form() {
        // x = g(x) with g(x) = (x + 2/x) / 2 has fixed point sqrt(2).
        let config = SolverConfig::default();
        let solution =
            fixed_point(|x| Ok(0.5 * (x + 2.0 / x)), 1.0, &config).expect("solve");
        assert_eq!(solution.status, Status::Converged);
        assert_relative_eq!(solution.root, SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn fixed_point_reports_divergence() {
        // g(x) = 2x has |g'| = 2 >= 1: the sequence doubles without bound.
        let config = SolverConfig::default();
        let failure = fixed_point(|x| Ok(2.0 * x), 1.0, &config).expect_err("must fail");
        assert!(matches!(
            failure.kind,
            RootError::Diverged { iteration: 20, .. }
        ));
        assert_eq!(failure.trace.len(), 20);
    }

    #[test]
    fn fixed_point_surfaces_eval_failure_with_partial_trace() {
        let g = parse("sqrt(x - 2)").expect("parse");
        let config = SolverConfig::default();
        // g(3) = 1, then g(1) hits sqrt(-1).
        let failure = fixed_point(|x| g.eval(x), 3.0, &config).expect_err("must fail");
        assert!(matches!(failure.kind, RootError::Eval(_)));
        assert_eq!(failure.trace.len(), 1);
    }

    #[test]
    fn newton_converges_to_sqrt_two() {
        let config = SolverConfig::default();
        let solution =
            newton_raphson(quadratic, |x| Ok(2.0 * x), 1.5, &config).expect("solve");
        assert_eq!(solution.status, Status::Converged);
        assert_relative_eq!(solution.root, SQRT_2, epsilon = 1e-6);
        assert!(solution.iterations <= 6);
    }

    #[test]
    fn newton_residual_describes_the_reported_root() {
        let config = SolverConfig::default();
        let solution =
            newton_raphson(quadratic, |x| Ok(2.0 * x), 1.5, &config).expect("solve");

        let fx = quadratic(solution.root).expect("eval");
        assert_relative_eq!(solution.residual, fx);
        let last = solution.trace.last().expect("trace");
        assert_relative_eq!(solution.root, last.x);
    }

    #[test]
    fn newton_rejects_zero_derivative_instead_of_dividing() {
        let config = SolverConfig::default();
        let failure =
            newton_raphson(quadratic, |x| Ok(2.0 * x), 0.0, &config).expect_err("must fail");
        assert!(matches!(
            failure.kind,
            RootError::ZeroDerivative { iteration: 1, .. }
        ));
        assert!(failure.trace.is_empty());
        assert!(failure.kind.to_string().contains("derivative"));
    }

    #[test]
    fn newton_autodiff_needs_only_the_expression() {
        let f = parse("x^2 - 2").expect("parse");
        let config = SolverConfig::default();
        let solution = newton_raphson_autodiff(|x| f.eval(x), 1.5, &config).expect("solve");
        assert_eq!(solution.status, Status::Converged);
        assert_relative_eq!(solution.root, SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn newton_autodiff_agrees_with_symbolic_derivative() {
        let f = parse("cos(x) - x").expect("parse");
        let df = f.derivative();
        let config = SolverConfig::default();

        let auto = newton_raphson_autodiff(|x| f.eval(x), 1.0, &config).expect("solve");
        let symbolic =
            newton_raphson(|x| f.eval(x), |x| df.eval(x), 1.0, &config).expect("solve");
        assert_relative_eq!(auto.root, symbolic.root, epsilon = 1e-9);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = SolverConfig {
            tolerance: 0.0,
            ..SolverConfig::default()
        };
        let failure = bisection(quadratic, 1.0, 2.0, &config).expect_err("must fail");
        assert!(matches!(failure.kind, RootError::InvalidConfig { .. }));

        let config = SolverConfig {
            max_iterations: 0,
            ..SolverConfig::default()
        };
        let failure = fixed_point(|x| Ok(x), 1.0, &config).expect_err("must fail");
        assert!(matches!(failure.kind, RootError::InvalidConfig { .. }));
    }
}
