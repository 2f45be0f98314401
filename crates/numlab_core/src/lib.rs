//! The `numlab_core` crate is the numerical engine behind the Numlab
//! teaching demos. Each GUI shell pairs one of these pure routines with an
//! interactive plot; the engine itself holds no UI state and returns
//! complete results (value plus trace or table) per call.
//!
//! Key components:
//! - **Expr**: typed expression tree with parsing, generic evaluation
//!   (`f64` or `Dual`), and symbolic derivatives.
//! - **Roots**: bisection, secant, fixed-point iteration, and
//!   Newton-Raphson, each producing a full iteration trace.
//! - **Interp**: Lagrange and Newton divided-difference interpolation with
//!   step-by-step display helpers.
//! - **Fit**: least-squares polynomial fitting via the normal equations.
//! - **Autodiff**: dual numbers, so Newton-Raphson works from an
//!   expression alone.

pub mod autodiff;
pub mod expr;
pub mod fit;
pub mod interp;
pub mod point;
pub mod polynomial;
pub mod roots;
pub mod traits;
