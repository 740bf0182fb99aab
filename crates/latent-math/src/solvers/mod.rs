//! Root-finding algorithms.
//!
//! - [`brent`] / [`try_brent`]: Brent's method on a known bracket. The
//!   `try_` form accepts objectives that can fail, which is how curve
//!   calibration drives nested repricing through the solver.
//! - [`BracketSearch`]: outward expansion of a starting interval until the
//!   objective changes sign.
//! - [`RootBracketSolver`]: bracket search followed by Brent refinement.
//!
//! Iteration is bounded by [`SolverConfig::max_iterations`]; there is no other
//! way to stop a running solve.
//!
//! # Example
//!
//! ```rust
//! use latent_math::solvers::{BracketSearch, RootBracketSolver, SolverConfig};
//! use latent_math::MathError;
//!
//! let solver = RootBracketSolver::new(BracketSearch::new(0.0, 1.0), SolverConfig::default());
//! let result = solver
//!     .solve(|x: f64| Ok::<_, MathError>(x * x - 2.0))
//!     .unwrap();
//! assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-10);
//! ```

mod bracket;
mod brent;

pub use bracket::{Bracket, BracketSearch, RootBracketSolver};
pub use brent::{brent, try_brent};

/// Default tolerance for root-finding algorithms.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Tolerance for convergence.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Result of a root-finding iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found.
    pub root: f64,
    /// Number of iterations used.
    pub iterations: u32,
    /// Final residual (function value at root).
    pub residual: f64,
}
