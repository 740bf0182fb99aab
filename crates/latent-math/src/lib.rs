//! # Latent Math
//!
//! Numerical utilities for the Latent calibration library.
//!
//! This crate provides:
//!
//! - **Solvers**: Brent root finding with fallible objectives, and a
//!   bracket-and-refine driver that expands a starting bracket before
//!   refining
//! - **Linear Algebra**: pivoted LU solves and equality-constrained
//!   least-roughness (KKT) solves
//! - **Basis**: local polynomial bases with derivative, integral and
//!   roughness-penalty rows for spline segments

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::unreadable_literal)]

pub mod basis;
pub mod error;
pub mod linear_algebra;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::basis::PolynomialBasis;
    pub use crate::error::{MathError, MathResult};
    pub use crate::linear_algebra::{solve_kkt, solve_linear_system};
    pub use crate::solvers::{
        brent, try_brent, Bracket, BracketSearch, RootBracketSolver, SolverConfig, SolverResult,
    };
}

pub use error::{MathError, MathResult};
