//! # Latent Core
//!
//! Core types shared by the Latent calibration crates.
//!
//! This crate provides:
//!
//! - **Types**: the [`Date`] newtype used for instrument maturities and
//!   valuation dates
//! - **Errors**: [`CoreError`] for invalid dates and inputs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod error;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::types::Date;
}

pub use error::{CoreError, CoreResult};
pub use types::Date;
