//! Error types for curve calibration.
//!
//! The calibration taxonomy:
//!
//! - [`CurveError::Constraint`]: an instrument cannot express a linear
//!   relation in the unknown curve values. Recoverable; the segment builder
//!   falls back to a root-solved node.
//! - [`CurveError::NoRootBracket`]: the nonlinear node objective has the same
//!   sign at both ends of every bracket tried. Fatal for the run.
//! - [`CurveError::Calibration`]: a segment or stretch could not be built.
//!   Carries the failing instrument's index, maturity and quote.
//! - [`CurveError::Merge`]: stretches cannot be combined into a span.

use latent_core::{CoreError, Date};
use latent_math::MathError;
use thiserror::Error;

/// A specialized Result type for curve operations.
pub type CurveResult<T> = Result<T, CurveError>;

/// Error types for curve calibration.
#[derive(Error, Debug, Clone)]
pub enum CurveError {
    /// The instrument cannot be written as a linear constraint.
    #[error("Constraint error for {instrument}: {reason}")]
    Constraint {
        /// Instrument description.
        instrument: String,
        /// Why no linear constraint exists.
        reason: String,
    },

    /// No sign change of the node objective inside the searched bracket.
    #[error(
        "No root bracket in stretch '{stretch}' for instrument {instrument_index} \
         (maturity {maturity}, quote {quote}): f({lower}) = {f_lower:.3e}, f({upper}) = {f_upper:.3e}"
    )]
    NoRootBracket {
        /// Stretch being calibrated.
        stretch: String,
        /// Index of the instrument within its stretch.
        instrument_index: usize,
        /// Instrument maturity.
        maturity: Date,
        /// Quote the node was solved against.
        quote: f64,
        /// Last lower end tried.
        lower: f64,
        /// Last upper end tried.
        upper: f64,
        /// Objective at the lower end.
        f_lower: f64,
        /// Objective at the upper end.
        f_upper: f64,
    },

    /// A segment of a stretch could not be calibrated.
    #[error(
        "Calibration of stretch '{stretch}' failed at instrument {instrument_index} \
         (maturity {maturity}, quote {quote}): {reason}"
    )]
    Calibration {
        /// Stretch being calibrated.
        stretch: String,
        /// Index of the instrument within its stretch.
        instrument_index: usize,
        /// Instrument maturity.
        maturity: Date,
        /// Quote attempted.
        quote: f64,
        /// Description of the failure.
        reason: String,
    },

    /// Stretches cannot be merged.
    #[error("Merge error: {reason}")]
    Merge {
        /// Description of the conflict.
        reason: String,
    },

    /// An instrument could not be priced.
    #[error("Pricing error: {reason}")]
    Pricing {
        /// Description of the pricing failure.
        reason: String,
    },

    /// The stretch specification is malformed.
    #[error("Invalid stretch spec: {reason}")]
    InvalidSpec {
        /// What is malformed.
        reason: String,
    },

    /// Ordinate outside the range a curve covers.
    #[error("Ordinate {ordinate:.6} out of range [{min:.6}, {max:.6}]")]
    OrdinateOutOfRange {
        /// Requested ordinate.
        ordinate: f64,
        /// Lowest covered ordinate.
        min: f64,
        /// Highest covered ordinate.
        max: f64,
    },

    /// The segment builder was driven from the wrong state.
    #[error("Builder error: {reason}")]
    BuilderState {
        /// Description of the misuse.
        reason: String,
    },

    /// No curve registered for the requested latent state.
    #[error("Curve not found: {label}")]
    CurveNotFound {
        /// Latent state label that was requested.
        label: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of the configuration problem.
        reason: String,
    },

    /// Mathematical error.
    #[error("Math error: {source}")]
    Math {
        /// Underlying numerical failure.
        #[from]
        source: MathError,
    },

    /// Date or input error from core types.
    #[error("Core error: {source}")]
    Core {
        /// Underlying core failure.
        #[from]
        source: CoreError,
    },
}

impl CurveError {
    /// Creates a constraint error.
    #[must_use]
    pub fn constraint(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Constraint {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    /// Creates a calibration error.
    #[must_use]
    pub fn calibration_failed(
        stretch: impl Into<String>,
        instrument_index: usize,
        maturity: Date,
        quote: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self::Calibration {
            stretch: stretch.into(),
            instrument_index,
            maturity,
            quote,
            reason: reason.into(),
        }
    }

    /// Creates a merge error.
    #[must_use]
    pub fn merge(reason: impl Into<String>) -> Self {
        Self::Merge {
            reason: reason.into(),
        }
    }

    /// Creates a pricing error.
    #[must_use]
    pub fn pricing(reason: impl Into<String>) -> Self {
        Self::Pricing {
            reason: reason.into(),
        }
    }

    /// Creates an invalid spec error.
    #[must_use]
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Creates an ordinate out of range error.
    #[must_use]
    pub fn ordinate_out_of_range(ordinate: f64, min: f64, max: f64) -> Self {
        Self::OrdinateOutOfRange { ordinate, min, max }
    }

    /// Creates a builder state error.
    #[must_use]
    pub fn builder_state(reason: impl Into<String>) -> Self {
        Self::BuilderState {
            reason: reason.into(),
        }
    }

    /// Creates a curve not found error.
    #[must_use]
    pub fn curve_not_found(label: impl ToString) -> Self {
        Self::CurveNotFound {
            label: label.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// True for errors the segment builder recovers from by root solving.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }
}
