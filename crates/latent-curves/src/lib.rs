//! # Latent Curves
//!
//! Segment-by-segment calibration of latent-state curves (discount
//! factors, forward rates, hazard rates) from market instruments.
//!
//! This crate provides:
//!
//! - **Constraints**: instruments express their quotes as linear
//!   predictor/response-weight constraints, or fall back to a root-solved
//!   node when no linear form exists
//! - **Segment Builder**: a state machine that fits one polynomial segment
//!   per instrument with continuity and least-roughness shape control
//! - **Sensitivities**: analytic quote sensitivities of every segment
//!   coefficient, replayed through the calibration systems
//! - **Spans and Curves**: merging stretches into spans, named curves with
//!   audit inputs and turn overlays
//! - **Scenarios**: bump-and-recalibrate curve sets, in parallel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use latent_curves::prelude::*;
//!
//! let ctx = ValuationContext::new(valuation_date, Arc::new(IndexRegistry::standard()));
//! let spec = StretchSpec::from_pairs(
//!     "USD-FUNDING",
//!     LatentStateSpec::funding("USD"),
//!     vec![(deposit_3m, ManifestQuotes::new(ManifestMeasure::Rate, 0.031))],
//! )?;
//!
//! let stretch = SegmentSequenceBuilder::new(&spec, &ctx, &config, EpochResponse::discount())
//!     .build()?;
//! let df = stretch.response(0.5)?;
//! ```

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
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]

pub mod assembler;
pub mod builder;
pub mod calibrator;
pub mod config;
pub mod constraint;
pub mod context;
pub mod curve;
pub mod error;
pub mod instruments;
pub mod latent_state;
pub mod measure;
pub mod repricing;
pub mod response;
pub mod scenario;
pub mod segment;
pub mod sensitivity;
pub mod slope;
pub mod span;
pub mod stretch;
pub mod stretch_spec;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assembler::ConstraintAssembler;
    pub use crate::builder::{BuildState, EpochResponse, SegmentSequenceBuilder, StretchAccumulator, MAX_EPOCH_ORDER};
    pub use crate::calibrator::{calibrate_stretch, CurveCalibrator};
    pub use crate::config::{CalibrationConfig, RootSearchConfig};
    pub use crate::constraint::PredictorResponseWeightConstraint;
    pub use crate::context::{IndexConventions, IndexRegistry, ValuationContext};
    pub use crate::curve::{Curve, Turn};
    pub use crate::error::{CurveError, CurveResult};
    pub use crate::instruments::{
        add_tenor, CalibrationInstrument, CreditDefaultSwap, Deposit, FixFloatSwap,
        ForwardRateAgreement,
    };
    pub use crate::latent_state::{LatentStateLabel, LatentStateSpec, QuantificationMetric};
    pub use crate::measure::{ManifestMeasure, ManifestQuotes};
    pub use crate::repricing::{RepricingCheck, RepricingReport};
    pub use crate::response::ResponseCurve;
    pub use crate::scenario::{generate_scenarios, ScenarioGenerator, ScenarioMap, ScenarioMode, ScenarioSet};
    pub use crate::segment::{Continuity, SegmentDesign, ShapeControl};
    pub use crate::sensitivity::{propagate_sensitivities, QuoteKey, SensitivityPropagator, SensitivityTable};
    pub use crate::slope::{calibrate_with_free_slope, TerminalCondition};
    pub use crate::span::{merge_stretches, Span};
    pub use crate::stretch::Stretch;
    pub use crate::stretch_spec::StretchSpec;
    pub use latent_core::Date;
}

pub use curve::Curve;
pub use error::{CurveError, CurveResult};
pub use response::ResponseCurve;
pub use stretch::Stretch;
pub use stretch_spec::StretchSpec;
