//! Calibration with a free epoch slope.
//!
//! With C1 or smoother continuity the epoch slope of a stretch is a free
//! parameter. [`calibrate_with_free_slope`] chooses it so that a derivative
//! at the stretch's right edge hits a target (zero curvature gives a natural
//! spline end). Each trial slope runs a complete inner calibration, so the
//! outer search nests every per-node solve of the stretch.
//!
//! A failing inner calibration aborts the search with that error; trial
//! slopes are not skipped or retried.

use latent_core::Date;

use crate::builder::{EpochResponse, SegmentSequenceBuilder};
use crate::config::CalibrationConfig;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::response::ResponseCurve;
use crate::span::Span;
use crate::stretch::Stretch;
use crate::stretch_spec::StretchSpec;
use latent_math::MathError;

/// Condition fixing the epoch slope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalCondition {
    /// Derivative order evaluated at the right edge.
    pub order: usize,
    /// Target value of that derivative.
    pub target: f64,
    /// Initial slope bracket.
    pub slope_bracket: (f64, f64),
}

impl TerminalCondition {
    /// Creates a condition.
    #[must_use]
    pub fn new(order: usize, target: f64, slope_bracket: (f64, f64)) -> Self {
        Self {
            order,
            target,
            slope_bracket,
        }
    }

    /// Zero second derivative at the right edge.
    #[must_use]
    pub fn natural() -> Self {
        Self::new(2, 0.0, (-1.0, 1.0))
    }
}

impl Default for TerminalCondition {
    fn default() -> Self {
        Self::natural()
    }
}

/// Calibrates `spec` with the epoch slope solved for `terminal`.
///
/// The slope in `epoch` is ignored.
pub fn calibrate_with_free_slope(
    spec: &StretchSpec,
    ctx: &ValuationContext,
    config: &CalibrationConfig,
    epoch: EpochResponse,
    terminal: TerminalCondition,
    prior: Option<&Span>,
) -> CurveResult<Stretch> {
    if !matches!(config.design.continuity.order(), Some(order) if order >= 1) {
        return Err(CurveError::config(format!(
            "a free epoch slope needs C1 or smoother continuity, not {:?}",
            config.design.continuity
        )));
    }

    let inner = config.clone().with_verify_recovery(false);
    let build = |slope: f64, config: &CalibrationConfig| -> CurveResult<Stretch> {
        let builder = SegmentSequenceBuilder::new(spec, ctx, config, epoch.with_slope(slope));
        match prior {
            Some(prior) => builder.with_prior(prior).build(),
            None => builder.build(),
        }
    };

    let mut evaluations = 0_u32;
    let objective = |slope: f64| -> CurveResult<f64> {
        evaluations += 1;
        let stretch = build(slope, &inner)?;
        Ok(stretch.response_derivative(stretch.right(), terminal.order)? - terminal.target)
    };

    let (lower, upper) = terminal.slope_bracket;
    let solution = config
        .root
        .solver(lower, upper)
        .solve(objective)
        .map_err(|err| match err {
            CurveError::Math {
                source: MathError::InvalidBracket { a, b, fa, fb },
            } => last_instrument_error(
                spec,
                format!(
                    "no epoch slope in [{a}, {b}] meets the terminal condition \
                     (residuals {fa:.3e}, {fb:.3e})"
                ),
            ),
            other => other,
        })?;

    tracing::debug!(
        stretch = spec.name(),
        slope = solution.root,
        iterations = solution.iterations,
        evaluations,
        "epoch slope solved"
    );
    build(solution.root, config)
}

fn last_instrument_error(spec: &StretchSpec, reason: String) -> CurveError {
    let index = spec.len() - 1;
    let maturity: Date = spec.instruments()[index].maturity();
    CurveError::calibration_failed(
        spec.name(),
        index,
        maturity,
        spec.quotes()[index].calibration_quote(),
        reason,
    )
}
