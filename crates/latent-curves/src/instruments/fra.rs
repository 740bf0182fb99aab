//! Forward rate agreement on a forward-rate latent state.

use latent_core::Date;

use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::instruments::{require_metric, CalibrationInstrument};
use crate::latent_state::{LatentStateLabel, LatentStateSpec, QuantificationMetric};
use crate::measure::{ManifestMeasure, ManifestQuotes};
use crate::response::ResponseCurve;

/// A FRA fixing the forward rate of `index` over `[start, end]`.
///
/// The forward latent state is indexed by the accrual end date, so the
/// constraint is the single point condition `F(end) = quote`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRateAgreement {
    index: String,
    start: Date,
    end: Date,
}

impl ForwardRateAgreement {
    /// Creates a FRA.
    #[must_use]
    pub fn new(index: impl Into<String>, start: Date, end: Date) -> Self {
        Self {
            index: index.into(),
            start,
            end,
        }
    }

    /// Floating rate index.
    pub fn index(&self) -> &str {
        &self.index
    }

    fn check_measure(&self, measure: ManifestMeasure) -> CurveResult<()> {
        match measure {
            ManifestMeasure::ForwardRate | ManifestMeasure::Rate => Ok(()),
            other => Err(CurveError::pricing(format!(
                "{} does not quote {other}",
                self.description()
            ))),
        }
    }
}

impl CalibrationInstrument for ForwardRateAgreement {
    fn maturity(&self) -> Date {
        self.end
    }

    fn generate_constraint(
        &self,
        ctx: &ValuationContext,
        _trial: &dyn ResponseCurve,
        state: &LatentStateSpec,
        quotes: &ManifestQuotes,
    ) -> CurveResult<PredictorResponseWeightConstraint> {
        require_metric(self, state, QuantificationMetric::ForwardRate)?;
        let measure = quotes.calibration_measure();
        self.check_measure(measure)?;

        let mut constraint = PredictorResponseWeightConstraint::new();
        constraint.add_weight(ctx.ordinate(self.end), 1.0);
        constraint.add_value(quotes.calibration_quote());
        constraint.add_sensitivity_value(measure, 1.0);
        Ok(constraint)
    }

    fn reprice(
        &self,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        measure: ManifestMeasure,
    ) -> CurveResult<f64> {
        self.check_measure(measure)?;
        curve.response(ctx.ordinate(self.end))
    }

    fn forward_label(&self) -> Option<LatentStateLabel> {
        Some(LatentStateLabel::Forward(self.index.clone()))
    }

    fn description(&self) -> String {
        format!("FRA {} {} -> {}", self.index, self.start, self.end)
    }
}
