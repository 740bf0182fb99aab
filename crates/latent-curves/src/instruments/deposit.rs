//! Money market deposit.

use latent_core::Date;

use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::instruments::{add_tenor, require_metric, CalibrationInstrument};
use crate::latent_state::{LatentStateSpec, QuantificationMetric};
use crate::measure::{ManifestMeasure, ManifestQuotes};
use crate::response::ResponseCurve;

/// A deposit paying simple interest at the index accrual basis.
///
/// At rate `r` and accrual `τ` the deposit prices at par when
/// `(1 + rτ)·DF(end) - DF(start) = 0`, which is linear in the discount
/// factors. Quoted as [`ManifestMeasure::Rate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Deposit {
    index: String,
    start: Date,
    end: Date,
}

impl Deposit {
    /// Creates a deposit between two dates accruing on `index`'s basis.
    #[must_use]
    pub fn new(index: impl Into<String>, start: Date, end: Date) -> Self {
        Self {
            index: index.into(),
            start,
            end,
        }
    }

    /// Creates a deposit from a tenor string (`ON`, `1W`, `3M`, …).
    pub fn from_tenor(index: impl Into<String>, start: Date, tenor: &str) -> CurveResult<Self> {
        let end = add_tenor(start, tenor)?;
        Ok(Self::new(index, start, end))
    }

    /// Start date.
    pub fn start_date(&self) -> Date {
        self.start
    }

    /// End date.
    pub fn end_date(&self) -> Date {
        self.end
    }

    /// Accrual fraction on the index basis.
    pub fn accrual(&self, ctx: &ValuationContext) -> CurveResult<f64> {
        let tau = ctx.registry().get(&self.index)?.accrual(self.start, self.end);
        if tau <= 0.0 {
            return Err(CurveError::invalid_spec(format!(
                "{} has a non-positive accrual period",
                self.description()
            )));
        }
        Ok(tau)
    }
}

impl CalibrationInstrument for Deposit {
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
        require_metric(self, state, QuantificationMetric::DiscountFactor)?;
        let rate = quotes.require(ManifestMeasure::Rate)?;
        let tau = self.accrual(ctx)?;
        let t_start = ctx.ordinate(self.start);
        let t_end = ctx.ordinate(self.end);

        let mut constraint = PredictorResponseWeightConstraint::new();
        constraint.add_weight(t_end, 1.0 + rate * tau);
        constraint.add_weight(t_start, -1.0);
        constraint.add_sensitivity_weight(ManifestMeasure::Rate, t_end, tau);
        Ok(constraint)
    }

    fn reprice(
        &self,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        measure: ManifestMeasure,
    ) -> CurveResult<f64> {
        match measure {
            ManifestMeasure::Rate => {
                let tau = self.accrual(ctx)?;
                let df_start = curve.response(ctx.ordinate(self.start))?;
                let df_end = curve.response(ctx.ordinate(self.end))?;
                Ok((df_start / df_end - 1.0) / tau)
            }
            other => Err(CurveError::pricing(format!(
                "{} does not quote {other}",
                self.description()
            ))),
        }
    }

    fn description(&self) -> String {
        format!("Deposit {} {} -> {}", self.index, self.start, self.end)
    }
}
