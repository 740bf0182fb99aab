//! Single-curve fixed-for-floating swap.

use latent_core::Date;

use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::instruments::{add_tenor, require_metric, roll_schedule, CalibrationInstrument};
use crate::latent_state::{LatentStateSpec, QuantificationMetric};
use crate::measure::{ManifestMeasure, ManifestQuotes};
use crate::response::ResponseCurve;

/// Fixed-for-floating swap discounted and projected on one curve.
///
/// The floating leg telescopes to `DF(start) - DF(end)`, so at par rate `c`
///
/// ```text
/// Σ c·τ_k·DF(t_k) + DF(end) - DF(start) = 0
/// ```
///
/// The fixed leg and the floating leg are built as separate constraints and
/// absorbed; the final coupon date and the floating leg's end coincide and
/// their weights add.
///
/// Quoted as [`ManifestMeasure::SwapRate`], [`ManifestMeasure::CalibSwapRate`]
/// or [`ManifestMeasure::Rate`].
#[derive(Debug, Clone, PartialEq)]
pub struct FixFloatSwap {
    index: String,
    start: Date,
    end: Date,
    fixed_frequency_months: u32,
}

impl FixFloatSwap {
    /// Creates a swap with the given fixed-leg payment frequency.
    #[must_use]
    pub fn new(index: impl Into<String>, start: Date, end: Date, fixed_frequency_months: u32) -> Self {
        Self {
            index: index.into(),
            start,
            end,
            fixed_frequency_months,
        }
    }

    /// Creates an annual-fixed swap from a tenor string.
    pub fn from_tenor(index: impl Into<String>, start: Date, tenor: &str) -> CurveResult<Self> {
        let end = add_tenor(start, tenor)?;
        Ok(Self::new(index, start, end, 12))
    }

    /// Fixed-leg `(payment date, accrual)` pairs.
    pub fn fixed_periods(&self, ctx: &ValuationContext) -> CurveResult<Vec<(Date, f64)>> {
        let conventions = ctx.registry().get(&self.index)?;
        let dates = roll_schedule(self.start, self.end, self.fixed_frequency_months)?;
        let mut previous = self.start;
        Ok(dates
            .into_iter()
            .map(|date| {
                let tau = conventions.accrual(previous, date);
                previous = date;
                (date, tau)
            })
            .collect())
    }

    fn quoted_rate(&self, quotes: &ManifestQuotes) -> CurveResult<(ManifestMeasure, f64)> {
        let measure = quotes.calibration_measure();
        match measure {
            ManifestMeasure::SwapRate | ManifestMeasure::CalibSwapRate | ManifestMeasure::Rate => {
                Ok((measure, quotes.calibration_quote()))
            }
            other => Err(CurveError::pricing(format!(
                "{} cannot be calibrated to {other}",
                self.description()
            ))),
        }
    }
}

impl CalibrationInstrument for FixFloatSwap {
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
        let (measure, rate) = self.quoted_rate(quotes)?;

        let mut fixed = PredictorResponseWeightConstraint::new();
        for (date, tau) in self.fixed_periods(ctx)? {
            let t = ctx.ordinate(date);
            fixed.add_weight(t, rate * tau);
            fixed.add_sensitivity_weight(measure, t, tau);
        }

        let mut floating = PredictorResponseWeightConstraint::new();
        floating.add_weight(ctx.ordinate(self.end), 1.0);
        floating.add_weight(ctx.ordinate(self.start), -1.0);

        Ok(fixed.absorbed(&floating))
    }

    fn reprice(
        &self,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        measure: ManifestMeasure,
    ) -> CurveResult<f64> {
        match measure {
            ManifestMeasure::SwapRate | ManifestMeasure::CalibSwapRate | ManifestMeasure::Rate => {
                let mut annuity = 0.0;
                for (date, tau) in self.fixed_periods(ctx)? {
                    annuity += tau * curve.response(ctx.ordinate(date))?;
                }
                let floating = curve.response(ctx.ordinate(self.start))?
                    - curve.response(ctx.ordinate(self.end))?;
                Ok(floating / annuity)
            }
            other => Err(CurveError::pricing(format!(
                "{} does not quote {other}",
                self.description()
            ))),
        }
    }

    fn description(&self) -> String {
        format!("Swap {} {} -> {}", self.index, self.start, self.end)
    }
}
