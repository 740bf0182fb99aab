//! Credit default swap on a hazard-rate latent state.

use latent_core::Date;

use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::instruments::{add_tenor, roll_schedule, CalibrationInstrument};
use crate::latent_state::{LatentStateLabel, LatentStateSpec};
use crate::measure::{ManifestMeasure, ManifestQuotes};
use crate::response::ResponseCurve;

/// Premium accrual basis (ACT/360).
const PREMIUM_DAYS_PER_YEAR: f64 = 360.0;

/// Default running coupon (100bp).
pub const DEFAULT_COUPON: f64 = 0.01;

/// Default recovery rate.
pub const DEFAULT_RECOVERY: f64 = 0.4;

/// Single-name CDS with a running coupon.
///
/// Survival is `Q(t) = exp(-∫λ)`, so neither leg is linear in the hazard
/// rate and the instrument never produces a linear constraint: each node is
/// root-solved against the quote. Legs are discounted on the funding curve
/// of the contract currency taken from the valuation context.
///
/// - protection: `(1 - R) Σ DF(mid_k)·(Q(t_{k-1}) - Q(t_k))`
/// - risky annuity: `Σ τ_k·DF(t_k)·Q(t_k) + ½ τ_k·DF(mid_k)·(Q(t_{k-1}) - Q(t_k))`
///
/// [`ManifestMeasure::Upfront`] is `protection - coupon · annuity` and
/// [`ManifestMeasure::ParSpread`] is `protection / annuity`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditDefaultSwap {
    entity: String,
    currency: String,
    start: Date,
    end: Date,
    coupon: f64,
    recovery: f64,
    frequency_months: u32,
}

/// Present values of the two legs per unit notional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdsLegs {
    /// Protection leg.
    pub protection: f64,
    /// Risky annuity (premium leg per unit spread).
    pub annuity: f64,
}

impl CreditDefaultSwap {
    /// Creates a quarterly-paying CDS with the default coupon and recovery.
    #[must_use]
    pub fn new(entity: impl Into<String>, currency: impl Into<String>, start: Date, end: Date) -> Self {
        Self {
            entity: entity.into(),
            currency: currency.into(),
            start,
            end,
            coupon: DEFAULT_COUPON,
            recovery: DEFAULT_RECOVERY,
            frequency_months: 3,
        }
    }

    /// Creates a CDS from a tenor string.
    pub fn from_tenor(
        entity: impl Into<String>,
        currency: impl Into<String>,
        start: Date,
        tenor: &str,
    ) -> CurveResult<Self> {
        let end = add_tenor(start, tenor)?;
        Ok(Self::new(entity, currency, start, end))
    }

    /// Sets the running coupon.
    #[must_use]
    pub fn with_coupon(mut self, coupon: f64) -> Self {
        self.coupon = coupon;
        self
    }

    /// Sets the recovery rate.
    #[must_use]
    pub fn with_recovery(mut self, recovery: f64) -> Self {
        self.recovery = recovery;
        self
    }

    /// Values both legs against a hazard curve.
    pub fn legs(&self, ctx: &ValuationContext, hazard: &dyn ResponseCurve) -> CurveResult<CdsLegs> {
        let discount = ctx.curve(&LatentStateLabel::Funding(self.currency.clone()))?;
        let loss = 1.0 - self.recovery;

        let mut protection = 0.0;
        let mut annuity = 0.0;
        let mut previous = self.start;
        let mut t_prev = ctx.ordinate(previous);
        let mut q_prev = hazard.survival_probability(t_prev)?;

        for date in roll_schedule(self.start, self.end, self.frequency_months)? {
            let t = ctx.ordinate(date);
            let tau = previous.days_between(&date) as f64 / PREMIUM_DAYS_PER_YEAR;
            let q = hazard.survival_probability(t)?;
            let df = discount.response(t)?;
            let df_mid = discount.response(0.5 * (t_prev + t))?;
            let default_probability = q_prev - q;

            protection += loss * df_mid * default_probability;
            annuity += tau * df * q + 0.5 * tau * df_mid * default_probability;

            previous = date;
            t_prev = t;
            q_prev = q;
        }

        Ok(CdsLegs {
            protection,
            annuity,
        })
    }
}

impl CalibrationInstrument for CreditDefaultSwap {
    fn maturity(&self) -> Date {
        self.end
    }

    fn generate_constraint(
        &self,
        _ctx: &ValuationContext,
        _trial: &dyn ResponseCurve,
        _state: &LatentStateSpec,
        _quotes: &ManifestQuotes,
    ) -> CurveResult<PredictorResponseWeightConstraint> {
        Err(CurveError::constraint(
            self.description(),
            "survival is exponential in the hazard rate",
        ))
    }

    fn reprice(
        &self,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        measure: ManifestMeasure,
    ) -> CurveResult<f64> {
        let legs = self.legs(ctx, curve)?;
        match measure {
            ManifestMeasure::Upfront => Ok(legs.protection - self.coupon * legs.annuity),
            ManifestMeasure::ParSpread => {
                if legs.annuity <= 0.0 {
                    return Err(CurveError::pricing(format!(
                        "{} has a non-positive risky annuity",
                        self.description()
                    )));
                }
                Ok(legs.protection / legs.annuity)
            }
            other => Err(CurveError::pricing(format!(
                "{} does not quote {other}",
                self.description()
            ))),
        }
    }

    fn node_bracket(&self) -> Option<(f64, f64)> {
        Some((0.0, 1.0))
    }

    fn node_floor(&self) -> Option<f64> {
        Some(0.0)
    }

    fn description(&self) -> String {
        format!("CDS {} {} -> {}", self.entity, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context_with_funding, Constant};
    use approx::assert_relative_eq;

    fn cds(ctx: &ValuationContext) -> CreditDefaultSwap {
        CreditDefaultSwap::from_tenor("ACME", "USD", ctx.valuation_date(), "5Y").unwrap()
    }

    #[test]
    fn test_zero_hazard_has_no_protection() {
        let ctx = context_with_funding(0.03);
        let legs = cds(&ctx).legs(&ctx, &Constant::new(0.0)).unwrap();

        assert_relative_eq!(legs.protection, 0.0);
        assert!(legs.annuity > 4.0 && legs.annuity < 5.1);
    }

    #[test]
    fn test_credit_triangle() {
        // Par spread ≈ λ(1 - R) for a flat hazard rate.
        let ctx = context_with_funding(0.03);
        let spread = cds(&ctx)
            .reprice(&ctx, &Constant::new(0.02), ManifestMeasure::ParSpread)
            .unwrap();
        assert_relative_eq!(spread, 0.012, epsilon = 3e-4);
    }

    #[test]
    fn test_upfront_increases_with_hazard() {
        let ctx = context_with_funding(0.03);
        let contract = cds(&ctx);
        let low = contract.reprice(&ctx, &Constant::new(0.01), ManifestMeasure::Upfront).unwrap();
        let high = contract.reprice(&ctx, &Constant::new(0.05), ManifestMeasure::Upfront).unwrap();
        assert!(high > low);
    }

    #[test]
    fn test_never_linear() {
        let ctx = context_with_funding(0.03);
        let quotes = ManifestQuotes::new(ManifestMeasure::Upfront, 0.01);
        let err = cds(&ctx)
            .generate_constraint(&ctx, &Constant::new(0.0), &LatentStateSpec::credit("ACME"), &quotes)
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_funding_curve() {
        let ctx = crate::test_support::context();
        assert!(matches!(
            cds(&ctx).legs(&ctx, &Constant::new(0.01)),
            Err(CurveError::CurveNotFound { .. })
        ));
    }
}
