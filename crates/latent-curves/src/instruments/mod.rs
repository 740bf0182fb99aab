//! Calibration instruments.
//!
//! Calibration only needs three things from an instrument: a maturity, a
//! linear(ized) constraint against a trial curve, and a reprice against a
//! finished curve. [`CalibrationInstrument`] is that interface. Cash-flow
//! conventions here are plain (index accrual basis, unadjusted
//! dates); richer instruments live with the caller.
//!
//! # Reference Instruments
//!
//! | Instrument | Latent state | Constraint |
//! |------------|--------------|------------|
//! | [`Deposit`] | discount factor | linear |
//! | [`FixFloatSwap`] | discount factor | linear (fixed and floating legs absorbed) |
//! | [`ForwardRateAgreement`] | forward rate | linear |
//! | [`CreditDefaultSwap`] | hazard rate | none: root-solved node |

mod cds;
mod deposit;
mod fra;
mod swap;

pub use cds::CreditDefaultSwap;
pub use deposit::Deposit;
pub use fra::ForwardRateAgreement;
pub use swap::FixFloatSwap;

use std::fmt;

use latent_core::Date;

use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::latent_state::{LatentStateLabel, LatentStateSpec, QuantificationMetric};
use crate::measure::{ManifestMeasure, ManifestQuotes};
use crate::response::ResponseCurve;

/// An instrument a curve can be calibrated to.
///
/// Instruments are immutable and shared between calibration runs through
/// `Arc`, so the trait requires `Send + Sync`.
pub trait CalibrationInstrument: Send + Sync + fmt::Debug {
    /// Maturity date; the instrument's segment ends at its ordinate.
    fn maturity(&self) -> Date;

    /// Linear constraint on the latent state implied by `quotes`.
    ///
    /// `trial` covers every ordinate already calibrated. Fails with
    /// [`CurveError::Constraint`] if the quote is not linear in the state,
    /// in which case the caller root-solves the segment's node instead.
    fn generate_constraint(
        &self,
        ctx: &ValuationContext,
        trial: &dyn ResponseCurve,
        state: &LatentStateSpec,
        quotes: &ManifestQuotes,
    ) -> CurveResult<PredictorResponseWeightConstraint>;

    /// Value of `measure` implied by a finished curve.
    fn reprice(
        &self,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        measure: ManifestMeasure,
    ) -> CurveResult<f64>;

    /// Forward label recorded in the stretch's merge ranges.
    fn forward_label(&self) -> Option<LatentStateLabel> {
        None
    }

    /// Starting bracket for a root-solved node, overriding the configured one.
    fn node_bracket(&self) -> Option<(f64, f64)> {
        None
    }

    /// Lowest admissible node value; bracket widening never goes below it.
    fn node_floor(&self) -> Option<f64> {
        None
    }

    /// Human readable description.
    fn description(&self) -> String;
}

/// Adds a tenor such as `ON`, `2W`, `3M` or `5Y` to a date.
pub fn add_tenor(start: Date, tenor: &str) -> CurveResult<Date> {
    let tenor = tenor.trim().to_uppercase();
    match tenor.as_str() {
        "ON" | "O/N" => return Ok(start.add_days(1)),
        "TN" | "T/N" => return Ok(start.add_days(2)),
        _ => {}
    }

    let invalid = || CurveError::invalid_spec(format!("invalid tenor '{tenor}'"));
    let unit = tenor.chars().last().ok_or_else(invalid)?;
    let count: i32 = tenor[..tenor.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;

    match unit {
        'D' => Ok(start.add_days(i64::from(count))),
        'W' => Ok(start.add_days(i64::from(count) * 7)),
        'M' => Ok(start.add_months(count)?),
        'Y' => Ok(start.add_years(count)?),
        _ => Err(invalid()),
    }
}

/// Period end dates rolled forward from `start` every `months`, with the
/// final (possibly short) period ending on `end`.
pub(crate) fn roll_schedule(start: Date, end: Date, months: u32) -> CurveResult<Vec<Date>> {
    if end <= start {
        return Err(CurveError::invalid_spec(format!(
            "schedule end {end} must follow start {start}"
        )));
    }
    if months == 0 {
        return Ok(vec![end]);
    }

    let step = i32::try_from(months).map_err(|_| CurveError::invalid_spec("period too long"))?;
    let mut dates = Vec::new();
    let mut k = 1;
    loop {
        let date = start.add_months(step * k)?;
        if date >= end {
            break;
        }
        dates.push(date);
        k += 1;
    }
    dates.push(end);
    Ok(dates)
}

/// Metric check shared by the instruments.
pub(crate) fn require_metric(
    instrument: &dyn CalibrationInstrument,
    state: &LatentStateSpec,
    expected: QuantificationMetric,
) -> CurveResult<()> {
    if state.metric == expected {
        Ok(())
    } else {
        Err(CurveError::constraint(
            instrument.description(),
            format!("no linear relation to a {:?} latent state", state.metric),
        ))
    }
}
