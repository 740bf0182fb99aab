//! Assembly of instrument constraints against the curve built so far.

use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::instruments::CalibrationInstrument;
use crate::latent_state::LatentStateSpec;
use crate::measure::ManifestQuotes;
use crate::response::ResponseCurve;

/// Turns an instrument and its quotes into a validated linear constraint.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintAssembler<'a> {
    ctx: &'a ValuationContext,
    state: &'a LatentStateSpec,
}

impl<'a> ConstraintAssembler<'a> {
    /// Creates an assembler for one latent state.
    pub fn new(ctx: &'a ValuationContext, state: &'a LatentStateSpec) -> Self {
        Self { ctx, state }
    }

    /// Asks the instrument for its constraint and checks it is usable.
    ///
    /// [`CurveError::Constraint`] from the instrument passes through so the
    /// caller can switch to root solving.
    pub fn assemble(
        &self,
        instrument: &dyn CalibrationInstrument,
        trial: &dyn ResponseCurve,
        quotes: &ManifestQuotes,
    ) -> CurveResult<PredictorResponseWeightConstraint> {
        let constraint = instrument.generate_constraint(self.ctx, trial, self.state, quotes)?;

        if constraint.is_empty() {
            return Err(CurveError::constraint(
                instrument.description(),
                "constraint has no predictor ordinates",
            ));
        }
        if !constraint.value().is_finite() {
            return Err(CurveError::invalid_spec(format!(
                "{}: constraint value {} is not finite",
                instrument.description(),
                constraint.value()
            )));
        }
        if let Some((t, w)) = constraint
            .weights()
            .find(|(t, w)| !t.is_finite() || !w.is_finite())
        {
            return Err(CurveError::invalid_spec(format!(
                "{}: non-finite weight {w} at ordinate {t}",
                instrument.description()
            )));
        }
        Ok(constraint)
    }
}
