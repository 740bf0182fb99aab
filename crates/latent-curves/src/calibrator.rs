//! Multi-stretch curve calibration.
//!
//! [`CurveCalibrator`] owns a valuation context and configuration and chains
//! stretch builds: each stretch starts where the previous one ends, with the
//! previous stretch's right-edge value and every derivative the continuity
//! matches as its epoch, and sees the stretches built so far as a prior span.

use crate::builder::{EpochResponse, SegmentSequenceBuilder};
use crate::config::CalibrationConfig;
use crate::context::ValuationContext;
use crate::curve::Curve;
use crate::error::{CurveError, CurveResult};
use crate::response::ResponseCurve;
use crate::segment::{Continuity, ShapeControl};
use crate::span::Span;
use crate::stretch::Stretch;
use crate::stretch_spec::StretchSpec;

/// Calibrates stretches and curves against one valuation context.
#[derive(Debug, Clone)]
pub struct CurveCalibrator {
    ctx: ValuationContext,
    config: CalibrationConfig,
}

impl CurveCalibrator {
    /// Creates a calibrator, validating the configuration.
    pub fn new(ctx: ValuationContext, config: CalibrationConfig) -> CurveResult<Self> {
        config.validate()?;
        Ok(Self { ctx, config })
    }

    /// Valuation context.
    pub fn ctx(&self) -> &ValuationContext {
        &self.ctx
    }

    /// Configuration.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Calibrates one stretch, optionally on top of a prior span.
    pub fn calibrate_stretch(
        &self,
        spec: &StretchSpec,
        epoch: EpochResponse,
        prior: Option<&Span>,
    ) -> CurveResult<Stretch> {
        let builder = SegmentSequenceBuilder::new(spec, &self.ctx, &self.config, epoch);
        match prior {
            Some(prior) => builder.with_prior(prior).build(),
            None => builder.build(),
        }
    }

    /// Calibrates `specs` in order into a single named curve.
    pub fn calibrate_curve(
        &self,
        name: impl Into<String>,
        specs: &[StretchSpec],
        epoch: EpochResponse,
    ) -> CurveResult<Curve> {
        let name = name.into();
        if specs.is_empty() {
            return Err(CurveError::invalid_spec(format!("curve '{name}' has no stretches")));
        }

        let mut span = Span::new();
        let mut epoch = epoch;
        for spec in specs {
            let stretch = self.calibrate_stretch(spec, epoch, Some(&span))?;
            epoch = self.next_epoch(&stretch)?;
            span.add_stretch(stretch)?;
        }

        tracing::info!(curve = %name, stretches = specs.len(), "curve calibrated");
        Curve::new(name, span, specs.to_vec())
    }

    fn next_epoch(&self, stretch: &Stretch) -> CurveResult<EpochResponse> {
        let order = self.config.design.continuity.order().unwrap_or(0);
        EpochResponse::continuing(stretch, stretch.right(), order)
    }
}

/// Calibrates one stretch with the given continuity and shape control and
/// default settings otherwise.
///
/// The degree is the lowest that leaves each segment a spare coefficient
/// for the roughness penalty, and never below the default cubic;
/// discontinuous stretches are piecewise flat.
pub fn calibrate_stretch(
    spec: &StretchSpec,
    ctx: &ValuationContext,
    epoch: EpochResponse,
    continuity: Continuity,
    shape: ShapeControl,
) -> CurveResult<Stretch> {
    let defaults = CalibrationConfig::default();
    let degree = match continuity.order() {
        None => 0,
        Some(order) => (order + 2).max(defaults.design.degree),
    };
    let design = defaults
        .design
        .with_continuity(continuity)
        .with_shape(shape)
        .with_degree(degree);
    let config = defaults.with_design(design);
    config.validate()?;
    SegmentSequenceBuilder::new(spec, ctx, &config, epoch).build()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::instruments::{CalibrationInstrument, CreditDefaultSwap, Deposit, FixFloatSwap};
    use crate::latent_state::LatentStateSpec;
    use crate::measure::{ManifestMeasure, ManifestQuotes};
    use crate::segment::SegmentDesign;
    use crate::test_support::{context, context_with_funding};
    use approx::assert_relative_eq;

    fn short_end(ctx: &ValuationContext) -> StretchSpec {
        let pairs = [("3M", 0.03), ("6M", 0.031), ("1Y", 0.032)]
            .into_iter()
            .map(|(tenor, rate)| {
                let deposit = Deposit::from_tenor("USD-SOFR", ctx.valuation_date(), tenor).unwrap();
                (
                    Arc::new(deposit) as Arc<dyn CalibrationInstrument>,
                    ManifestQuotes::new(ManifestMeasure::Rate, rate),
                )
            })
            .collect();
        StretchSpec::from_pairs("USD-SHORT", LatentStateSpec::funding("USD"), pairs).unwrap()
    }

    fn long_end(ctx: &ValuationContext) -> StretchSpec {
        let pairs = [("2Y", 0.033), ("5Y", 0.035)]
            .into_iter()
            .map(|(tenor, rate)| {
                let swap = FixFloatSwap::from_tenor("USD-SOFR", ctx.valuation_date(), tenor).unwrap();
                (
                    Arc::new(swap) as Arc<dyn CalibrationInstrument>,
                    ManifestQuotes::new(ManifestMeasure::SwapRate, rate),
                )
            })
            .collect();
        StretchSpec::from_pairs("USD-LONG", LatentStateSpec::funding("USD"), pairs).unwrap()
    }

    #[test]
    fn test_chained_stretches_recover_quotes() {
        let ctx = context();
        let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
        let specs = vec![short_end(&ctx), long_end(&ctx)];
        let curve = calibrator
            .calibrate_curve("USD", &specs, EpochResponse::discount())
            .unwrap();

        assert_eq!(curve.span().len(), 2);
        assert_eq!(curve.inputs().len(), 2);
        for spec in &specs {
            for (instrument, quotes) in spec.instruments().iter().zip(spec.quotes()) {
                let model = instrument
                    .reprice(&ctx, &curve, quotes.calibration_measure())
                    .unwrap();
                assert_relative_eq!(model, quotes.calibration_quote(), epsilon = 1e-8);
            }
        }

        // value and slope match where the stretches meet
        let knot = curve.span().stretches()[0].right();
        let (short, long) = (&curve.span().stretches()[0], &curve.span().stretches()[1]);
        assert_relative_eq!(short.response(knot).unwrap(), long.response(knot).unwrap(), epsilon = 1e-12);
        assert_relative_eq!(
            short.response_derivative(knot, 1).unwrap(),
            long.response_derivative(knot, 1).unwrap(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_empty_curve_rejected() {
        let calibrator = CurveCalibrator::new(context(), CalibrationConfig::default()).unwrap();
        assert!(calibrator
            .calibrate_curve("USD", &[], EpochResponse::discount())
            .is_err());
    }

    #[test]
    fn test_chained_c2_joint_matches_curvature() {
        let ctx = context();
        let config = CalibrationConfig::default()
            .with_design(SegmentDesign::smooth().with_continuity(Continuity::C2).with_degree(4));
        let calibrator = CurveCalibrator::new(ctx.clone(), config).unwrap();
        let curve = calibrator
            .calibrate_curve("USD", &[short_end(&ctx), long_end(&ctx)], EpochResponse::discount())
            .unwrap();

        let (short, long) = (&curve.span().stretches()[0], &curve.span().stretches()[1]);
        let knot = short.right();
        for order in 0..=2 {
            let left = short.response_derivative(knot, order).unwrap();
            let right = long.response_derivative(knot, order).unwrap();
            assert!(
                (left - right).abs() <= 1e-9 * left.abs().max(1.0),
                "order {order}: {left} vs {right}"
            );
        }
        assert!(long.epoch().inherited);
        assert_eq!(long.epoch().derivative(2), Some(short.response_derivative(knot, 2).unwrap()));
    }

    #[test]
    fn test_free_function_every_continuity() {
        let ctx = context();
        for (continuity, degree) in [
            (Continuity::C0, 3),
            (Continuity::C1, 3),
            (Continuity::C2, 4),
            (Continuity::C3, 5),
        ] {
            let spec = short_end(&ctx);
            let stretch = calibrate_stretch(&spec, &ctx, EpochResponse::discount(), continuity, ShapeControl::default())
                .unwrap_or_else(|err| panic!("{continuity:?}: {err}"));
            assert_eq!(stretch.segments().len(), 3);
            assert_eq!(stretch.design().degree, degree);
            assert!(stretch.repricing().unwrap().is_valid());
        }

        let ctx = context_with_funding(0.03);
        let cds = CreditDefaultSwap::from_tenor("ACME", "USD", ctx.valuation_date(), "2Y").unwrap();
        let spec = StretchSpec::from_pairs(
            "ACME",
            LatentStateSpec::credit("ACME"),
            vec![(
                Arc::new(cds) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::Upfront, 0.004),
            )],
        )
        .unwrap();
        let stretch = calibrate_stretch(
            &spec,
            &ctx,
            EpochResponse::new(0.0, 0.0),
            Continuity::Discontinuous,
            ShapeControl::default(),
        )
        .unwrap();
        assert_eq!(stretch.design().degree, 0);
        assert!(stretch.segments()[0].value(stretch.right()) > 0.0);
    }
}
