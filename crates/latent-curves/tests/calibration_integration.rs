//! Integration tests for stretch and curve calibration.
//!
//! Exercises the public API end to end: building stretches from deposits,
//! swaps, FRAs and CDS, chaining them into curves, and checking quote
//! recovery, knot continuity, merge behavior and quote sensitivities.

use std::sync::Arc;

use approx::assert_relative_eq;
use latent_curves::prelude::*;
use latent_curves::segment::SegmentMode;

// =============================================================================
// HELPERS
// =============================================================================

fn valuation_date() -> Date {
    Date::from_ymd(2025, 1, 2).unwrap()
}

fn context() -> ValuationContext {
    ValuationContext::new(valuation_date(), Arc::new(IndexRegistry::standard()))
}

/// Funding curve with a constant continuously compounded rate.
struct FlatFunding {
    rate: f64,
}

impl ResponseCurve for FlatFunding {
    fn response(&self, t: f64) -> CurveResult<f64> {
        Ok((-self.rate * t).exp())
    }

    fn response_derivative(&self, t: f64, order: usize) -> CurveResult<f64> {
        Ok((-self.rate).powi(order as i32) * (-self.rate * t).exp())
    }

    fn response_integral(&self, from: f64, to: f64) -> CurveResult<f64> {
        Ok(((-self.rate * from).exp() - (-self.rate * to).exp()) / self.rate)
    }

    fn ordinate_range(&self) -> (f64, f64) {
        (0.0, 100.0)
    }
}

fn context_with_funding(rate: f64) -> ValuationContext {
    context().with_curve(
        LatentStateLabel::Funding("USD".into()),
        Arc::new(FlatFunding { rate }),
    )
}

fn deposit_pairs(
    ctx: &ValuationContext,
    quotes: &[(&str, f64)],
) -> Vec<(Arc<dyn CalibrationInstrument>, ManifestQuotes)> {
    quotes
        .iter()
        .map(|(tenor, rate)| {
            let deposit = Deposit::from_tenor("USD-SOFR", ctx.valuation_date(), tenor).unwrap();
            (
                Arc::new(deposit) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::Rate, *rate),
            )
        })
        .collect()
}

fn swap_pairs(
    ctx: &ValuationContext,
    quotes: &[(&str, f64)],
) -> Vec<(Arc<dyn CalibrationInstrument>, ManifestQuotes)> {
    quotes
        .iter()
        .map(|(tenor, rate)| {
            let swap = FixFloatSwap::from_tenor("USD-SOFR", ctx.valuation_date(), tenor).unwrap();
            (
                Arc::new(swap) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::SwapRate, *rate),
            )
        })
        .collect()
}

fn money_market(ctx: &ValuationContext) -> StretchSpec {
    let pairs = deposit_pairs(ctx, &[("1M", 0.0430), ("3M", 0.0425), ("6M", 0.0415), ("1Y", 0.0400)]);
    StretchSpec::from_pairs("USD-MM", LatentStateSpec::funding("USD"), pairs).unwrap()
}

fn swaps(ctx: &ValuationContext) -> StretchSpec {
    let pairs = swap_pairs(ctx, &[("2Y", 0.0380), ("3Y", 0.0370), ("5Y", 0.0365), ("10Y", 0.0375)]);
    StretchSpec::from_pairs("USD-SWAP", LatentStateSpec::funding("USD"), pairs).unwrap()
}

fn assert_recovers(ctx: &ValuationContext, curve: &dyn ResponseCurve, spec: &StretchSpec, tol: f64) {
    for (instrument, quotes) in spec.instruments().iter().zip(spec.quotes()) {
        let model = instrument
            .reprice(ctx, curve, quotes.calibration_measure())
            .unwrap();
        assert!(
            (model - quotes.calibration_quote()).abs() <= tol,
            "{}: model {model} vs quote {}",
            instrument.description(),
            quotes.calibration_quote()
        );
    }
}

// =============================================================================
// RECOVERY
// =============================================================================

#[test]
fn test_funding_curve_recovers_all_quotes() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let ctx = context();
    let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
    let specs = vec![money_market(&ctx), swaps(&ctx)];

    let curve = calibrator
        .calibrate_curve("USD", &specs, EpochResponse::discount())
        .unwrap();

    assert_eq!(curve.name(), "USD");
    assert_eq!(curve.label(), &LatentStateLabel::Funding("USD".into()));
    assert_eq!(curve.span().len(), 2);
    for spec in &specs {
        assert_recovers(&ctx, &curve, spec, 1e-8);
    }
    for stretch in curve.span().stretches() {
        let report = stretch.repricing().unwrap();
        assert!(report.is_valid(), "{report}");
        assert!(report.max_error() < 1e-8);
    }

    assert_relative_eq!(curve.response(0.0).unwrap(), 1.0, epsilon = 1e-14);
    // discount factors fall through the whole curve
    let (_, right) = curve.ordinate_range();
    let mut previous = 1.0;
    for step in 1..=100 {
        let df = curve.response(right * f64::from(step) / 100.0).unwrap();
        assert!(df < previous);
        previous = df;
    }
}

#[test]
fn test_single_stretch_mixed_instruments() {
    let ctx = context();
    let mut pairs = deposit_pairs(&ctx, &[("3M", 0.03), ("6M", 0.031), ("1Y", 0.032)]);
    pairs.extend(swap_pairs(&ctx, &[("2Y", 0.033), ("3Y", 0.034)]));
    let spec = StretchSpec::from_pairs("USD", LatentStateSpec::funding("USD"), pairs).unwrap();
    let config = CalibrationConfig::default();

    let stretch = SegmentSequenceBuilder::new(&spec, &ctx, &config, EpochResponse::discount())
        .build()
        .unwrap();

    assert_eq!(stretch.segments().len(), 5);
    assert!(stretch
        .records()
        .iter()
        .all(|r| matches!(r.mode, SegmentMode::Linear)));
    assert_recovers(&ctx, &stretch, &spec, 1e-8);
}

#[test]
fn test_forward_stretch_from_fras() {
    let ctx = context();
    let today = ctx.valuation_date();
    let pairs = [(3, 0.0410), (6, 0.0405), (9, 0.0395), (12, 0.0390)]
        .into_iter()
        .map(|(months, rate)| {
            let start = today.add_months(months).unwrap();
            let fra = ForwardRateAgreement::new("USD-LIBOR-3M", start, start.add_months(3).unwrap());
            (
                Arc::new(fra) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::ForwardRate, rate),
            )
        })
        .collect();
    let spec = StretchSpec::from_pairs("LIBOR-3M", LatentStateSpec::forward("USD-LIBOR-3M"), pairs).unwrap();

    let stretch = calibrate_stretch(
        &spec,
        &ctx,
        EpochResponse::new(0.0, 0.0415),
        Continuity::C1,
        ShapeControl::default(),
    )
    .unwrap();

    assert_recovers(&ctx, &stretch, &spec, 1e-12);
    let label = LatentStateLabel::Forward("USD-LIBOR-3M".into());
    assert_eq!(stretch.merge_ranges().len(), 1);
    assert_eq!(stretch.label_at(stretch.right()), Some(&label));
    assert_eq!(stretch.label_at(0.5 * stretch.right()), Some(&label));
    assert_eq!(stretch.label_at(stretch.right() + 1.0), None);
}

#[test]
fn test_hazard_stretch_recovers_upfronts() {
    let ctx = context_with_funding(0.035);
    let pairs = [("1Y", 0.0010), ("3Y", 0.0060), ("5Y", 0.0150), ("7Y", 0.0250)]
        .into_iter()
        .map(|(tenor, upfront)| {
            let cds = CreditDefaultSwap::from_tenor("ACME", "USD", ctx.valuation_date(), tenor).unwrap();
            (
                Arc::new(cds) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::Upfront, upfront),
            )
        })
        .collect();
    let spec = StretchSpec::from_pairs("ACME", LatentStateSpec::credit("ACME"), pairs).unwrap();
    let config = CalibrationConfig::default().with_design(SegmentDesign::piecewise_flat());

    let stretch = SegmentSequenceBuilder::new(&spec, &ctx, &config, EpochResponse::new(0.0, 0.0))
        .build()
        .unwrap();

    assert_recovers(&ctx, &stretch, &spec, 1e-8);
    assert!(stretch
        .records()
        .iter()
        .all(|r| matches!(r.mode, SegmentMode::RootSolved { .. })));
    for segment in stretch.segments() {
        let hazard = segment.value(segment.right());
        assert!(hazard > 0.0 && hazard < 1.0, "hazard {hazard}");
        assert_relative_eq!(segment.derivative(segment.right(), 1), 0.0);
    }
    let survival = stretch.survival_probability(stretch.right()).unwrap();
    assert!(survival > 0.0 && survival < 1.0);
}

// =============================================================================
// CONTINUITY
// =============================================================================

#[test]
fn test_ck_continuity_at_every_knot() {
    let ctx = context();
    let mut pairs = deposit_pairs(&ctx, &[("3M", 0.02), ("6M", 0.022), ("1Y", 0.025)]);
    pairs.extend(swap_pairs(&ctx, &[("2Y", 0.027), ("5Y", 0.03), ("10Y", 0.032)]));
    let spec = StretchSpec::from_pairs("USD", LatentStateSpec::funding("USD"), pairs).unwrap();

    for (degree, continuity) in [(2, Continuity::C1), (4, Continuity::C2), (5, Continuity::C3)] {
        let config = CalibrationConfig::default()
            .with_design(SegmentDesign::smooth().with_degree(degree).with_continuity(continuity));
        let stretch = SegmentSequenceBuilder::new(&spec, &ctx, &config, EpochResponse::discount())
            .build()
            .unwrap();
        let k = continuity.order().unwrap();

        for pair in stretch.segments().windows(2) {
            let knot = pair[0].right();
            for order in 0..=k {
                let left = pair[0].derivative(knot, order);
                let right = pair[1].derivative(knot, order);
                assert!(
                    (left - right).abs() <= 1e-9 * left.abs().max(1.0),
                    "C{k} order {order} at {knot}: {left} vs {right}"
                );
            }
        }
        assert_recovers(&ctx, &stretch, &spec, 1e-8);
    }
}

#[test]
fn test_chained_stretches_join_smoothly() {
    let designs = [
        SegmentDesign::smooth(),
        SegmentDesign::smooth().with_continuity(Continuity::C2).with_degree(4),
        SegmentDesign::smooth().with_continuity(Continuity::C3).with_degree(5),
    ];
    for design in designs {
        let config = CalibrationConfig::default().with_design(design);
        let calibrator = CurveCalibrator::new(context(), config).unwrap();
        let specs = vec![money_market(calibrator.ctx()), swaps(calibrator.ctx())];
        let curve = calibrator
            .calibrate_curve("USD", &specs, EpochResponse::discount())
            .unwrap();

        let stretches = curve.span().stretches();
        let join = stretches[0].right();
        assert_relative_eq!(stretches[1].left(), join);
        for order in 0..=design.continuity.order().unwrap() {
            let left = stretches[0].response_derivative(join, order).unwrap();
            let right = stretches[1].response_derivative(join, order).unwrap();
            assert!(
                (left - right).abs() <= 1e-9 * left.abs().max(1.0),
                "{:?} order {order}: {left} vs {right}",
                design.continuity
            );
        }
        for spec in &specs {
            assert_recovers(calibrator.ctx(), &curve, spec, 1e-8);
        }
    }
}

// =============================================================================
// MERGING
// =============================================================================

fn chained_stretches(ctx: &ValuationContext) -> (Stretch, Stretch) {
    let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
    let short = calibrator
        .calibrate_stretch(&money_market(ctx), EpochResponse::discount(), None)
        .unwrap();
    let prior = Span::new().with_stretch(short.clone()).unwrap();
    let epoch = EpochResponse::continuing(&short, short.right(), 1).unwrap();
    let long = calibrator
        .calibrate_stretch(&swaps(ctx), epoch, Some(&prior))
        .unwrap();
    (short, long)
}

#[test]
fn test_merge_is_deterministic() {
    let ctx = context();
    let (short, long) = chained_stretches(&ctx);

    let first = merge_stretches(vec![short.clone(), long.clone()]).unwrap();
    let second = merge_stretches(vec![short.clone(), long.clone()]).unwrap();

    let (left, right) = first.ordinate_range();
    for step in 0..=400 {
        let t = left + (right - left) * f64::from(step) / 400.0;
        assert_eq!(first.query_index(t).unwrap(), second.query_index(t).unwrap());
        assert_eq!(
            first.response(t).unwrap().to_bits(),
            second.response(t).unwrap().to_bits()
        );
    }

    // the later stretch owns the shared boundary
    let join = short.right();
    assert_eq!(first.query(join).unwrap().name(), "USD-SWAP");
    assert_eq!(first.query(0.5 * join).unwrap().name(), "USD-MM");

    let pieces = first.pieces().unwrap();
    assert_eq!(pieces.len(), 2);
    assert_relative_eq!(pieces[0].right, pieces[1].left);
}

#[test]
fn test_merge_rejects_conflicts() {
    let ctx = context();
    let (short, long) = chained_stretches(&ctx);

    let err = merge_stretches(vec![long.clone(), short.clone()]).unwrap_err();
    assert!(matches!(err, CurveError::Merge { .. }));

    let err = merge_stretches(vec![short.clone(), short.clone()]).unwrap_err();
    assert!(matches!(err, CurveError::Merge { .. }));

    assert!(merge_stretches(Vec::new()).unwrap().is_empty());
}

// =============================================================================
// SENSITIVITIES
// =============================================================================

#[test]
fn test_sensitivities_match_finite_differences() {
    let ctx = context();
    let mut pairs = deposit_pairs(&ctx, &[("3M", 0.03), ("6M", 0.031), ("1Y", 0.032)]);
    pairs.extend(swap_pairs(&ctx, &[("2Y", 0.033), ("3Y", 0.034)]));
    let spec = StretchSpec::from_pairs("USD", LatentStateSpec::funding("USD"), pairs).unwrap();
    let calibrator = CurveCalibrator::new(ctx, CalibrationConfig::default()).unwrap();

    let mut curve = calibrator
        .calibrate_curve("USD", std::slice::from_ref(&spec), EpochResponse::discount())
        .unwrap();
    curve.annotate_sensitivities().unwrap();

    let h = 1e-6;
    for instrument in 0..spec.len() {
        let measure = spec.quotes()[instrument].calibration_measure();
        let key = QuoteKey::new(instrument, measure);
        let bumped = |bump: f64| {
            calibrator
                .calibrate_curve("USD", &[spec.with_bumped_quote(instrument, bump).unwrap()], EpochResponse::discount())
                .unwrap()
        };
        let (up, down) = (bumped(h), bumped(-h));

        for t in [0.05, 0.25, 0.6, 1.0, 1.4, 2.2, 2.9] {
            let fd = (up.response(t).unwrap() - down.response(t).unwrap()) / (2.0 * h);
            let analytic = curve.response_sensitivity(t, "USD", key).unwrap();
            assert!(
                (fd - analytic).abs() <= 1e-6 * fd.abs().max(1.0),
                "instrument {instrument} t {t}: fd {fd} analytic {analytic}"
            );
        }
    }

    assert!(matches!(
        curve.response_sensitivity(1.0, "EUR", QuoteKey::new(0, ManifestMeasure::Rate)),
        Err(CurveError::CurveNotFound { .. })
    ));
}

#[test]
fn test_chained_curve_sensitivities_match_finite_differences() {
    let ctx = context();
    let short = StretchSpec::from_pairs(
        "MM",
        LatentStateSpec::funding("USD"),
        deposit_pairs(&ctx, &[("3M", 0.0425), ("6M", 0.0415), ("1Y", 0.0400)]),
    )
    .unwrap();
    let long = StretchSpec::from_pairs(
        "SW",
        LatentStateSpec::funding("USD"),
        swap_pairs(&ctx, &[("2Y", 0.0380), ("5Y", 0.0365)]),
    )
    .unwrap();
    let specs = vec![short, long];
    let calibrator = CurveCalibrator::new(ctx, CalibrationConfig::default()).unwrap();
    let mut curve = calibrator
        .calibrate_curve("USD", &specs, EpochResponse::discount())
        .unwrap();
    curve.annotate_sensitivities().unwrap();
    assert_eq!(curve.sensitivities("SW").unwrap().quotes().count(), 5);

    let h = 1e-6;
    for (stretch, spec) in specs.iter().enumerate() {
        for instrument in 0..spec.len() {
            let key = QuoteKey::new(instrument, spec.quotes()[instrument].calibration_measure());
            let bumped = |bump: f64| {
                let mut bumped = specs.clone();
                bumped[stretch] = spec.with_bumped_quote(instrument, bump).unwrap();
                calibrator
                    .calibrate_curve("USD", &bumped, EpochResponse::discount())
                    .unwrap()
            };
            let (up, down) = (bumped(h), bumped(-h));

            for t in [0.1, 0.5, 0.9, 1.0, 1.5, 2.5, 3.0, 4.9] {
                let fd = (up.response(t).unwrap() - down.response(t).unwrap()) / (2.0 * h);
                let analytic = curve.response_sensitivity(t, spec.name(), key).unwrap();
                assert!(
                    (fd - analytic).abs() <= 1e-6 * fd.abs().max(1.0),
                    "{} instrument {instrument} t {t}: fd {fd} analytic {analytic}",
                    spec.name()
                );
            }
        }
    }

    // the 1Y deposit moves the swap stretch through the shared epoch
    let key = QuoteKey::new(2, ManifestMeasure::Rate);
    assert!(curve.response_sensitivity(3.0, "MM", key).unwrap().abs() > 1e-3);
    // later quotes never move earlier ordinates
    let key = QuoteKey::new(0, ManifestMeasure::SwapRate);
    assert_eq!(curve.response_sensitivity(0.5, "SW", key).unwrap(), 0.0);
}

// =============================================================================
// FAILURES
// =============================================================================

/// Instrument whose model value never reaches zero.
#[derive(Debug)]
struct Unreachable {
    maturity: Date,
}

impl CalibrationInstrument for Unreachable {
    fn maturity(&self) -> Date {
        self.maturity
    }

    fn generate_constraint(
        &self,
        _ctx: &ValuationContext,
        _trial: &dyn ResponseCurve,
        _state: &LatentStateSpec,
        _quotes: &ManifestQuotes,
    ) -> CurveResult<PredictorResponseWeightConstraint> {
        Err(CurveError::constraint(self.description(), "quadratic in the response"))
    }

    fn reprice(
        &self,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        _measure: ManifestMeasure,
    ) -> CurveResult<f64> {
        let r = curve.response(ctx.ordinate(self.maturity))?;
        Ok(r * r + 1.0)
    }

    fn description(&self) -> String {
        format!("unreachable {}", self.maturity)
    }
}

#[test]
fn test_unbracketed_node_fails_with_no_root_bracket() {
    let ctx = context();
    let mut pairs = deposit_pairs(&ctx, &[("6M", 0.03)]);
    pairs.push((
        Arc::new(Unreachable {
            maturity: add_tenor(ctx.valuation_date(), "1Y").unwrap(),
        }) as Arc<dyn CalibrationInstrument>,
        ManifestQuotes::new(ManifestMeasure::Price, 0.0),
    ));
    let spec = StretchSpec::from_pairs("USD", LatentStateSpec::funding("USD"), pairs).unwrap();
    let config = CalibrationConfig::default();

    let mut builder = SegmentSequenceBuilder::new(&spec, &ctx, &config, EpochResponse::discount());
    builder.start().unwrap();
    builder.calibrate_next().unwrap();
    let err = builder.calibrate_next().unwrap_err();

    match err {
        CurveError::NoRootBracket {
            stretch,
            instrument_index,
            maturity,
            f_lower,
            f_upper,
            ..
        } => {
            assert_eq!(stretch, "USD");
            assert_eq!(instrument_index, 1);
            assert_eq!(maturity, spec.instruments()[1].maturity());
            assert!(f_lower > 0.0 && f_upper > 0.0);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(builder.state(), BuildState::Failed);
}

#[test]
fn test_calibration_error_names_failing_quote() {
    let ctx = context();
    // the deposit starts left of the epoch with no prior span to read from
    let spec = StretchSpec::from_pairs(
        "USD",
        LatentStateSpec::funding("USD"),
        deposit_pairs(&ctx, &[("6M", 0.03), ("1Y", 0.031)]),
    )
    .unwrap();
    let config = CalibrationConfig::default();

    let err = SegmentSequenceBuilder::new(&spec, &ctx, &config, EpochResponse::new(0.25, 0.99))
        .build()
        .unwrap_err();

    match err {
        CurveError::Calibration {
            instrument_index,
            quote,
            ..
        } => {
            assert_eq!(instrument_index, 0);
            assert_eq!(quote, 0.03);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_config_from_toml_drives_calibration() {
    let config = CalibrationConfig::from_toml_str(
        r#"
        recovery_tolerance = 1e-9

        [design]
        degree = 4
        continuity = "c2"

        [design.shape]
        curvature_weight = 1.0
        slope_weight = 0.1
        "#,
    )
    .unwrap();
    let ctx = context();
    let calibrator = CurveCalibrator::new(ctx.clone(), config).unwrap();

    let stretch = calibrator
        .calibrate_stretch(&money_market(&ctx), EpochResponse::discount(), None)
        .unwrap();

    assert_eq!(stretch.design().degree, 4);
    assert_eq!(stretch.design().continuity, Continuity::C2);
    assert!(stretch.repricing().unwrap().max_error() < 1e-9);
}
