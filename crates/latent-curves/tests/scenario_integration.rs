//! Integration tests for bumped-quote scenario generation.

use std::sync::Arc;

use approx::assert_relative_eq;
use latent_curves::prelude::*;

fn context() -> ValuationContext {
    ValuationContext::new(
        Date::from_ymd(2025, 1, 2).unwrap(),
        Arc::new(IndexRegistry::standard()),
    )
}

fn deposits(ctx: &ValuationContext, name: &str, quotes: &[(&str, f64)]) -> StretchSpec {
    let pairs = quotes
        .iter()
        .map(|(tenor, rate)| {
            let deposit = Deposit::from_tenor("USD-SOFR", ctx.valuation_date(), tenor).unwrap();
            (
                Arc::new(deposit) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::Rate, *rate),
            )
        })
        .collect();
    StretchSpec::from_pairs(name, LatentStateSpec::funding("USD"), pairs).unwrap()
}

fn swaps(ctx: &ValuationContext, quotes: &[(&str, f64)]) -> StretchSpec {
    let pairs = quotes
        .iter()
        .map(|(tenor, rate)| {
            let swap = FixFloatSwap::from_tenor("USD-SOFR", ctx.valuation_date(), tenor).unwrap();
            (
                Arc::new(swap) as Arc<dyn CalibrationInstrument>,
                ManifestQuotes::new(ManifestMeasure::SwapRate, *rate),
            )
        })
        .collect();
    StretchSpec::from_pairs("USD-SWAP", LatentStateSpec::funding("USD"), pairs).unwrap()
}

#[test]
fn test_bump_leaves_earlier_discount_factors_unchanged() {
    let ctx = context();
    let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
    let specs = vec![deposits(&ctx, "USD", &[("3M", 0.01), ("6M", 0.012), ("1Y", 0.013)])];
    let generator = ScenarioGenerator::new(&calibrator, "USD", &specs, EpochResponse::discount());

    let base = calibrator
        .calibrate_curve("USD", &specs, EpochResponse::discount())
        .unwrap();
    let bumped = generator.bump_and_recalibrate(1, 0.0001).unwrap();

    let first_maturity = ctx.ordinate(generator.maturity(0).unwrap());
    for step in 0..=50 {
        let t = first_maturity * f64::from(step) / 50.0;
        let (b, s) = (base.response(t).unwrap(), bumped.response(t).unwrap());
        assert!((b - s).abs() <= 1e-12, "t {t}: base {b} bumped {s}");
    }

    // the bumped quote itself moves and is recovered
    let second_maturity = ctx.ordinate(generator.maturity(1).unwrap());
    assert!(bumped.response(second_maturity).unwrap() < base.response(second_maturity).unwrap());
    let instrument = &specs[0].instruments()[1];
    let model = instrument.reprice(&ctx, &bumped, ManifestMeasure::Rate).unwrap();
    assert_relative_eq!(model, 0.0121, epsilon = 1e-10);
}

#[test]
fn test_array_mode_covers_every_quote() {
    let ctx = context();
    let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
    let specs = vec![
        deposits(&ctx, "USD-MM", &[("3M", 0.03), ("6M", 0.031), ("1Y", 0.032)]),
        swaps(&ctx, &[("2Y", 0.033), ("5Y", 0.035)]),
    ];
    let generator = ScenarioGenerator::new(&calibrator, "USD", &specs, EpochResponse::discount());
    assert_eq!(generator.instrument_count(), 5);
    assert_eq!(generator.locate(3).unwrap(), (1, 0));
    assert!(generator.locate(5).is_err());

    let curves = generator.generate_array(0.0001).unwrap();
    assert_eq!(curves.len(), 5);

    for (index, curve) in curves.iter().enumerate() {
        let (stretch, position) = generator.locate(index).unwrap();
        let instrument = &specs[stretch].instruments()[position];
        let quotes = &specs[stretch].quotes()[position];
        let model = instrument
            .reprice(&ctx, curve, quotes.calibration_measure())
            .unwrap();
        assert_relative_eq!(model, quotes.calibration_quote() + 0.0001, epsilon = 1e-8);
        assert_eq!(curve.span().len(), 2);
    }
}

#[test]
fn test_maturity_mode_keys_by_date() {
    let ctx = context();
    let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
    let specs = vec![deposits(&ctx, "USD", &[("3M", 0.01), ("6M", 0.012), ("1Y", 0.013)])];

    let set = generate_scenarios(
        &calibrator,
        "USD",
        &specs,
        EpochResponse::discount(),
        -0.0001,
        ScenarioMode::ByMaturity,
    )
    .unwrap();

    let ScenarioSet::ByMaturity(map) = set else {
        panic!("expected maturity-keyed scenarios");
    };
    assert_eq!(map.len(), 3);
    assert!(map.failures().is_empty());
    for instrument in specs[0].instruments() {
        let curve = map.get(instrument.maturity()).unwrap();
        let t = ctx.ordinate(instrument.maturity());
        let base = calibrator
            .calibrate_curve("USD", &specs, EpochResponse::discount())
            .unwrap();
        // a lower rate raises the discount factor at its own maturity
        assert!(curve.response(t).unwrap() > base.response(t).unwrap());
    }
}

#[test]
fn test_failed_scenarios_reported_per_maturity() {
    let ctx = context();
    let calibrator = CurveCalibrator::new(ctx.clone(), CalibrationConfig::default()).unwrap();
    let specs = vec![deposits(&ctx, "USD", &[("3M", 0.01), ("6M", 0.012)])];
    let generator = ScenarioGenerator::new(&calibrator, "USD", &specs, EpochResponse::discount());

    assert!(generator.generate_array(f64::NAN).is_err());

    let map = generator.generate_by_maturity(f64::NAN).unwrap();
    assert!(map.is_empty());
    assert_eq!(map.failures().len(), 2);
}
