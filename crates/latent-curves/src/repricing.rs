//! Recovery checks for calibrated stretches.
//!
//! A stretch that cannot reproduce the quotes it was built from is wrong.
//! After building, every instrument is repriced off the finished stretch in
//! its calibration measure and compared with its quote.

use std::fmt;

use latent_core::Date;

use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::measure::ManifestMeasure;
use crate::response::ResponseCurve;
use crate::stretch_spec::StretchSpec;

/// Result of repricing one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct RepricingCheck {
    /// Position of the instrument in its stretch.
    pub instrument_index: usize,
    /// Instrument description.
    pub description: String,
    /// Instrument maturity.
    pub maturity: Date,
    /// Measure the instrument is calibrated to.
    pub measure: ManifestMeasure,
    /// Market quote.
    pub quote: f64,
    /// Quote implied by the stretch.
    pub model: f64,
    /// `|model - quote|`.
    pub error: f64,
    /// Largest accepted error.
    pub tolerance: f64,
    /// Whether the error is within tolerance.
    pub passed: bool,
}

impl RepricingCheck {
    /// Creates a check, computing error and pass flag.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        instrument_index: usize,
        description: String,
        maturity: Date,
        measure: ManifestMeasure,
        quote: f64,
        model: f64,
        tolerance: f64,
    ) -> Self {
        let error = (model - quote).abs();
        Self {
            instrument_index,
            description,
            maturity,
            measure,
            quote,
            model,
            error,
            tolerance,
            // NaN errors fail
            passed: error <= tolerance,
        }
    }
}

impl fmt::Display for RepricingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "ok  " } else { "FAIL" };
        write!(
            f,
            "{status} [{}] {} | {} quote {:.8} model {:.8} | error {:.2e} (tol {:.2e})",
            self.instrument_index,
            self.description,
            self.measure,
            self.quote,
            self.model,
            self.error,
            self.tolerance
        )
    }
}

/// Recovery report of one stretch.
#[derive(Debug, Clone, PartialEq)]
pub struct RepricingReport {
    stretch: String,
    checks: Vec<RepricingCheck>,
}

impl RepricingReport {
    /// Creates a report from individual checks.
    #[must_use]
    pub fn new(stretch: impl Into<String>, checks: Vec<RepricingCheck>) -> Self {
        Self {
            stretch: stretch.into(),
            checks,
        }
    }

    /// Reprices every instrument of `spec` off `curve`.
    ///
    /// A pricing failure is reported as a calibration error naming the
    /// instrument.
    pub fn reprice(
        spec: &StretchSpec,
        ctx: &ValuationContext,
        curve: &dyn ResponseCurve,
        tolerance: f64,
    ) -> CurveResult<Self> {
        let checks = spec
            .instruments()
            .iter()
            .zip(spec.quotes())
            .enumerate()
            .map(|(index, (instrument, quotes))| {
                let measure = quotes.calibration_measure();
                let quote = quotes.calibration_quote();
                let model = instrument.reprice(ctx, curve, measure).map_err(|e| {
                    CurveError::calibration_failed(
                        spec.name(),
                        index,
                        instrument.maturity(),
                        quote,
                        format!("repricing failed: {e}"),
                    )
                })?;
                Ok(RepricingCheck::new(
                    index,
                    instrument.description(),
                    instrument.maturity(),
                    measure,
                    quote,
                    model,
                    tolerance,
                ))
            })
            .collect::<CurveResult<Vec<_>>>()?;
        Ok(Self::new(spec.name(), checks))
    }

    /// Stretch name.
    pub fn stretch(&self) -> &str {
        &self.stretch
    }

    /// Individual checks.
    pub fn checks(&self) -> &[RepricingCheck] {
        &self.checks
    }

    /// True if every instrument passed.
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Largest absolute error.
    pub fn max_error(&self) -> f64 {
        self.checks.iter().map(|c| c.error).fold(0.0, f64::max)
    }

    /// Root mean square error.
    pub fn rms_error(&self) -> f64 {
        if self.checks.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.checks.iter().map(|c| c.error * c.error).sum();
        (sum_sq / self.checks.len() as f64).sqrt()
    }

    /// Checks that failed.
    pub fn failed_checks(&self) -> impl Iterator<Item = &RepricingCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Converts the first failed check into a calibration error.
    pub fn into_result(self) -> CurveResult<Self> {
        let failure = self.failed_checks().next().map(|check| {
            CurveError::calibration_failed(
                self.stretch.clone(),
                check.instrument_index,
                check.maturity,
                check.quote,
                format!(
                    "quote not recovered: model {} differs by {:.2e} (tolerance {:.2e})",
                    check.model, check.error, check.tolerance
                ),
            )
        });
        match failure {
            None => Ok(self),
            Some(err) => Err(err),
        }
    }
}

impl fmt::Display for RepricingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        writeln!(f, "Repricing Report: {}", self.stretch)?;
        writeln!(f, "Status: {}", if self.is_valid() { "PASSED" } else { "FAILED" })?;
        writeln!(f, "Instruments: {passed}/{} passed", self.checks.len())?;
        writeln!(f, "Max Error: {:.2e}", self.max_error())?;
        writeln!(f, "RMS Error: {:.2e}", self.rms_error())?;
        for check in &self.checks {
            writeln!(f, "  {check}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(index: usize, quote: f64, model: f64) -> RepricingCheck {
        RepricingCheck::new(
            index,
            format!("Deposit {index}"),
            Date::from_ymd(2025, 4, 2).unwrap(),
            ManifestMeasure::Rate,
            quote,
            model,
            1e-8,
        )
    }

    #[test]
    fn test_report_statistics() {
        let report = RepricingReport::new(
            "USD",
            vec![check(0, 0.01, 0.01 + 1e-10), check(1, 0.02, 0.02 + 3e-9)],
        );
        assert!(report.is_valid());
        assert!((report.max_error() - 3e-9).abs() < 1e-15);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_failure_names_instrument() {
        let report = RepricingReport::new("USD", vec![check(0, 0.01, 0.01), check(1, 0.02, 0.021)]);
        assert!(!report.is_valid());
        assert_eq!(report.failed_checks().count(), 1);

        let text = report.to_string();
        assert!(text.contains("FAILED"));
        assert!(text.contains("Deposit 1"));

        match report.into_result().unwrap_err() {
            CurveError::Calibration {
                instrument_index,
                quote,
                ..
            } => {
                assert_eq!(instrument_index, 1);
                assert_eq!(quote, 0.02);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_nan_model_fails() {
        assert!(!check(0, 0.01, f64::NAN).passed);
    }
}
