//! Bump-and-recalibrate scenario generation.
//!
//! Quotes are addressed by a global index running across every stretch of
//! a curve in order. Each scenario bumps one calibration quote and rebuilds
//! the whole curve from scratch. Scenarios are independent and run in
//! parallel on the rayon pool.

use std::collections::BTreeMap;

use latent_core::Date;
use rayon::prelude::*;

use crate::builder::EpochResponse;
use crate::calibrator::CurveCalibrator;
use crate::curve::Curve;
use crate::error::{CurveError, CurveResult};
use crate::stretch_spec::StretchSpec;

/// How a scenario set is keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioMode {
    /// One curve per global quote index; any failure fails the set.
    Array,
    /// Curves keyed by the bumped instrument's maturity; failures are
    /// collected per maturity.
    ByMaturity,
}

/// Scenario curves keyed by maturity.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMap {
    curves: BTreeMap<Date, Curve>,
    failures: BTreeMap<Date, CurveError>,
}

impl ScenarioMap {
    /// Curve of the scenario bumping the instrument maturing at `maturity`.
    pub fn get(&self, maturity: Date) -> Option<&Curve> {
        self.curves.get(&maturity)
    }

    /// Successful scenarios.
    pub fn curves(&self) -> &BTreeMap<Date, Curve> {
        &self.curves
    }

    /// Failed scenarios.
    pub fn failures(&self) -> &BTreeMap<Date, CurveError> {
        &self.failures
    }

    /// Number of successful scenarios.
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    /// True if no scenario succeeded.
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

/// Output of [`generate_scenarios`].
#[derive(Debug, Clone)]
pub enum ScenarioSet {
    /// Indexed by global quote index.
    Array(Vec<Curve>),
    /// Keyed by maturity.
    ByMaturity(ScenarioMap),
}

/// Rebuilds a curve with one quote bumped at a time.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioGenerator<'a> {
    calibrator: &'a CurveCalibrator,
    name: &'a str,
    specs: &'a [StretchSpec],
    epoch: EpochResponse,
}

impl<'a> ScenarioGenerator<'a> {
    /// Creates a generator for the curve `name` built from `specs`.
    pub fn new(
        calibrator: &'a CurveCalibrator,
        name: &'a str,
        specs: &'a [StretchSpec],
        epoch: EpochResponse,
    ) -> Self {
        Self {
            calibrator,
            name,
            specs,
            epoch,
        }
    }

    /// Total number of quotes across all stretches.
    pub fn instrument_count(&self) -> usize {
        self.specs.iter().map(StretchSpec::len).sum()
    }

    /// `(stretch, instrument)` position of a global quote index.
    pub fn locate(&self, index: usize) -> CurveResult<(usize, usize)> {
        let mut offset = index;
        for (stretch, spec) in self.specs.iter().enumerate() {
            if offset < spec.len() {
                return Ok((stretch, offset));
            }
            offset -= spec.len();
        }
        Err(CurveError::invalid_spec(format!(
            "quote index {index} out of range for {} quotes",
            self.instrument_count()
        )))
    }

    /// Maturity of the instrument behind a global quote index.
    pub fn maturity(&self, index: usize) -> CurveResult<Date> {
        let (stretch, instrument) = self.locate(index)?;
        Ok(self.specs[stretch].instruments()[instrument].maturity())
    }

    /// Rebuilds the curve with quote `index` shifted by `bump`.
    pub fn bump_and_recalibrate(&self, index: usize, bump: f64) -> CurveResult<Curve> {
        let (stretch, instrument) = self.locate(index)?;
        let mut specs = self.specs.to_vec();
        specs[stretch] = specs[stretch].with_bumped_quote(instrument, bump)?;
        tracing::debug!(curve = self.name, index, bump, "recalibrating bumped curve");
        self.calibrator.calibrate_curve(self.name, &specs, self.epoch)
    }

    /// One curve per quote, in global index order.
    pub fn generate_array(&self, bump: f64) -> CurveResult<Vec<Curve>> {
        (0..self.instrument_count())
            .into_par_iter()
            .map(|index| self.bump_and_recalibrate(index, bump))
            .collect()
    }

    /// Curves keyed by maturity. A later quote with the same maturity
    /// replaces an earlier one.
    pub fn generate_by_maturity(&self, bump: f64) -> CurveResult<ScenarioMap> {
        let results: Vec<(Date, CurveResult<Curve>)> = (0..self.instrument_count())
            .into_par_iter()
            .map(|index| {
                let maturity = self.maturity(index)?;
                Ok((maturity, self.bump_and_recalibrate(index, bump)))
            })
            .collect::<CurveResult<_>>()?;

        let mut map = ScenarioMap::default();
        for (maturity, result) in results {
            match result {
                Ok(curve) => {
                    map.failures.remove(&maturity);
                    map.curves.insert(maturity, curve);
                }
                Err(err) => {
                    tracing::warn!(curve = self.name, %maturity, error = %err, "scenario failed");
                    map.curves.remove(&maturity);
                    map.failures.insert(maturity, err);
                }
            }
        }
        Ok(map)
    }

    /// Generates scenarios in the requested mode.
    pub fn generate(&self, bump: f64, mode: ScenarioMode) -> CurveResult<ScenarioSet> {
        match mode {
            ScenarioMode::Array => self.generate_array(bump).map(ScenarioSet::Array),
            ScenarioMode::ByMaturity => self.generate_by_maturity(bump).map(ScenarioSet::ByMaturity),
        }
    }
}

/// Generates one bumped curve per quote of `specs`.
pub fn generate_scenarios(
    calibrator: &CurveCalibrator,
    name: &str,
    specs: &[StretchSpec],
    epoch: EpochResponse,
    bump: f64,
    mode: ScenarioMode,
) -> CurveResult<ScenarioSet> {
    ScenarioGenerator::new(calibrator, name, specs, epoch).generate(bump, mode)
}
