//! Manifest measures: the quoted quantities an instrument exposes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

/// A quoted or priced quantity of a calibration instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManifestMeasure {
    /// Simple money-market rate.
    Rate,
    /// Forward rate for an accrual period.
    ForwardRate,
    /// Par swap rate.
    SwapRate,
    /// Swap rate used for calibration (par rate of the fixed leg).
    CalibSwapRate,
    /// Running spread that makes a CDS worth zero.
    ParSpread,
    /// Upfront payment against a standard running coupon.
    Upfront,
    /// Clean price.
    Price,
}

impl ManifestMeasure {
    /// All measures in declaration order.
    pub const ALL: [ManifestMeasure; 7] = [
        Self::Rate,
        Self::ForwardRate,
        Self::SwapRate,
        Self::CalibSwapRate,
        Self::ParSpread,
        Self::Upfront,
        Self::Price,
    ];

    /// Canonical quote name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rate => "Rate",
            Self::ForwardRate => "ForwardRate",
            Self::SwapRate => "SwapRate",
            Self::CalibSwapRate => "CalibSwapRate",
            Self::ParSpread => "ParSpread",
            Self::Upfront => "Upfront",
            Self::Price => "Price",
        }
    }
}

impl fmt::Display for ManifestMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ManifestMeasure {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| CurveError::invalid_spec(format!("unknown manifest measure '{s}'")))
    }
}

/// Quotes attached to one instrument.
///
/// Always holds at least one entry. The first entry is the calibration
/// measure: the quote the curve is solved to reproduce.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestQuotes {
    entries: Vec<(ManifestMeasure, f64)>,
}

impl ManifestQuotes {
    /// Creates quotes with a single calibration measure.
    #[must_use]
    pub fn new(measure: ManifestMeasure, value: f64) -> Self {
        Self {
            entries: vec![(measure, value)],
        }
    }

    /// Adds or replaces a secondary quote.
    #[must_use]
    pub fn with(mut self, measure: ManifestMeasure, value: f64) -> Self {
        match self.entries.iter_mut().find(|(m, _)| *m == measure) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((measure, value)),
        }
        self
    }

    /// Quote for `measure`, if present.
    pub fn get(&self, measure: ManifestMeasure) -> Option<f64> {
        self.entries
            .iter()
            .find_map(|(m, v)| (*m == measure).then_some(*v))
    }

    /// Quote for `measure`, or a pricing error naming the missing measure.
    pub fn require(&self, measure: ManifestMeasure) -> CurveResult<f64> {
        self.get(measure)
            .ok_or_else(|| CurveError::pricing(format!("no {measure} quote supplied")))
    }

    /// The measure the curve is calibrated to.
    pub fn calibration_measure(&self) -> ManifestMeasure {
        self.entries[0].0
    }

    /// The quote the curve is calibrated to.
    pub fn calibration_quote(&self) -> f64 {
        self.entries[0].1
    }

    /// Copy with the calibration quote shifted by `bump`.
    #[must_use]
    pub fn bumped(&self, bump: f64) -> Self {
        let mut entries = self.entries.clone();
        entries[0].1 += bump;
        Self { entries }
    }

    /// Iterates over `(measure, quote)` pairs, calibration measure first.
    pub fn iter(&self) -> impl Iterator<Item = (ManifestMeasure, f64)> + '_ {
        self.entries.iter().copied()
    }
}
