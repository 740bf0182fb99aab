//! Immutable description of one calibration group.

use std::sync::Arc;

use crate::error::{CurveError, CurveResult};
use crate::instruments::CalibrationInstrument;
use crate::latent_state::LatentStateSpec;
use crate::measure::ManifestQuotes;

/// A named group of instruments calibrated together into one stretch.
///
/// Invariant: one quote set per instrument and at least one instrument.
#[derive(Debug, Clone)]
pub struct StretchSpec {
    name: String,
    state: LatentStateSpec,
    instruments: Vec<Arc<dyn CalibrationInstrument>>,
    quotes: Vec<ManifestQuotes>,
}

impl StretchSpec {
    /// Creates a spec.
    ///
    /// # Errors
    ///
    /// `InvalidSpec` when the instrument and quote lists differ in length or
    /// are empty.
    pub fn new(
        name: impl Into<String>,
        state: LatentStateSpec,
        instruments: Vec<Arc<dyn CalibrationInstrument>>,
        quotes: Vec<ManifestQuotes>,
    ) -> CurveResult<Self> {
        let name = name.into();
        if instruments.len() != quotes.len() {
            return Err(CurveError::invalid_spec(format!(
                "stretch '{name}' has {} instruments but {} quote sets",
                instruments.len(),
                quotes.len()
            )));
        }
        if instruments.is_empty() {
            return Err(CurveError::invalid_spec(format!(
                "stretch '{name}' has no instruments"
            )));
        }
        Ok(Self {
            name,
            state,
            instruments,
            quotes,
        })
    }

    /// Creates a spec from `(instrument, quotes)` pairs.
    pub fn from_pairs(
        name: impl Into<String>,
        state: LatentStateSpec,
        pairs: Vec<(Arc<dyn CalibrationInstrument>, ManifestQuotes)>,
    ) -> CurveResult<Self> {
        let (instruments, quotes) = pairs.into_iter().unzip();
        Self::new(name, state, instruments, quotes)
    }

    /// Stretch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latent state this stretch calibrates.
    pub fn state(&self) -> &LatentStateSpec {
        &self.state
    }

    /// Instruments in calibration order.
    pub fn instruments(&self) -> &[Arc<dyn CalibrationInstrument>] {
        &self.instruments
    }

    /// Quote sets aligned with [`instruments`](Self::instruments).
    pub fn quotes(&self) -> &[ManifestQuotes] {
        &self.quotes
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Never true for a constructed spec.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Copy with instrument `index`'s calibration quote shifted by `bump`.
    pub fn with_bumped_quote(&self, index: usize, bump: f64) -> CurveResult<Self> {
        let mut bumped = self.clone();
        let quotes = bumped.quotes.get_mut(index).ok_or_else(|| {
            CurveError::invalid_spec(format!(
                "stretch '{}' has no instrument {index}",
                self.name
            ))
        })?;
        *quotes = quotes.bumped(bump);
        Ok(bumped)
    }
}
