//! Quote sensitivities of calibrated stretches.
//!
//! Every linearly calibrated segment solves `A c = b(q)`, where the
//! continuity targets depend on the previous segment and the instrument row
//! depends on the quotes through the constraint's sensitivity maps.
//! Differentiating the same systems with respect to each quote and replaying
//! them left to right yields `∂c/∂q` for every segment, without any bumping.
//!
//! A stretch calibrated on top of earlier stretches inherits their quotes:
//! ordinates resolved through the prior span, and an epoch continued from
//! it, take the prior tables' sensitivities in the replay. A caller-supplied
//! epoch is held fixed.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CurveError, CurveResult};
use crate::measure::ManifestMeasure;
use crate::response::ResponseCurve;
use crate::segment::{locate_index, Anchor, RowSource, Segment, SegmentMode, SegmentRecord};
use crate::span::owner_index;
use crate::stretch::Stretch;

/// Identifies one quote of a stretch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuoteKey {
    /// Instrument index within the stretch.
    pub instrument: usize,
    /// Quoted measure.
    pub measure: ManifestMeasure,
}

impl QuoteKey {
    /// Creates a key.
    #[must_use]
    pub fn new(instrument: usize, measure: ManifestMeasure) -> Self {
        Self { instrument, measure }
    }
}

type PerSegment = Vec<Vec<f64>>;

/// Coefficient sensitivities of every segment to every quote the stretch
/// depends on, its own and those of the stretches it was built on.
#[derive(Debug, Clone)]
pub struct SensitivityTable {
    stretch: String,
    segments: Vec<Segment>,
    coefficients: BTreeMap<String, BTreeMap<QuoteKey, PerSegment>>,
}

impl SensitivityTable {
    /// Stretch the table belongs to.
    pub fn stretch(&self) -> &str {
        &self.stretch
    }

    /// Quotes of this stretch with a sensitivity.
    pub fn keys(&self) -> impl Iterator<Item = QuoteKey> + '_ {
        self.coefficients
            .get(&self.stretch)
            .into_iter()
            .flat_map(|per_key| per_key.keys().copied())
    }

    /// Every quote with a sensitivity, with the stretch quoting it.
    pub fn quotes(&self) -> impl Iterator<Item = (&str, QuoteKey)> + '_ {
        self.coefficients
            .iter()
            .flat_map(|(stretch, per_key)| per_key.keys().map(move |key| (stretch.as_str(), *key)))
    }

    /// `∂c/∂q` of one segment for a quote of this stretch.
    pub fn segment_sensitivity(&self, segment: usize, key: QuoteKey) -> Option<&[f64]> {
        self.per_segment(&self.stretch, key)
            .and_then(|per_segment| per_segment.get(segment))
            .map(Vec::as_slice)
    }

    /// `∂R^(order)(t)/∂q` for a quote of this stretch. Quotes outside the
    /// table have zero sensitivity.
    pub fn response_derivative_sensitivity(&self, t: f64, order: usize, key: QuoteKey) -> CurveResult<f64> {
        self.quote_derivative_sensitivity(t, order, &self.stretch, key)
    }

    /// `∂R(t)/∂q` for a quote of this stretch.
    pub fn response_sensitivity(&self, t: f64, key: QuoteKey) -> CurveResult<f64> {
        self.response_derivative_sensitivity(t, 0, key)
    }

    /// `∂R^(order)(t)/∂q` for a quote of the named stretch.
    pub fn quote_derivative_sensitivity(
        &self,
        t: f64,
        order: usize,
        stretch: &str,
        key: QuoteKey,
    ) -> CurveResult<f64> {
        let index = self.segment_index(t)?;
        Ok(self.per_segment(stretch, key).map_or(0.0, |per_segment| {
            self.segments[index].evaluate_with(&per_segment[index], t, order)
        }))
    }

    /// `∂R(t)/∂q` for a quote of the named stretch.
    pub fn quote_sensitivity(&self, t: f64, stretch: &str, key: QuoteKey) -> CurveResult<f64> {
        self.quote_derivative_sensitivity(t, 0, stretch, key)
    }

    /// `∂R(t)/∂q` for every quote, keyed by quoting stretch.
    pub fn jacobian(&self, t: f64) -> CurveResult<BTreeMap<(String, QuoteKey), f64>> {
        let index = self.segment_index(t)?;
        let segment = &self.segments[index];
        Ok(self
            .coefficients
            .iter()
            .flat_map(|(stretch, per_key)| {
                per_key.iter().map(move |(key, per_segment)| {
                    ((stretch.clone(), *key), segment.evaluate_with(&per_segment[index], t, 0))
                })
            })
            .collect())
    }

    fn per_segment(&self, stretch: &str, key: QuoteKey) -> Option<&PerSegment> {
        self.coefficients.get(stretch).and_then(|per_key| per_key.get(&key))
    }

    fn segment_index(&self, t: f64) -> CurveResult<usize> {
        locate_index(&self.segments, t).ok_or_else(|| {
            let left = self.segments.first().map_or(0.0, Segment::left);
            let right = self.segments.last().map_or(0.0, Segment::right);
            CurveError::ordinate_out_of_range(t, left, right)
        })
    }
}

/// Replays a stretch's segment systems to differentiate them by quote.
#[derive(Debug, Clone, Copy)]
pub struct SensitivityPropagator<'a> {
    stretch: &'a Stretch,
    prior: &'a [Stretch],
    prior_tables: &'a [SensitivityTable],
}

impl<'a> SensitivityPropagator<'a> {
    /// Creates a propagator for a calibrated stretch with no prior span.
    pub fn new(stretch: &'a Stretch) -> Self {
        Self {
            stretch,
            prior: &[],
            prior_tables: &[],
        }
    }

    /// Stretches the stretch was calibrated on, in span order, with their
    /// sensitivity tables.
    pub fn with_prior(mut self, prior: &'a [Stretch], tables: &'a [SensitivityTable]) -> CurveResult<Self> {
        if prior.len() != tables.len() {
            return Err(CurveError::invalid_spec(format!(
                "{} prior stretches but {} sensitivity tables",
                prior.len(),
                tables.len()
            )));
        }
        self.prior = prior;
        self.prior_tables = tables;
        Ok(self)
    }

    /// Computes the sensitivity table.
    ///
    /// Fails for stretches with root-solved segments, whose node has no
    /// linear dependence on the quote.
    pub fn propagate(&self) -> CurveResult<SensitivityTable> {
        let records = self.stretch.records();
        if let Some((index, _)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| matches!(r.mode, SegmentMode::RootSolved { .. }))
        {
            return Err(CurveError::invalid_spec(format!(
                "segment {index} of '{}' is root-solved and has no linear quote sensitivity",
                self.stretch.name()
            )));
        }

        let own = records.iter().filter_map(|record| {
            record.constraint.as_ref().map(|constraint| {
                constraint
                    .sensitivity_measures()
                    .map(|measure| (self.stretch.name(), QuoteKey::new(record.instrument_index, measure)))
                    .collect::<Vec<_>>()
            })
        });
        let quotes: BTreeSet<(&str, QuoteKey)> = own
            .flatten()
            .chain(self.prior_tables.iter().flat_map(|table| table.quotes()))
            .collect();

        let mut coefficients: BTreeMap<String, BTreeMap<QuoteKey, PerSegment>> = BTreeMap::new();
        for (stretch, key) in quotes {
            let per_segment = self.propagate_key(stretch, key)?;
            coefficients
                .entry(stretch.to_string())
                .or_default()
                .insert(key, per_segment);
        }
        tracing::debug!(
            stretch = self.stretch.name(),
            quotes = coefficients.values().map(BTreeMap::len).sum::<usize>(),
            prior = self.prior.len(),
            "sensitivities propagated"
        );

        Ok(SensitivityTable {
            stretch: self.stretch.name().to_string(),
            segments: self.stretch.segments().to_vec(),
            coefficients,
        })
    }

    fn propagate_key(&self, stretch: &str, key: QuoteKey) -> CurveResult<PerSegment> {
        let segments = self.stretch.segments();
        let epoch = self.stretch.epoch();
        let mut result: PerSegment = Vec::with_capacity(segments.len());

        for (index, record) in self.stretch.records().iter().enumerate() {
            let rhs = record
                .system
                .sources()
                .iter()
                .map(|source| match source {
                    RowSource::Continuity {
                        order,
                        anchor: Anchor::Epoch(_),
                    } => {
                        if epoch.inherited {
                            self.prior_sensitivity(epoch.ordinate, *order, stretch, key)
                        } else {
                            Ok(0.0)
                        }
                    }
                    RowSource::Continuity {
                        order,
                        anchor: Anchor::PreviousSegment,
                    } => {
                        let previous = &segments[index - 1];
                        Ok(previous.evaluate_with(&result[index - 1], previous.right(), *order))
                    }
                    RowSource::Constraint => {
                        self.constraint_rhs(record, stretch, key, &segments[..index], &result)
                    }
                    RowSource::Node => Err(CurveError::invalid_spec("root-solved row in a linear replay")),
                })
                .collect::<CurveResult<Vec<f64>>>()?;
            result.push(record.system.solve(&rhs)?);
        }
        Ok(result)
    }

    /// `∂value - Σ ∂w·R - Σ_known w·∂R` for the instrument row.
    fn constraint_rhs(
        &self,
        record: &SegmentRecord,
        stretch: &str,
        key: QuoteKey,
        built: &[Segment],
        built_sensitivity: &[Vec<f64>],
    ) -> CurveResult<f64> {
        let mut rhs = 0.0;

        if stretch == self.stretch.name() && key.instrument == record.instrument_index {
            if let Some(map) = record
                .constraint
                .as_ref()
                .and_then(|constraint| constraint.sensitivity(key.measure))
            {
                rhs += map.value();
                for (t, d_weight) in map.weights() {
                    let response = match record.predictors.iter().find(|p| p.ordinate == t) {
                        Some(predictor) => predictor.response,
                        None => self.stretch.response(t)?,
                    };
                    rhs -= d_weight * response;
                }
            }
        }

        let epoch = self.stretch.epoch();
        for predictor in record.predictors.iter().filter(|p| p.known) {
            let t = predictor.ordinate;
            let sensitivity = match locate_index(built, t) {
                Some(j) => built[j].evaluate_with(&built_sensitivity[j], t, 0),
                None if t < epoch.ordinate || epoch.inherited => self.prior_sensitivity(t, 0, stretch, key)?,
                // a caller-supplied epoch value
                None => 0.0,
            };
            rhs -= predictor.weight * sensitivity;
        }
        Ok(rhs)
    }

    /// Sensitivity of the prior span at `t`, zero where it does not reach.
    fn prior_sensitivity(&self, t: f64, order: usize, stretch: &str, key: QuoteKey) -> CurveResult<f64> {
        match owner_index(self.prior, t) {
            Some(index) => self.prior_tables[index].quote_derivative_sensitivity(t, order, stretch, key),
            None => Ok(0.0),
        }
    }
}

/// Computes the quote sensitivity table of a stretch calibrated without a
/// prior span.
pub fn propagate_sensitivities(stretch: &Stretch) -> CurveResult<SensitivityTable> {
    SensitivityPropagator::new(stretch).propagate()
}
