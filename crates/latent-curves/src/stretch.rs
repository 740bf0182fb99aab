//! Calibrated stretches and partial views used during calibration.

use crate::builder::EpochResponse;
use crate::error::{CurveError, CurveResult};
use crate::latent_state::{LatentStateLabel, LatentStateSpec};
use crate::repricing::RepricingReport;
use crate::response::ResponseCurve;
use crate::segment::{integrate, locate_index, Segment, SegmentDesign, SegmentRecord};
use crate::span::Span;

/// Ordinate range attributed to one forward label.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRange {
    /// Left edge.
    pub left: f64,
    /// Right edge.
    pub right: f64,
    /// Label of the instruments calibrated over the range.
    pub label: LatentStateLabel,
}

/// A contiguous run of calibrated segments, one per instrument.
///
/// Segment `j` owns `(left_j, right_j]`; the first segment also owns the
/// stretch's left edge.
#[derive(Debug, Clone)]
pub struct Stretch {
    name: String,
    state: LatentStateSpec,
    design: SegmentDesign,
    segments: Vec<Segment>,
    records: Vec<SegmentRecord>,
    merge_ranges: Vec<MergeRange>,
    epoch: EpochResponse,
    report: Option<RepricingReport>,
}

impl Stretch {
    pub(crate) fn new(
        name: String,
        state: LatentStateSpec,
        design: SegmentDesign,
        segments: Vec<Segment>,
        records: Vec<SegmentRecord>,
        merge_ranges: Vec<MergeRange>,
    ) -> CurveResult<Self> {
        if segments.is_empty() || segments.len() != records.len() {
            return Err(CurveError::invalid_spec(format!(
                "stretch '{name}' needs one record per segment"
            )));
        }
        let left = segments[0].left();
        let epoch = EpochResponse::new(left, segments[0].value(left));
        Ok(Self {
            name,
            state,
            design,
            segments,
            records,
            merge_ranges,
            epoch,
            report: None,
        })
    }

    pub(crate) fn with_epoch(mut self, epoch: EpochResponse) -> Self {
        self.epoch = epoch;
        self
    }

    pub(crate) fn with_report(mut self, report: RepricingReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Stretch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latent state the stretch quantifies.
    pub fn state(&self) -> &LatentStateSpec {
        &self.state
    }

    /// Segment design used to build the stretch.
    pub fn design(&self) -> &SegmentDesign {
        &self.design
    }

    /// Calibrated segments, left to right.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Calibration records, aligned with [`segments`](Self::segments).
    pub fn records(&self) -> &[SegmentRecord] {
        &self.records
    }

    /// Forward-label ranges, coalesced and sorted.
    pub fn merge_ranges(&self) -> &[MergeRange] {
        &self.merge_ranges
    }

    /// Left-edge conditions the stretch was calibrated against.
    pub fn epoch(&self) -> &EpochResponse {
        &self.epoch
    }

    /// Recovery report, present when recovery was verified.
    pub fn repricing(&self) -> Option<&RepricingReport> {
        self.report.as_ref()
    }

    /// Left edge.
    pub fn left(&self) -> f64 {
        self.segments.first().map_or(0.0, Segment::left)
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.segments.last().map_or(0.0, Segment::right)
    }

    /// Segment boundaries, left edge first.
    pub fn knots(&self) -> Vec<f64> {
        std::iter::once(self.left())
            .chain(self.segments.iter().map(Segment::right))
            .collect()
    }

    /// Index of the segment owning `t`.
    pub fn segment_index(&self, t: f64) -> CurveResult<usize> {
        locate_index(&self.segments, t)
            .ok_or_else(|| CurveError::ordinate_out_of_range(t, self.left(), self.right()))
    }

    /// Segment owning `t`.
    pub fn segment_at(&self, t: f64) -> CurveResult<&Segment> {
        Ok(&self.segments[self.segment_index(t)?])
    }

    /// Forward label attributed to `t`, if any.
    pub fn label_at(&self, t: f64) -> Option<&LatentStateLabel> {
        self.merge_ranges
            .iter()
            .find(|range| t > range.left && t <= range.right)
            .or_else(|| self.merge_ranges.first().filter(|range| t == range.left))
            .map(|range| &range.label)
    }
}

impl ResponseCurve for Stretch {
    fn response(&self, t: f64) -> CurveResult<f64> {
        Ok(self.segment_at(t)?.value(t))
    }

    fn response_derivative(&self, t: f64, order: usize) -> CurveResult<f64> {
        Ok(self.segment_at(t)?.derivative(t, order))
    }

    fn response_integral(&self, from: f64, to: f64) -> CurveResult<f64> {
        if from > to {
            return Ok(-self.response_integral(to, from)?);
        }
        if from < self.left() || to > self.right() {
            let t = if from < self.left() { from } else { to };
            return Err(CurveError::ordinate_out_of_range(t, self.left(), self.right()));
        }
        Ok(integrate(&self.segments, from, to))
    }

    fn ordinate_range(&self) -> (f64, f64) {
        (self.left(), self.right())
    }
}

/// Read-only view of a stretch under construction.
///
/// Covers the prior span below the epoch, the epoch value itself, the
/// segments built so far and optionally a trial segment being solved for.
#[derive(Clone, Copy)]
pub(crate) struct StretchView<'a> {
    pub epoch: f64,
    pub epoch_value: f64,
    pub segments: &'a [Segment],
    pub trial: Option<&'a Segment>,
    pub prior: Option<&'a Span>,
}

impl<'a> StretchView<'a> {
    fn right(&self) -> f64 {
        self.trial
            .or_else(|| self.segments.last())
            .map_or(self.epoch, Segment::right)
    }

    fn segment_at(&self, t: f64) -> Option<&'a Segment> {
        locate_index(self.segments, t)
            .map(|index| &self.segments[index])
            .or_else(|| self.trial.filter(|segment| segment.contains(t)))
    }

    fn out_of_range(&self, t: f64) -> CurveError {
        let (min, max) = self.ordinate_range();
        CurveError::ordinate_out_of_range(t, min, max)
    }
}

impl ResponseCurve for StretchView<'_> {
    fn response(&self, t: f64) -> CurveResult<f64> {
        if let Some(segment) = self.segment_at(t) {
            return Ok(segment.value(t));
        }
        if t == self.epoch {
            return Ok(self.epoch_value);
        }
        match self.prior {
            Some(prior) if t < self.epoch => prior.response(t),
            _ => Err(self.out_of_range(t)),
        }
    }

    fn response_derivative(&self, t: f64, order: usize) -> CurveResult<f64> {
        if let Some(segment) = self.segment_at(t) {
            return Ok(segment.derivative(t, order));
        }
        match self.prior {
            Some(prior) if t <= self.epoch => prior.response_derivative(t, order),
            _ => Err(self.out_of_range(t)),
        }
    }

    fn response_integral(&self, from: f64, to: f64) -> CurveResult<f64> {
        if from > to {
            return Ok(-self.response_integral(to, from)?);
        }
        if to > self.right() {
            return Err(self.out_of_range(to));
        }
        let mut total = 0.0;
        if from < self.epoch {
            let prior = self.prior.ok_or_else(|| self.out_of_range(from))?;
            total += prior.response_integral(from, to.min(self.epoch))?;
        }
        if to > self.epoch {
            total += integrate(self.segments.iter().chain(self.trial), from, to);
        }
        Ok(total)
    }

    fn ordinate_range(&self) -> (f64, f64) {
        let min = self.prior.map_or(self.epoch, |prior| prior.ordinate_range().0);
        (min, self.right())
    }
}
