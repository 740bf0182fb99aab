//! Segment-by-segment stretch calibration.
//!
//! [`SegmentSequenceBuilder`] walks a [`StretchSpec`] left to right, fitting
//! one polynomial segment per instrument:
//!
//! ```text
//! Idle ──start──▶ CalibratingFirstSegment ──▶ CalibratingSubsequentSegment(1)
//!                                         ──▶ … ──▶ Done ──finish──▶ Stretch
//!      any failure ──▶ Failed
//! ```
//!
//! Each step consumes the [`StretchAccumulator`] of the previous one and
//! returns the next. A segment's system holds continuity rows against the
//! epoch (first segment) or the previous segment's right edge, plus one
//! instrument row. Instruments with a linear constraint contribute it
//! directly, with ordinates already calibrated substituted by their known
//! responses; the others get their node value root-solved so that the
//! instrument reprices to its quote.

use latent_math::MathError;

use crate::assembler::ConstraintAssembler;
use crate::config::CalibrationConfig;
use crate::constraint::PredictorResponseWeightConstraint;
use crate::context::ValuationContext;
use crate::error::{CurveError, CurveResult};
use crate::latent_state::LatentStateLabel;
use crate::repricing::RepricingReport;
use crate::response::ResponseCurve;
use crate::segment::{
    Anchor, Predictor, RowSource, Segment, SegmentMode, SegmentRecord, SegmentSystem,
};
use crate::span::Span;
use crate::stretch::{MergeRange, Stretch, StretchView};
use crate::stretch_spec::StretchSpec;

/// Where the builder is in its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Not started.
    Idle,
    /// Next step fits segment 0.
    CalibratingFirstSegment,
    /// Next step fits the given segment.
    CalibratingSubsequentSegment(usize),
    /// Every segment is fitted.
    Done,
    /// A step failed; the builder cannot be reused.
    Failed,
}

/// Highest derivative order an epoch can pin.
pub const MAX_EPOCH_ORDER: usize = 3;

/// Response at the left edge of a stretch.
///
/// The value is always matched; a derivative of order `k` is matched when
/// it is set and the design's continuity reaches `k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochResponse {
    /// Ordinate of the left edge.
    pub ordinate: f64,
    /// Response at the left edge.
    pub value: f64,
    /// Derivatives of orders `1..=MAX_EPOCH_ORDER` at the left edge.
    pub derivatives: [Option<f64>; MAX_EPOCH_ORDER],
    /// True when the edge continues a previously calibrated stretch, whose
    /// quotes then move the epoch too.
    pub inherited: bool,
}

impl EpochResponse {
    /// Value at an ordinate, derivatives left free.
    #[must_use]
    pub fn new(ordinate: f64, value: f64) -> Self {
        Self {
            ordinate,
            value,
            derivatives: [None; MAX_EPOCH_ORDER],
            inherited: false,
        }
    }

    /// Discount factor of one at the valuation date.
    #[must_use]
    pub fn discount() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Continues `curve` at `ordinate`, carrying derivatives up to `order`.
    pub fn continuing(curve: &dyn ResponseCurve, ordinate: f64, order: usize) -> CurveResult<Self> {
        let mut epoch = Self::new(ordinate, curve.response(ordinate)?);
        for k in 1..=order.min(MAX_EPOCH_ORDER) {
            epoch = epoch.with_derivative(k, curve.response_derivative(ordinate, k)?);
        }
        epoch.inherited = true;
        Ok(epoch)
    }

    /// Pins the slope at the left edge.
    #[must_use]
    pub fn with_slope(self, slope: f64) -> Self {
        self.with_derivative(1, slope)
    }

    /// Pins the derivative of `order` at the left edge. Orders outside
    /// `1..=MAX_EPOCH_ORDER` are ignored.
    #[must_use]
    pub fn with_derivative(mut self, order: usize, value: f64) -> Self {
        if let Some(slot) = order.checked_sub(1).and_then(|i| self.derivatives.get_mut(i)) {
            *slot = Some(value);
        }
        self
    }

    /// Pinned slope.
    pub fn slope(&self) -> Option<f64> {
        self.derivative(1)
    }

    /// Pinned derivative of `order`; order 0 is the value.
    pub fn derivative(&self, order: usize) -> Option<f64> {
        match order {
            0 => Some(self.value),
            k => self.derivatives.get(k - 1).copied().flatten(),
        }
    }
}

/// Segments fitted so far, threaded from one build step to the next.
#[derive(Debug, Clone)]
pub struct StretchAccumulator {
    edges: Vec<f64>,
    segments: Vec<Segment>,
    records: Vec<SegmentRecord>,
    merge_ranges: Vec<MergeRange>,
}

impl StretchAccumulator {
    fn new(edges: Vec<f64>) -> Self {
        Self {
            edges,
            segments: Vec::new(),
            records: Vec::new(),
            merge_ranges: Vec::new(),
        }
    }

    /// Segment edges: the epoch followed by each instrument's maturity.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Segments fitted so far.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments fitted.
    pub fn built(&self) -> usize {
        self.segments.len()
    }

    /// Right edge of the fitted region.
    pub fn boundary(&self) -> f64 {
        self.edges[self.segments.len()]
    }

    /// True once every instrument has a segment.
    pub fn is_complete(&self) -> bool {
        self.segments.len() + 1 == self.edges.len()
    }

    fn push(
        mut self,
        segment: Segment,
        record: SegmentRecord,
        label: Option<LatentStateLabel>,
    ) -> Self {
        if let Some(label) = label {
            let (left, right) = (segment.left(), segment.right());
            match self.merge_ranges.last_mut() {
                Some(range) if range.label == label && range.right == left => range.right = right,
                _ => self.merge_ranges.push(MergeRange { left, right, label }),
            }
        }
        self.segments.push(segment);
        self.records.push(record);
        self
    }
}

/// Calibrates one stretch, segment by segment.
pub struct SegmentSequenceBuilder<'a> {
    spec: &'a StretchSpec,
    ctx: &'a ValuationContext,
    config: &'a CalibrationConfig,
    epoch: EpochResponse,
    prior: Option<&'a Span>,
    state: BuildState,
    accumulator: Option<StretchAccumulator>,
}

impl<'a> SegmentSequenceBuilder<'a> {
    /// Creates an idle builder.
    pub fn new(
        spec: &'a StretchSpec,
        ctx: &'a ValuationContext,
        config: &'a CalibrationConfig,
        epoch: EpochResponse,
    ) -> Self {
        Self {
            spec,
            ctx,
            config,
            epoch,
            prior: None,
            state: BuildState::Idle,
            accumulator: None,
        }
    }

    /// Calibrated span answering ordinates left of the epoch.
    #[must_use]
    pub fn with_prior(mut self, prior: &'a Span) -> Self {
        self.prior = (!prior.is_empty()).then_some(prior);
        self
    }

    /// Current state.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Accumulator of the last completed step.
    pub fn accumulator(&self) -> Option<&StretchAccumulator> {
        self.accumulator.as_ref()
    }

    /// Validates the stretch spec and moves to [`BuildState::CalibratingFirstSegment`].
    pub fn start(&mut self) -> CurveResult<()> {
        if self.state != BuildState::Idle {
            return Err(CurveError::builder_state(format!(
                "cannot start stretch '{}' from {:?}",
                self.spec.name(),
                self.state
            )));
        }
        match self.edges() {
            Ok(edges) => {
                tracing::debug!(
                    stretch = self.spec.name(),
                    segments = edges.len() - 1,
                    "starting stretch calibration"
                );
                self.accumulator = Some(StretchAccumulator::new(edges));
                self.state = BuildState::CalibratingFirstSegment;
                Ok(())
            }
            Err(err) => {
                self.state = BuildState::Failed;
                Err(err)
            }
        }
    }

    /// Fits the next segment and returns the new state.
    pub fn calibrate_next(&mut self) -> CurveResult<BuildState> {
        let index = match self.state {
            BuildState::CalibratingFirstSegment => 0,
            BuildState::CalibratingSubsequentSegment(index) => index,
            other => {
                return Err(CurveError::builder_state(format!(
                    "cannot calibrate a segment of '{}' from {other:?}",
                    self.spec.name()
                )))
            }
        };
        let accumulator = self
            .accumulator
            .take()
            .ok_or_else(|| CurveError::builder_state("accumulator missing"))?;

        match self.step(accumulator, index) {
            Ok(accumulator) => {
                self.state = if accumulator.is_complete() {
                    BuildState::Done
                } else {
                    BuildState::CalibratingSubsequentSegment(index + 1)
                };
                self.accumulator = Some(accumulator);
                Ok(self.state)
            }
            Err(err) => {
                tracing::warn!(stretch = self.spec.name(), segment = index, error = %err, "segment calibration failed");
                self.state = BuildState::Failed;
                Err(err)
            }
        }
    }

    /// Assembles the stretch and, if configured, verifies quote recovery.
    pub fn finish(mut self) -> CurveResult<Stretch> {
        if self.state != BuildState::Done {
            return Err(CurveError::builder_state(format!(
                "cannot finish stretch '{}' from {:?}",
                self.spec.name(),
                self.state
            )));
        }
        let accumulator = self
            .accumulator
            .take()
            .ok_or_else(|| CurveError::builder_state("accumulator missing"))?;

        let mut stretch = Stretch::new(
            self.spec.name().to_string(),
            self.spec.state().clone(),
            self.config.design,
            accumulator.segments,
            accumulator.records,
            accumulator.merge_ranges,
        )?
        .with_epoch(self.epoch);

        if self.config.verify_recovery {
            let view = self.view(stretch.segments());
            let report =
                RepricingReport::reprice(self.spec, self.ctx, &view, self.config.recovery_tolerance)?
                    .into_result()?;
            tracing::debug!(stretch = self.spec.name(), max_error = report.max_error(), "quotes recovered");
            stretch = stretch.with_report(report);
        }

        tracing::info!(
            stretch = stretch.name(),
            segments = stretch.segments().len(),
            left = stretch.left(),
            right = stretch.right(),
            "stretch calibrated"
        );
        Ok(stretch)
    }

    /// Runs every step and finishes.
    pub fn build(mut self) -> CurveResult<Stretch> {
        self.start()?;
        while self.state != BuildState::Done {
            self.calibrate_next()?;
        }
        self.finish()
    }

    fn edges(&self) -> CurveResult<Vec<f64>> {
        self.config.design.validate()?;
        let mut pinned = (0..=MAX_EPOCH_ORDER).filter_map(|k| self.epoch.derivative(k));
        if !self.epoch.ordinate.is_finite() || !pinned.all(f64::is_finite) {
            return Err(CurveError::invalid_spec(format!(
                "epoch of stretch '{}' is not finite",
                self.spec.name()
            )));
        }

        let mut edges = Vec::with_capacity(self.spec.len() + 1);
        edges.push(self.epoch.ordinate);
        for (index, instrument) in self.spec.instruments().iter().enumerate() {
            let t = self.ctx.ordinate(instrument.maturity());
            let previous = edges[edges.len() - 1];
            if t <= previous {
                return Err(CurveError::invalid_spec(format!(
                    "instrument {index} of '{}' matures at {} (ordinate {t:.6}), \
                     not after ordinate {previous:.6}",
                    self.spec.name(),
                    instrument.maturity()
                )));
            }
            edges.push(t);
        }
        Ok(edges)
    }

    fn view<'s>(&'s self, segments: &'s [Segment]) -> StretchView<'s> {
        StretchView {
            epoch: self.epoch.ordinate,
            epoch_value: self.epoch.value,
            segments,
            trial: None,
            prior: self.prior,
        }
    }

    fn step(&self, accumulator: StretchAccumulator, index: usize) -> CurveResult<StretchAccumulator> {
        let instrument = &self.spec.instruments()[index];
        let quotes = &self.spec.quotes()[index];
        let left = accumulator.boundary();
        let right = accumulator.edges[index + 1];
        let anchors = self.anchors(&accumulator, right - left);

        let view = self.view(&accumulator.segments);
        let assembled = ConstraintAssembler::new(self.ctx, self.spec.state()).assemble(
            instrument.as_ref(),
            &view,
            quotes,
        );

        let fitted = match assembled {
            Ok(constraint) => self.fit_linear(&accumulator, index, left, right, anchors, constraint),
            Err(err) if err.is_recoverable() => {
                tracing::debug!(
                    stretch = self.spec.name(),
                    segment = index,
                    reason = %err,
                    "no linear constraint, solving for the node"
                );
                self.fit_node(&accumulator, index, left, right, anchors)
            }
            Err(err) => Err(err),
        };
        let (segment, record) = fitted.map_err(|err| self.in_context(index, err))?;

        tracing::debug!(
            stretch = self.spec.name(),
            segment = index,
            left,
            right,
            mode = ?record.mode,
            "segment calibrated"
        );
        Ok(accumulator.push(segment, record, instrument.forward_label()))
    }

    /// Continuity rows `(source, row, target)` at the segment's left edge.
    fn anchors(&self, accumulator: &StretchAccumulator, width: f64) -> Vec<(RowSource, Vec<f64>, f64)> {
        let design = &self.config.design;
        let basis = design.basis();
        let Some(order) = design.continuity.order() else {
            return Vec::new();
        };

        match accumulator.segments.last() {
            None => (0..=order)
                .filter_map(|k| {
                    let target = self.epoch.derivative(k)?;
                    Some((
                        RowSource::Continuity {
                            order: k,
                            anchor: Anchor::Epoch(target),
                        },
                        basis.derivative_row(0.0, k, width),
                        target,
                    ))
                })
                .collect(),
            Some(previous) => (0..=order)
                .map(|k| {
                    (
                        RowSource::Continuity {
                            order: k,
                            anchor: Anchor::PreviousSegment,
                        },
                        basis.derivative_row(0.0, k, width),
                        previous.derivative(previous.right(), k),
                    )
                })
                .collect(),
        }
    }

    fn fit_linear(
        &self,
        accumulator: &StretchAccumulator,
        index: usize,
        left: f64,
        right: f64,
        anchors: Vec<(RowSource, Vec<f64>, f64)>,
        constraint: PredictorResponseWeightConstraint,
    ) -> CurveResult<(Segment, SegmentRecord)> {
        let design = &self.config.design;
        let basis = design.basis();
        let width = right - left;
        let view = self.view(&accumulator.segments);

        let mut row = vec![0.0; basis.dimension()];
        let mut target = constraint.value();
        let mut predictors = Vec::new();
        for (t, weight) in constraint.weights() {
            if t > right {
                return Err(CurveError::invalid_spec(format!(
                    "constraint references ordinate {t} beyond the segment end {right}"
                )));
            }
            if t <= left {
                let response = view.response(t)?;
                target -= weight * response;
                predictors.push(Predictor {
                    ordinate: t,
                    weight,
                    response,
                    known: true,
                });
            } else {
                let phi = basis.value_row((t - left) / width);
                for (entry, value) in row.iter_mut().zip(phi) {
                    *entry += weight * value;
                }
                predictors.push(Predictor {
                    ordinate: t,
                    weight,
                    response: f64::NAN,
                    known: false,
                });
            }
        }
        if predictors.iter().all(|p| p.known) {
            return Err(CurveError::invalid_spec(format!(
                "constraint does not reach into the segment ({left}, {right}]"
            )));
        }

        let (mut rows, mut rhs) = (Vec::new(), Vec::new());
        for (source, anchor_row, value) in anchors {
            rows.push((source, anchor_row));
            rhs.push(value);
        }
        rows.push((RowSource::Constraint, row));
        rhs.push(target);

        let system = SegmentSystem::new(design, width, rows)?;
        let segment = Segment::new(left, right, basis, system.solve(&rhs)?);
        for predictor in predictors.iter_mut().filter(|p| !p.known) {
            predictor.response = segment.value(predictor.ordinate);
        }

        let record = SegmentRecord {
            instrument_index: index,
            system,
            predictors,
            constraint: Some(constraint),
            mode: SegmentMode::Linear,
        };
        Ok((segment, record))
    }

    fn fit_node(
        &self,
        accumulator: &StretchAccumulator,
        index: usize,
        left: f64,
        right: f64,
        anchors: Vec<(RowSource, Vec<f64>, f64)>,
    ) -> CurveResult<(Segment, SegmentRecord)> {
        let design = &self.config.design;
        let basis = design.basis();
        let width = right - left;
        let instrument = &self.spec.instruments()[index];
        let quotes = &self.spec.quotes()[index];
        let measure = quotes.calibration_measure();
        let quote = quotes.calibration_quote();

        let (mut rows, mut rhs) = (Vec::new(), Vec::new());
        for (source, anchor_row, value) in anchors {
            rows.push((source, anchor_row));
            rhs.push(value);
        }
        rows.push((RowSource::Node, basis.value_row(1.0)));
        rhs.push(0.0);
        let node_row = rhs.len() - 1;
        let system = SegmentSystem::new(design, width, rows)?;

        let fit = |node: f64| -> CurveResult<Segment> {
            let mut rhs = rhs.clone();
            rhs[node_row] = node;
            Ok(Segment::new(left, right, basis, system.solve(&rhs)?))
        };
        let objective = |node: f64| -> CurveResult<f64> {
            let trial = fit(node)?;
            let view = StretchView {
                trial: Some(&trial),
                ..self.view(&accumulator.segments)
            };
            Ok(instrument.reprice(self.ctx, &view, measure)? - quote)
        };

        let (lower, upper) = instrument
            .node_bracket()
            .unwrap_or((self.config.root.lower, self.config.root.upper));
        let solver = self.config.root.solver(lower, upper);
        let solver = match instrument.node_floor() {
            Some(floor) => solver.with_floor(floor),
            None => solver,
        };
        let solution = solver
            .solve(objective)
            .map_err(|err| match err {
                CurveError::Math {
                    source: MathError::InvalidBracket { a, b, fa, fb },
                } => CurveError::NoRootBracket {
                    stretch: self.spec.name().to_string(),
                    instrument_index: index,
                    maturity: instrument.maturity(),
                    quote,
                    lower: a,
                    upper: b,
                    f_lower: fa,
                    f_upper: fb,
                },
                other => other,
            })?;

        let segment = fit(solution.root)?;
        let record = SegmentRecord {
            instrument_index: index,
            system,
            predictors: Vec::new(),
            constraint: None,
            mode: SegmentMode::RootSolved {
                node: solution.root,
                iterations: solution.iterations,
            },
        };
        Ok((segment, record))
    }

    /// Attaches the failing instrument to errors that do not name it.
    fn in_context(&self, index: usize, err: CurveError) -> CurveError {
        match err {
            CurveError::NoRootBracket { .. } | CurveError::Calibration { .. } => err,
            other => {
                let quotes = &self.spec.quotes()[index];
                CurveError::calibration_failed(
                    self.spec.name(),
                    index,
                    self.spec.instruments()[index].maturity(),
                    quotes.calibration_quote(),
                    other.to_string(),
                )
            }
        }
    }
}
