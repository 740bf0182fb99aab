//! Named curves: a merged span with its audit inputs and turn overlays.
//!
//! A turn is a multiplicative adjustment `exp(-s · overlap(t))` applied to
//! the response, where `overlap(t)` is the length of `[start, end]` already
//! elapsed at `t`. Turns model known jumps such as year-end funding spreads
//! without disturbing calibration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};
use crate::latent_state::LatentStateLabel;
use crate::response::ResponseCurve;
use crate::sensitivity::{QuoteKey, SensitivityPropagator, SensitivityTable};
use crate::span::{Span, SpanPiece};
use crate::stretch::Stretch;
use crate::stretch_spec::StretchSpec;

/// A spread applied over an ordinate interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Start ordinate.
    pub start: f64,
    /// End ordinate.
    pub end: f64,
    /// Continuously compounded spread over the interval.
    pub spread: f64,
}

impl Turn {
    /// Creates a turn over `[start, end]`.
    pub fn new(start: f64, end: f64, spread: f64) -> CurveResult<Self> {
        if !(start.is_finite() && end.is_finite() && spread.is_finite()) || start >= end {
            return Err(CurveError::invalid_spec(format!(
                "turn [{start}, {end}] with spread {spread} is not valid"
            )));
        }
        Ok(Self { start, end, spread })
    }

    /// Length of the interval elapsed at `t`.
    pub fn overlap(&self, t: f64) -> f64 {
        (t.min(self.end) - self.start).max(0.0)
    }

    /// `d overlap / dt`, taking the left limit at the kinks.
    pub fn overlap_slope(&self, t: f64) -> f64 {
        if t > self.start && t <= self.end {
            1.0
        } else {
            0.0
        }
    }
}

/// A calibrated, named latent-state curve.
#[derive(Debug, Clone)]
pub struct Curve {
    name: String,
    label: LatentStateLabel,
    span: Span,
    pieces: Vec<SpanPiece>,
    inputs: Vec<StretchSpec>,
    turns: Vec<Turn>,
    sensitivities: BTreeMap<String, SensitivityTable>,
}

impl Curve {
    /// Creates a curve from a span without gaps.
    pub fn new(name: impl Into<String>, span: Span, inputs: Vec<StretchSpec>) -> CurveResult<Self> {
        let name = name.into();
        let label = span
            .stretches()
            .first()
            .map(|stretch| stretch.state().label.clone())
            .ok_or_else(|| CurveError::merge(format!("curve '{name}' has no stretches")))?;
        let pieces = span.pieces()?;
        Ok(Self {
            name,
            label,
            span,
            pieces,
            inputs,
            turns: Vec::new(),
            sensitivities: BTreeMap::new(),
        })
    }

    /// Curve over a single stretch.
    pub fn from_stretch(name: impl Into<String>, stretch: Stretch, input: StretchSpec) -> CurveResult<Self> {
        Self::new(name, Span::new().with_stretch(stretch)?, vec![input])
    }

    /// Curve name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latent state label.
    pub fn label(&self) -> &LatentStateLabel {
        &self.label
    }

    /// Underlying span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Effective partition of the span.
    pub fn pieces(&self) -> &[SpanPiece] {
        &self.pieces
    }

    /// Stretch specs the curve was calibrated from.
    pub fn inputs(&self) -> &[StretchSpec] {
        &self.inputs
    }

    /// Turn overlays.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Stretch by name.
    pub fn stretch(&self, name: &str) -> Option<&Stretch> {
        self.span.stretch(name)
    }

    /// Copy of the curve with the given turns replacing any existing ones.
    #[must_use]
    pub fn with_turns(&self, turns: Vec<Turn>) -> Self {
        Self {
            turns,
            ..self.clone()
        }
    }

    /// Computes and stores the sensitivity table of every stretch, each
    /// seeded with the tables of the stretches before it.
    pub fn annotate_sensitivities(&mut self) -> CurveResult<()> {
        let stretches = self.span.stretches();
        let mut tables: Vec<SensitivityTable> = Vec::with_capacity(stretches.len());
        for (index, stretch) in stretches.iter().enumerate() {
            let table = SensitivityPropagator::new(stretch)
                .with_prior(&stretches[..index], &tables)?
                .propagate()?;
            tables.push(table);
        }
        self.sensitivities = tables
            .into_iter()
            .map(|table| (table.stretch().to_string(), table))
            .collect();
        Ok(())
    }

    /// Stored sensitivity table of a stretch.
    pub fn sensitivities(&self, stretch: &str) -> Option<&SensitivityTable> {
        self.sensitivities.get(stretch)
    }

    /// `∂R(t)/∂q` for a quote of the named stretch, turns included, read
    /// from whichever stretch answers `t`.
    ///
    /// Requires [`annotate_sensitivities`](Self::annotate_sensitivities).
    pub fn response_sensitivity(&self, t: f64, stretch: &str, key: QuoteKey) -> CurveResult<f64> {
        let table = |name: &str| {
            self.sensitivities.get(name).ok_or_else(|| {
                CurveError::curve_not_found(format!("sensitivities of stretch '{name}' in '{}'", self.name))
            })
        };
        table(stretch)?;
        let owner = self.owner(t)?;
        Ok(table(owner.name())?.quote_sensitivity(t, stretch, key)? * self.turn_factor(t))
    }

    fn owner(&self, t: f64) -> CurveResult<&Stretch> {
        let piece = self
            .pieces
            .iter()
            .rev()
            .find(|piece| t >= piece.left && t <= piece.right)
            .ok_or_else(|| {
                let (min, max) = self.ordinate_range();
                CurveError::ordinate_out_of_range(t, min, max)
            })?;
        Ok(&self.span.stretches()[piece.stretch])
    }

    fn turn_exponent_slope(&self, t: f64) -> f64 {
        -self.turns.iter().map(|turn| turn.spread * turn.overlap_slope(t)).sum::<f64>()
    }

    fn turn_factor(&self, t: f64) -> f64 {
        (-self
            .turns
            .iter()
            .map(|turn| turn.spread * turn.overlap(t))
            .sum::<f64>())
        .exp()
    }
}

impl ResponseCurve for Curve {
    fn response(&self, t: f64) -> CurveResult<f64> {
        Ok(self.owner(t)?.response(t)? * self.turn_factor(t))
    }

    /// Leibniz rule on `R · h` with `h = exp(g)`, `g` piecewise linear, so
    /// `h^(j) = g'^j · h`.
    fn response_derivative(&self, t: f64, order: usize) -> CurveResult<f64> {
        let owner = self.owner(t)?;
        let h = self.turn_factor(t);
        let g1 = self.turn_exponent_slope(t);
        let mut total = 0.0;
        let mut binomial = 1.0;
        for j in 0..=order {
            total += binomial * owner.response_derivative(t, order - j)? * g1.powi(j as i32) * h;
            binomial = binomial * (order - j) as f64 / (j + 1) as f64;
        }
        Ok(total)
    }

    fn response_integral(&self, from: f64, to: f64) -> CurveResult<f64> {
        if !self.turns.is_empty() {
            return Err(CurveError::pricing(format!(
                "curve '{}' has turns; integrals are not defined",
                self.name
            )));
        }
        self.span.response_integral(from, to)
    }

    fn ordinate_range(&self) -> (f64, f64) {
        match (self.pieces.first(), self.pieces.last()) {
            (Some(first), Some(last)) => (first.left, last.right),
            _ => (0.0, 0.0),
        }
    }
}
