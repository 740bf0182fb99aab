//! Ordered merging of stretches into spans.
//!
//! Stretches are added left to right. Each may overlap its predecessor;
//! inside an overlap the later stretch wins everywhere except on the strict
//! interior of an earlier stretch that is queried at a point the later one
//! does not cover. The effective partition is exposed through
//! [`Span::pieces`].

use crate::error::{CurveError, CurveResult};
use crate::response::ResponseCurve;
use crate::stretch::Stretch;

/// Part of the span's ordinate range answered by one stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanPiece {
    /// Index of the owning stretch.
    pub stretch: usize,
    /// Left edge.
    pub left: f64,
    /// Right edge.
    pub right: f64,
}

/// An ordered collection of stretches.
#[derive(Debug, Clone, Default)]
pub struct Span {
    stretches: Vec<Stretch>,
}

impl Span {
    /// Creates an empty span.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stretch.
    ///
    /// Fails if the name is taken, or if the stretch does not start and end
    /// strictly after the last stretch.
    pub fn add_stretch(&mut self, stretch: Stretch) -> CurveResult<()> {
        if self.stretches.iter().any(|s| s.name() == stretch.name()) {
            return Err(CurveError::merge(format!(
                "stretch '{}' is already in the span",
                stretch.name()
            )));
        }
        if let Some(last) = self.stretches.last() {
            if stretch.left() <= last.left() {
                return Err(CurveError::merge(format!(
                    "stretch '{}' starts at {} but '{}' already starts at {}",
                    stretch.name(),
                    stretch.left(),
                    last.name(),
                    last.left()
                )));
            }
            if stretch.right() <= last.right() {
                return Err(CurveError::merge(format!(
                    "stretch '{}' ends at {} within '{}' ending at {}",
                    stretch.name(),
                    stretch.right(),
                    last.name(),
                    last.right()
                )));
            }
        }
        tracing::debug!(
            stretch = stretch.name(),
            left = stretch.left(),
            right = stretch.right(),
            "stretch added to span"
        );
        self.stretches.push(stretch);
        Ok(())
    }

    /// Builder-style [`add_stretch`](Self::add_stretch).
    pub fn with_stretch(mut self, stretch: Stretch) -> CurveResult<Self> {
        self.add_stretch(stretch)?;
        Ok(self)
    }

    /// Stretches in insertion order.
    pub fn stretches(&self) -> &[Stretch] {
        &self.stretches
    }

    /// Stretch by name.
    pub fn stretch(&self, name: &str) -> Option<&Stretch> {
        self.stretches.iter().find(|s| s.name() == name)
    }

    /// Number of stretches.
    pub fn len(&self) -> usize {
        self.stretches.len()
    }

    /// True if the span has no stretch.
    pub fn is_empty(&self) -> bool {
        self.stretches.is_empty()
    }

    /// Index of the stretch answering queries at `t`.
    ///
    /// The earliest stretch whose strict interior contains `t` owns it;
    /// otherwise, at a shared boundary, the latest stretch containing `t`.
    pub fn query_index(&self, t: f64) -> CurveResult<usize> {
        owner_index(&self.stretches, t).ok_or_else(|| {
            let (min, max) = self.ordinate_range();
            CurveError::ordinate_out_of_range(t, min, max)
        })
    }

    /// Stretch answering queries at `t`.
    pub fn query(&self, t: f64) -> CurveResult<&Stretch> {
        Ok(&self.stretches[self.query_index(t)?])
    }

    /// Effective partition of the span, left to right.
    ///
    /// Each stretch answers from where its predecessor ends; a gap between
    /// consecutive stretches is a merge error.
    pub fn pieces(&self) -> CurveResult<Vec<SpanPiece>> {
        let mut pieces: Vec<SpanPiece> = Vec::with_capacity(self.stretches.len());
        for (index, stretch) in self.stretches.iter().enumerate() {
            let left = match pieces.last() {
                None => stretch.left(),
                Some(previous) if stretch.left() > previous.right => {
                    return Err(CurveError::merge(format!(
                        "gap between {} and {} before stretch '{}'",
                        previous.right,
                        stretch.left(),
                        stretch.name()
                    )));
                }
                Some(previous) => previous.right,
            };
            pieces.push(SpanPiece {
                stretch: index,
                left,
                right: stretch.right(),
            });
        }
        Ok(pieces)
    }
}

impl ResponseCurve for Span {
    fn response(&self, t: f64) -> CurveResult<f64> {
        self.query(t)?.response(t)
    }

    fn response_derivative(&self, t: f64, order: usize) -> CurveResult<f64> {
        self.query(t)?.response_derivative(t, order)
    }

    fn response_integral(&self, from: f64, to: f64) -> CurveResult<f64> {
        if from > to {
            return Ok(-self.response_integral(to, from)?);
        }
        let (min, max) = self.ordinate_range();
        if from < min || to > max {
            let t = if from < min { from } else { to };
            return Err(CurveError::ordinate_out_of_range(t, min, max));
        }
        let mut total = 0.0;
        for piece in self.pieces()? {
            let a = from.max(piece.left);
            let b = to.min(piece.right);
            if b > a {
                total += self.stretches[piece.stretch].response_integral(a, b)?;
            }
        }
        Ok(total)
    }

    fn ordinate_range(&self) -> (f64, f64) {
        match (self.stretches.first(), self.stretches.last()) {
            (Some(first), Some(last)) => (first.left(), last.right()),
            _ => (0.0, 0.0),
        }
    }
}

/// Query rule of [`Span::query_index`] over a slice of stretches.
pub(crate) fn owner_index(stretches: &[Stretch], t: f64) -> Option<usize> {
    stretches
        .iter()
        .position(|s| t > s.left() && t < s.right())
        .or_else(|| stretches.iter().rposition(|s| t >= s.left() && t <= s.right()))
}

/// Merges stretches, in order, into a span.
pub fn merge_stretches(stretches: Vec<Stretch>) -> CurveResult<Span> {
    stretches
        .into_iter()
        .try_fold(Span::new(), Span::with_stretch)
}
