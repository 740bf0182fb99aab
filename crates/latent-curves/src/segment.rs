//! Polynomial segments and the linear systems that calibrate them.
//!
//! Each segment is fitted from a small dense system: continuity rows
//! against the left anchor, then one instrument row (a linear constraint or
//! a root-solved node value). When the rows leave coefficients free, the
//! remaining freedom is spent minimizing a roughness penalty.

use latent_math::basis::PolynomialBasis;
use latent_math::linear_algebra::{solve_kkt, solve_linear_system};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constraint::PredictorResponseWeightConstraint;
use crate::error::{CurveError, CurveResult};

/// Smoothness enforced across segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Continuity {
    /// No continuity; each segment stands alone (piecewise-flat hazard rates).
    Discontinuous,
    /// Value continuity.
    C0,
    /// Value and first derivative.
    C1,
    /// Up to the second derivative.
    C2,
    /// Up to the third derivative.
    C3,
}

impl Continuity {
    /// Highest matched derivative order, `None` when discontinuous.
    pub fn order(&self) -> Option<usize> {
        match self {
            Self::Discontinuous => None,
            Self::C0 => Some(0),
            Self::C1 => Some(1),
            Self::C2 => Some(2),
            Self::C3 => Some(3),
        }
    }
}

/// Roughness penalty used when a segment has spare coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeControl {
    /// Weight on `∫ R''²`.
    #[serde(default = "default_curvature_weight")]
    pub curvature_weight: f64,
    /// Weight on `∫ R'²`.
    #[serde(default)]
    pub slope_weight: f64,
}

fn default_curvature_weight() -> f64 {
    1.0
}

impl Default for ShapeControl {
    fn default() -> Self {
        Self {
            curvature_weight: default_curvature_weight(),
            slope_weight: 0.0,
        }
    }
}

impl ShapeControl {
    /// Penalty matrix for a segment of the given width.
    pub fn penalty(&self, basis: &PolynomialBasis, width: f64) -> DMatrix<f64> {
        let mut q = DMatrix::zeros(basis.dimension(), basis.dimension());
        if self.curvature_weight != 0.0 {
            q += basis.roughness_gram(2, width) * self.curvature_weight;
        }
        if self.slope_weight != 0.0 {
            q += basis.roughness_gram(1, width) * self.slope_weight;
        }
        q
    }
}

/// Segment shape: polynomial degree, continuity and roughness penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentDesign {
    /// Polynomial degree of every segment.
    #[serde(default = "default_degree")]
    pub degree: usize,
    /// Continuity across internal boundaries.
    #[serde(default = "default_continuity")]
    pub continuity: Continuity,
    /// Roughness penalty.
    #[serde(default)]
    pub shape: ShapeControl,
}

fn default_degree() -> usize {
    3
}

fn default_continuity() -> Continuity {
    Continuity::C1
}

impl Default for SegmentDesign {
    fn default() -> Self {
        Self {
            degree: default_degree(),
            continuity: default_continuity(),
            shape: ShapeControl::default(),
        }
    }
}

impl SegmentDesign {
    /// Cubic segments with C1 continuity and a curvature penalty.
    #[must_use]
    pub fn smooth() -> Self {
        Self::default()
    }

    /// Piecewise-constant segments with no continuity (hazard rates).
    #[must_use]
    pub fn piecewise_flat() -> Self {
        Self {
            degree: 0,
            continuity: Continuity::Discontinuous,
            shape: ShapeControl::default(),
        }
    }

    /// Sets the continuity.
    #[must_use]
    pub fn with_continuity(mut self, continuity: Continuity) -> Self {
        self.continuity = continuity;
        self
    }

    /// Sets the shape control.
    #[must_use]
    pub fn with_shape(mut self, shape: ShapeControl) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the polynomial degree.
    #[must_use]
    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    /// Basis implied by the degree.
    pub fn basis(&self) -> PolynomialBasis {
        PolynomialBasis::new(self.degree)
    }

    /// Checks that every segment after the first can satisfy its
    /// continuity rows and one instrument row.
    pub fn validate(&self) -> CurveResult<()> {
        if let Some(order) = self.continuity.order() {
            if order + 1 > self.degree {
                return Err(CurveError::config(format!(
                    "degree {} leaves no freedom for an instrument under {:?}",
                    self.degree, self.continuity
                )));
            }
        }
        if self.shape.curvature_weight < 0.0 || self.shape.slope_weight < 0.0 {
            return Err(CurveError::config("roughness weights must be non-negative"));
        }
        Ok(())
    }
}

/// Where a continuity row takes its target from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Caller-supplied epoch value or slope.
    Epoch(f64),
    /// Right edge of the previous segment.
    PreviousSegment,
}

/// Meaning of one row of a segment system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowSource {
    /// Derivative `order` at the left edge equals the anchor.
    Continuity {
        /// Derivative order.
        order: usize,
        /// Target source.
        anchor: Anchor,
    },
    /// The instrument's linear constraint.
    Constraint,
    /// Response at the right edge equals the root-solved node.
    Node,
}

/// How a segment's instrument row was satisfied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentMode {
    /// Linear constraint solved directly.
    Linear,
    /// Node value found by bracket-and-refine root search.
    RootSolved {
        /// Response at the right edge.
        node: f64,
        /// Root solver iterations.
        iterations: u32,
    },
}

/// One predictor term of the instrument constraint after calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predictor {
    /// Ordinate.
    pub ordinate: f64,
    /// Constraint weight.
    pub weight: f64,
    /// Response at the ordinate.
    pub response: f64,
    /// True if the response was substituted from an already-built region.
    pub known: bool,
}

/// Dense rows of a segment system plus the optional roughness penalty.
#[derive(Debug, Clone)]
pub struct SegmentSystem {
    rows: DMatrix<f64>,
    sources: Vec<RowSource>,
    penalty: Option<DMatrix<f64>>,
}

impl SegmentSystem {
    /// Assembles the system from `(source, row)` pairs.
    ///
    /// Fails when there are more rows than coefficients.
    pub fn new(
        design: &SegmentDesign,
        width: f64,
        rows: Vec<(RowSource, Vec<f64>)>,
    ) -> CurveResult<Self> {
        let basis = design.basis();
        let n = basis.dimension();
        if rows.len() > n {
            return Err(CurveError::config(format!(
                "no feasible shape: {} conditions for {n} coefficients",
                rows.len()
            )));
        }

        let mut matrix = DMatrix::zeros(rows.len(), n);
        let mut sources = Vec::with_capacity(rows.len());
        for (r, (source, row)) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                matrix[(r, c)] = value;
            }
            sources.push(source);
        }

        let penalty = (sources.len() < n).then(|| design.shape.penalty(&basis, width));
        Ok(Self {
            rows: matrix,
            sources,
            penalty,
        })
    }

    /// Row meanings, in row order.
    pub fn sources(&self) -> &[RowSource] {
        &self.sources
    }

    /// Solves for coefficients given one right-hand side per row.
    pub fn solve(&self, rhs: &[f64]) -> CurveResult<Vec<f64>> {
        let b = DVector::from_column_slice(rhs);
        let x = match &self.penalty {
            None => solve_linear_system(&self.rows, &b)?,
            Some(q) => solve_kkt(q, &self.rows, &b)?,
        };
        Ok(x.iter().copied().collect())
    }
}

/// Calibration record of one segment, replayed by the sensitivity pass.
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    /// Index of the instrument within its stretch.
    pub instrument_index: usize,
    /// System the coefficients solve.
    pub system: SegmentSystem,
    /// Constraint terms with their responses.
    pub predictors: Vec<Predictor>,
    /// The instrument constraint, absent for root-solved segments.
    pub constraint: Option<PredictorResponseWeightConstraint>,
    /// How the instrument row was satisfied.
    pub mode: SegmentMode,
}

/// A calibrated polynomial piece on `[left, right]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    left: f64,
    right: f64,
    basis: PolynomialBasis,
    coefficients: Vec<f64>,
}

impl Segment {
    /// Creates a segment from local-coordinate coefficients.
    #[must_use]
    pub fn new(left: f64, right: f64, basis: PolynomialBasis, coefficients: Vec<f64>) -> Self {
        Self {
            left,
            right,
            basis,
            coefficients,
        }
    }

    /// Left edge.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.right
    }

    /// `right - left`.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Basis the coefficients refer to.
    pub fn basis(&self) -> &PolynomialBasis {
        &self.basis
    }

    /// Local-coordinate coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// True if `t` lies on the closed segment.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.left && t <= self.right
    }

    fn local(&self, t: f64) -> f64 {
        (t - self.left) / self.width()
    }

    /// Response at `t`.
    pub fn value(&self, t: f64) -> f64 {
        self.basis.evaluate(&self.coefficients, self.local(t))
    }

    /// `order`-th derivative at `t`.
    pub fn derivative(&self, t: f64, order: usize) -> f64 {
        self.basis
            .evaluate_derivative(&self.coefficients, self.local(t), order, self.width())
    }

    /// Integral over `[from, to]`, clipped to the segment.
    pub fn integral(&self, from: f64, to: f64) -> f64 {
        let a = from.max(self.left);
        let b = to.min(self.right);
        if b <= a {
            return 0.0;
        }
        self.basis
            .evaluate_integral(&self.coefficients, self.local(a), self.local(b), self.width())
    }

    /// Evaluates another coefficient vector on this segment's geometry.
    pub fn evaluate_with(&self, coefficients: &[f64], t: f64, order: usize) -> f64 {
        self.basis
            .evaluate_derivative(coefficients, self.local(t), order, self.width())
    }
}

/// Segment owning `t`: the first segment whose right edge is at or beyond
/// `t`, so internal boundaries belong to the segment on their left.
pub(crate) fn locate_index(segments: &[Segment], t: f64) -> Option<usize> {
    let first = segments.first()?;
    let last = segments.last()?;
    if t < first.left || t > last.right {
        return None;
    }
    let index = segments.partition_point(|s| s.right < t);
    (index < segments.len()).then_some(index)
}

/// Integral over `[from, to]` across consecutive segments.
pub(crate) fn integrate<'a>(segments: impl IntoIterator<Item = &'a Segment>, from: f64, to: f64) -> f64 {
    segments
        .into_iter()
        .map(|segment| segment.integral(from, to))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cubic() -> Segment {
        Segment::new(1.0, 3.0, PolynomialBasis::new(3), vec![1.0, -0.5, 0.25, 0.1])
    }

    #[test]
    fn test_value_and_derivative() {
        let s = cubic();
        // u = 0.5
        assert_relative_eq!(s.value(2.0), 1.0 - 0.25 + 0.0625 + 0.0125);
        let slope = (-0.5 + 2.0 * 0.25 * 0.5 + 3.0 * 0.1 * 0.25) / 2.0;
        assert_relative_eq!(s.derivative(2.0, 1), slope, epsilon = 1e-14);
    }

    #[test]
    fn test_integral_clips_to_segment() {
        let flat = Segment::new(0.0, 2.0, PolynomialBasis::new(0), vec![0.03]);
        assert_relative_eq!(flat.integral(-1.0, 1.0), 0.03);
        assert_relative_eq!(flat.integral(0.0, 5.0), 0.06);
        assert_relative_eq!(flat.integral(3.0, 5.0), 0.0);
    }

    #[test]
    fn test_locate_is_left_continuous() {
        let basis = PolynomialBasis::new(0);
        let segments = vec![
            Segment::new(0.0, 1.0, basis, vec![1.0]),
            Segment::new(1.0, 2.0, basis, vec![2.0]),
        ];
        assert_eq!(locate_index(&segments, 0.0), Some(0));
        assert_eq!(locate_index(&segments, 1.0), Some(0));
        assert_eq!(locate_index(&segments, 1.5), Some(1));
        assert_eq!(locate_index(&segments, 2.0), Some(1));
        assert_eq!(locate_index(&segments, 2.5), None);
        assert_eq!(locate_index(&segments, -0.1), None);
        assert_relative_eq!(integrate(&segments, 0.5, 1.5), 1.5);
    }

    #[test]
    fn test_square_system() {
        let design = SegmentDesign::smooth().with_degree(1).with_continuity(Continuity::C0);
        let basis = design.basis();
        let system = SegmentSystem::new(
            &design,
            1.0,
            vec![
                (
                    RowSource::Continuity {
                        order: 0,
                        anchor: Anchor::Epoch(1.0),
                    },
                    basis.value_row(0.0),
                ),
                (RowSource::Node, basis.value_row(1.0)),
            ],
        )
        .unwrap();

        let coefficients = system.solve(&[1.0, 0.9]).unwrap();
        assert_relative_eq!(coefficients[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(coefficients[1], -0.1, epsilon = 1e-14);
    }

    #[test]
    fn test_penalized_system_is_straight_when_possible() {
        // Value 1 at left and 0.9 at right with free slope: the
        // least-curvature cubic is the straight line.
        let design = SegmentDesign::smooth();
        let basis = design.basis();
        let system = SegmentSystem::new(
            &design,
            2.0,
            vec![
                (
                    RowSource::Continuity {
                        order: 0,
                        anchor: Anchor::Epoch(1.0),
                    },
                    basis.value_row(0.0),
                ),
                (RowSource::Node, basis.value_row(1.0)),
            ],
        )
        .unwrap();

        let c = system.solve(&[1.0, 0.9]).unwrap();
        assert_relative_eq!(c[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(c[1], -0.1, epsilon = 1e-12);
        assert_relative_eq!(c[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(c[3], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_over_determined_rejected() {
        let design = SegmentDesign::piecewise_flat();
        let basis = design.basis();
        let rows = vec![
            (RowSource::Constraint, basis.value_row(1.0)),
            (RowSource::Node, basis.value_row(1.0)),
        ];
        assert!(SegmentSystem::new(&design, 1.0, rows).is_err());
    }

    #[test]
    fn test_design_validation() {
        assert!(SegmentDesign::smooth().validate().is_ok());
        assert!(SegmentDesign::piecewise_flat().validate().is_ok());
        assert!(SegmentDesign::smooth()
            .with_continuity(Continuity::C3)
            .validate()
            .is_err());
        assert_eq!(Continuity::C2.order(), Some(2));
        assert_eq!(Continuity::Discontinuous.order(), None);
    }
}
