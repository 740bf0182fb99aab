//! Predictor-response weight constraints.
//!
//! A constraint states `Σ w_i · R(t_i) = value` over predictor ordinates
//! `t_i` of the latent state response `R`. Per manifest measure it may also
//! carry the derivative of its weights and value with respect to that quote,
//! which is what sensitivity propagation consumes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::CurveResult;
use crate::measure::ManifestMeasure;
use crate::response::ResponseCurve;

/// A predictor ordinate usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
pub struct Ordinate(f64);

impl Ordinate {
    /// Wraps an ordinate, normalizing `-0.0` to `0.0`.
    #[must_use]
    pub fn new(t: f64) -> Self {
        Self(t + 0.0)
    }

    /// The ordinate value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Ordinate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ordinate {}

impl PartialOrd for Ordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordinate to weight map.
pub type WeightMap = BTreeMap<Ordinate, f64>;

fn add_into(map: &mut WeightMap, t: f64, weight: f64) {
    *map.entry(Ordinate::new(t)).or_insert(0.0) += weight;
}

/// Derivative of a constraint with respect to one quote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensitivityMap {
    weights: WeightMap,
    value: f64,
}

impl SensitivityMap {
    /// `∂w_i/∂q` per ordinate.
    pub fn weights(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.weights.iter().map(|(t, w)| (t.value(), *w))
    }

    /// `∂value/∂q`.
    pub fn value(&self) -> f64 {
        self.value
    }

    fn absorb(&mut self, other: &Self) {
        for (t, w) in &other.weights {
            add_into(&mut self.weights, t.value(), *w);
        }
        self.value += other.value;
    }
}

/// `Σ w_i · R(t_i) = value`, plus per-measure quote derivatives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictorResponseWeightConstraint {
    weights: WeightMap,
    value: f64,
    sensitivities: BTreeMap<ManifestMeasure, SensitivityMap>,
}

impl PredictorResponseWeightConstraint {
    /// Creates an empty constraint with value zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight` at ordinate `t`; weights at coinciding ordinates sum.
    pub fn add_weight(&mut self, t: f64, weight: f64) {
        add_into(&mut self.weights, t, weight);
    }

    /// Adds to the right-hand side.
    pub fn add_value(&mut self, value: f64) {
        self.value += value;
    }

    /// Adds `∂w/∂q` at `t` for quotes of `measure`.
    pub fn add_sensitivity_weight(&mut self, measure: ManifestMeasure, t: f64, d_weight: f64) {
        add_into(&mut self.sensitivities.entry(measure).or_default().weights, t, d_weight);
    }

    /// Adds `∂value/∂q` for quotes of `measure`.
    pub fn add_sensitivity_value(&mut self, measure: ManifestMeasure, d_value: f64) {
        self.sensitivities.entry(measure).or_default().value += d_value;
    }

    /// Weights in increasing ordinate order.
    pub fn weights(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.weights.iter().map(|(t, w)| (t.value(), *w))
    }

    /// Right-hand side.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Quote derivative for a measure.
    pub fn sensitivity(&self, measure: ManifestMeasure) -> Option<&SensitivityMap> {
        self.sensitivities.get(&measure)
    }

    /// Measures that carry a quote derivative.
    pub fn sensitivity_measures(&self) -> impl Iterator<Item = ManifestMeasure> + '_ {
        self.sensitivities.keys().copied()
    }

    /// True when no predictor ordinate is referenced.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Largest referenced ordinate.
    pub fn last_ordinate(&self) -> Option<f64> {
        self.weights.keys().next_back().map(|t| t.value())
    }

    /// Merges `other` into `self`: weight maps, values and sensitivity maps
    /// are added term by term.
    pub fn absorb(&mut self, other: &Self) {
        for (t, w) in &other.weights {
            add_into(&mut self.weights, t.value(), *w);
        }
        self.value += other.value;
        for (measure, map) in &other.sensitivities {
            self.sensitivities.entry(*measure).or_default().absorb(map);
        }
    }

    /// By-value form of [`absorb`](Self::absorb).
    #[must_use]
    pub fn absorbed(mut self, other: &Self) -> Self {
        self.absorb(other);
        self
    }

    /// `Σ w_i · R(t_i) - value` against a curve.
    pub fn residual(&self, curve: &dyn ResponseCurve) -> CurveResult<f64> {
        let mut sum = -self.value;
        for (t, w) in self.weights() {
            sum += w * curve.response(t)?;
        }
        Ok(sum)
    }
}
