//! Latent state identification.
//!
//! A latent state is the market quantity a curve infers (discount factor,
//! forward rate, hazard rate). It is identified by a label naming *which*
//! state and a quantification metric naming *how* it is represented.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a latent state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LatentStateLabel {
    /// Funding (discount) curve of a currency.
    Funding(String),
    /// Forward curve of a floating rate index.
    Forward(String),
    /// Credit curve of a reference entity.
    Credit(String),
    /// Volatility surface slice.
    Volatility(String),
}

impl fmt::Display for LatentStateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Funding(ccy) => write!(f, "FUNDING::{ccy}"),
            Self::Forward(index) => write!(f, "FORWARD::{index}"),
            Self::Credit(entity) => write!(f, "CREDIT::{entity}"),
            Self::Volatility(name) => write!(f, "VOLATILITY::{name}"),
        }
    }
}

/// How a latent state is represented by the curve's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantificationMetric {
    /// Discount factor.
    DiscountFactor,
    /// Continuously compounded zero rate.
    ZeroRate,
    /// Forward rate.
    ForwardRate,
    /// Instantaneous hazard rate.
    HazardRate,
    /// Survival probability.
    SurvivalProbability,
    /// Implied volatility.
    Volatility,
}

/// A latent state label bound to its quantification metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LatentStateSpec {
    /// Which state.
    pub label: LatentStateLabel,
    /// How it is represented.
    pub metric: QuantificationMetric,
}

impl LatentStateSpec {
    /// Creates a spec.
    #[must_use]
    pub fn new(label: LatentStateLabel, metric: QuantificationMetric) -> Self {
        Self { label, metric }
    }

    /// Discount factors of a currency's funding curve.
    #[must_use]
    pub fn funding(currency: impl Into<String>) -> Self {
        Self::new(
            LatentStateLabel::Funding(currency.into()),
            QuantificationMetric::DiscountFactor,
        )
    }

    /// Forward rates of a floating rate index.
    #[must_use]
    pub fn forward(index: impl Into<String>) -> Self {
        Self::new(
            LatentStateLabel::Forward(index.into()),
            QuantificationMetric::ForwardRate,
        )
    }

    /// Hazard rates of a reference entity.
    #[must_use]
    pub fn credit(entity: impl Into<String>) -> Self {
        Self::new(
            LatentStateLabel::Credit(entity.into()),
            QuantificationMetric::HazardRate,
        )
    }
}
