//! Valuation context handed to every instrument.
//!
//! Holds the valuation date, the ordinate convention, a read-only registry
//! of floating-rate index conventions, and curves that are already finished
//! (for example the funding curve a CDS discounts with). Nothing in here is
//! global; each calibration run receives its own context.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use latent_core::Date;
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};
use crate::latent_state::LatentStateLabel;
use crate::response::ResponseCurve;

/// Days per year of the ordinate convention (ACT/365F).
pub const ORDINATE_DAYS_PER_YEAR: f64 = 365.0;

/// Accrual conventions of a floating-rate index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConventions {
    /// Index name, e.g. `USD-SOFR`.
    pub name: String,
    /// ISO currency code.
    pub currency: String,
    /// Day-count denominator for accruals (360 or 365).
    pub days_per_year: f64,
    /// Tenor of the index in months; zero for overnight indices.
    #[serde(default)]
    pub tenor_months: u32,
}

impl IndexConventions {
    /// Creates a convention record.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        currency: impl Into<String>,
        days_per_year: f64,
        tenor_months: u32,
    ) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            days_per_year,
            tenor_months,
        }
    }

    /// Accrual fraction between two dates.
    pub fn accrual(&self, start: Date, end: Date) -> f64 {
        start.days_between(&end) as f64 / self.days_per_year
    }
}

/// Read-only lookup of index conventions by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRegistry {
    indices: BTreeMap<String, IndexConventions>,
}

impl IndexRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the common overnight and term indices.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_index(IndexConventions::new("USD-SOFR", "USD", 360.0, 0))
            .with_index(IndexConventions::new("EUR-ESTR", "EUR", 360.0, 0))
            .with_index(IndexConventions::new("GBP-SONIA", "GBP", 365.0, 0))
            .with_index(IndexConventions::new("USD-LIBOR-3M", "USD", 360.0, 3))
            .with_index(IndexConventions::new("EUR-EURIBOR-6M", "EUR", 360.0, 6))
    }

    /// Adds or replaces an index.
    #[must_use]
    pub fn with_index(mut self, conventions: IndexConventions) -> Self {
        self.indices.insert(conventions.name.clone(), conventions);
        self
    }

    /// Looks up an index.
    pub fn get(&self, name: &str) -> CurveResult<&IndexConventions> {
        self.indices
            .get(name)
            .ok_or_else(|| CurveError::pricing(format!("unknown index '{name}'")))
    }

    /// Number of registered indices.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if no index is registered.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Everything an instrument may consult while generating a constraint or
/// repricing.
#[derive(Clone)]
pub struct ValuationContext {
    valuation_date: Date,
    registry: Arc<IndexRegistry>,
    curves: BTreeMap<LatentStateLabel, Arc<dyn ResponseCurve>>,
}

impl ValuationContext {
    /// Creates a context with no finished curves.
    #[must_use]
    pub fn new(valuation_date: Date, registry: Arc<IndexRegistry>) -> Self {
        Self {
            valuation_date,
            registry,
            curves: BTreeMap::new(),
        }
    }

    /// Adds a finished curve for a latent state.
    #[must_use]
    pub fn with_curve(mut self, label: LatentStateLabel, curve: Arc<dyn ResponseCurve>) -> Self {
        self.curves.insert(label, curve);
        self
    }

    /// Valuation date.
    pub fn valuation_date(&self) -> Date {
        self.valuation_date
    }

    /// Index conventions.
    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Ordinate of a date: ACT/365F year fraction from the valuation date.
    pub fn ordinate(&self, date: Date) -> f64 {
        self.valuation_date.days_between(&date) as f64 / ORDINATE_DAYS_PER_YEAR
    }

    /// Finished curve for a latent state.
    pub fn curve(&self, label: &LatentStateLabel) -> CurveResult<&dyn ResponseCurve> {
        self.curves
            .get(label)
            .map(|curve| curve.as_ref())
            .ok_or_else(|| CurveError::curve_not_found(label))
    }
}

impl fmt::Debug for ValuationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuationContext")
            .field("valuation_date", &self.valuation_date)
            .field("indices", &self.registry.len())
            .field("curves", &self.curves.keys().collect::<Vec<_>>())
            .finish()
    }
}
