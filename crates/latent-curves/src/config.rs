//! Calibration configuration.
//!
//! Every knob of a calibration run lives in [`CalibrationConfig`], which
//! deserializes from TOML with defaults for anything omitted:
//!
//! ```toml
//! verify_recovery = true
//! recovery_tolerance = 1e-8
//!
//! [design]
//! degree = 3
//! continuity = "c2"
//!
//! [root]
//! lower = 0.0
//! upper = 2.0
//!
//! [[indices]]
//! name = "USD-SOFR"
//! currency = "USD"
//! days_per_year = 360.0
//! ```

use latent_math::solvers::{BracketSearch, RootBracketSolver, SolverConfig};
use serde::{Deserialize, Serialize};

use crate::context::{IndexConventions, IndexRegistry};
use crate::error::{CurveError, CurveResult};
use crate::segment::SegmentDesign;

/// Bracket and tolerance for root-solved nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootSearchConfig {
    /// Initial lower node value.
    #[serde(default)]
    pub lower: f64,
    /// Initial upper node value.
    #[serde(default = "default_upper")]
    pub upper: f64,
    /// Width multiplier applied per expansion.
    #[serde(default = "default_expansion_factor")]
    pub expansion_factor: f64,
    /// Expansions tried before giving up.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: u32,
    /// Convergence tolerance on the node value.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Iteration cap for the refinement.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_upper() -> f64 {
    2.0
}

fn default_expansion_factor() -> f64 {
    1.6
}

fn default_max_expansions() -> u32 {
    4
}

fn default_tolerance() -> f64 {
    1e-12
}

fn default_max_iterations() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_recovery_tolerance() -> f64 {
    1e-8
}

impl Default for RootSearchConfig {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: default_upper(),
            expansion_factor: default_expansion_factor(),
            max_expansions: default_max_expansions(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl RootSearchConfig {
    /// Solver over `(lower, upper)` with this configuration's expansion and
    /// tolerance settings.
    pub fn solver(&self, lower: f64, upper: f64) -> RootBracketSolver {
        RootBracketSolver::new(
            BracketSearch::new(lower, upper)
                .with_expansion_factor(self.expansion_factor)
                .with_max_expansions(self.max_expansions),
            SolverConfig::new(self.tolerance, self.max_iterations),
        )
    }
}

/// Configuration of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Segment shape.
    #[serde(default)]
    pub design: SegmentDesign,
    /// Root search for non-linear instruments.
    #[serde(default)]
    pub root: RootSearchConfig,
    /// Reprice every instrument after building a stretch.
    #[serde(default = "default_true")]
    pub verify_recovery: bool,
    /// Largest accepted repricing error.
    #[serde(default = "default_recovery_tolerance")]
    pub recovery_tolerance: f64,
    /// Extra index conventions, added to the standard registry.
    #[serde(default)]
    pub indices: Vec<IndexConventions>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            design: SegmentDesign::default(),
            root: RootSearchConfig::default(),
            verify_recovery: true,
            recovery_tolerance: default_recovery_tolerance(),
            indices: Vec::new(),
        }
    }
}

impl CalibrationConfig {
    /// Parses TOML and validates the result.
    pub fn from_toml_str(content: &str) -> CurveResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CurveError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &str) -> CurveResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CurveError::config(format!("cannot read {path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Sets the segment design.
    #[must_use]
    pub fn with_design(mut self, design: SegmentDesign) -> Self {
        self.design = design;
        self
    }

    /// Sets the root search.
    #[must_use]
    pub fn with_root(mut self, root: RootSearchConfig) -> Self {
        self.root = root;
        self
    }

    /// Enables or disables the post-build recovery check.
    #[must_use]
    pub fn with_verify_recovery(mut self, verify: bool) -> Self {
        self.verify_recovery = verify;
        self
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> CurveResult<()> {
        self.design.validate()?;
        if !(self.root.lower.is_finite() && self.root.upper.is_finite())
            || self.root.lower >= self.root.upper
        {
            return Err(CurveError::config(format!(
                "root bracket [{}, {}] is not an interval",
                self.root.lower, self.root.upper
            )));
        }
        if self.root.expansion_factor <= 0.0 {
            return Err(CurveError::config("expansion factor must be positive"));
        }
        if self.root.tolerance <= 0.0 || self.recovery_tolerance <= 0.0 {
            return Err(CurveError::config("tolerances must be positive"));
        }
        Ok(())
    }

    /// Standard index registry extended with the configured indices.
    pub fn registry(&self) -> IndexRegistry {
        self.indices
            .iter()
            .cloned()
            .fold(IndexRegistry::standard(), IndexRegistry::with_index)
    }
}
