//! Bracket search and bracket-and-refine root finding.

use log::debug;

use crate::error::MathError;
use crate::solvers::{try_brent, SolverConfig, SolverResult};

/// Default growth factor applied when widening a bracket.
pub const DEFAULT_EXPANSION_FACTOR: f64 = 1.6;

/// Default number of widening steps before giving up.
pub const DEFAULT_MAX_EXPANSIONS: u32 = 8;

/// An interval on which the objective changes sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// Lower end.
    pub lower: f64,
    /// Upper end.
    pub upper: f64,
    /// Objective at the lower end.
    pub f_lower: f64,
    /// Objective at the upper end.
    pub f_upper: f64,
    /// Number of widening steps taken.
    pub expansions: u32,
}

/// Outward bracket search.
///
/// Starting from `[lower, upper]`, the end with the smaller objective
/// magnitude is pushed outward by `expansion_factor` times the current width
/// until a sign change appears or `max_expansions` steps have been taken.
/// With a `floor`, the lower end stops there and further steps widen the
/// upper end instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketSearch {
    /// Initial lower end.
    pub lower: f64,
    /// Initial upper end.
    pub upper: f64,
    /// Width multiplier for each widening step.
    pub expansion_factor: f64,
    /// Maximum number of widening steps.
    pub max_expansions: u32,
    /// Smallest admissible lower end.
    pub floor: Option<f64>,
}

impl BracketSearch {
    /// Creates a search over `[lower, upper]` with default expansion settings.
    #[must_use]
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            expansion_factor: DEFAULT_EXPANSION_FACTOR,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            floor: None,
        }
    }

    /// Sets the expansion factor.
    #[must_use]
    pub fn with_expansion_factor(mut self, factor: f64) -> Self {
        self.expansion_factor = factor;
        self
    }

    /// Sets the maximum number of widening steps. Zero disables widening.
    #[must_use]
    pub fn with_max_expansions(mut self, max_expansions: u32) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Keeps the lower end at or above `floor`.
    #[must_use]
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Searches for a sign change.
    ///
    /// Fails with [`MathError::InvalidBracket`] carrying the last interval
    /// tried when no sign change is found, or when the objective stops being
    /// finite while widening.
    pub fn find<F, E>(&self, f: &mut F) -> Result<Bracket, E>
    where
        F: FnMut(f64) -> Result<f64, E>,
        E: From<MathError>,
    {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower >= self.upper {
            return Err(MathError::invalid_input(format!(
                "bracket lower end {} must be below upper end {}",
                self.lower, self.upper
            ))
            .into());
        }
        if self.expansion_factor <= 0.0 {
            return Err(MathError::invalid_input("expansion factor must be positive").into());
        }
        if let Some(floor) = self.floor {
            if !floor.is_finite() || self.lower < floor {
                return Err(MathError::invalid_input(format!(
                    "bracket lower end {} is below the floor {floor}",
                    self.lower
                ))
                .into());
            }
        }

        let mut a = self.lower;
        let mut b = self.upper;
        let mut fa = f(a)?;
        let mut fb = f(b)?;

        for expansion in 0..=self.max_expansions {
            let finite = fa.is_finite() && fb.is_finite();
            if finite && fa * fb <= 0.0 {
                return Ok(Bracket {
                    lower: a,
                    upper: b,
                    f_lower: fa,
                    f_upper: fb,
                    expansions: expansion,
                });
            }
            if !finite || expansion == self.max_expansions {
                break;
            }

            let at_floor = self.floor.is_some_and(|floor| a <= floor);
            if fa.abs() < fb.abs() && !at_floor {
                a += self.expansion_factor * (a - b);
                if let Some(floor) = self.floor {
                    a = a.max(floor);
                }
                fa = f(a)?;
            } else {
                b += self.expansion_factor * (b - a);
                fb = f(b)?;
            }
            debug!(
                "bracket expansion {}: [{a:.6e}, {b:.6e}] f = ({fa:.3e}, {fb:.3e})",
                expansion + 1
            );
        }

        Err(MathError::InvalidBracket { a, b, fa, fb }.into())
    }
}

/// Bracket-and-refine solver: [`BracketSearch`] then Brent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootBracketSolver {
    search: BracketSearch,
    config: SolverConfig,
}

impl RootBracketSolver {
    /// Creates a solver from a bracket search and a refinement config.
    #[must_use]
    pub fn new(search: BracketSearch, config: SolverConfig) -> Self {
        Self { search, config }
    }

    /// Returns the bracket search settings.
    pub fn search(&self) -> &BracketSearch {
        &self.search
    }

    /// Keeps the bracket's lower end at or above `floor`.
    #[must_use]
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.search = self.search.with_floor(floor);
        self
    }

    /// Returns the refinement settings.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Finds a root of `f`.
    #[allow(clippy::float_cmp)]
    pub fn solve<F, E>(&self, mut f: F) -> Result<SolverResult, E>
    where
        F: FnMut(f64) -> Result<f64, E>,
        E: From<MathError>,
    {
        let bracket = self.search.find(&mut f)?;
        if bracket.f_lower == 0.0 || bracket.f_upper == 0.0 {
            let root = if bracket.f_lower == 0.0 {
                bracket.lower
            } else {
                bracket.upper
            };
            return Ok(SolverResult {
                root,
                iterations: 0,
                residual: 0.0,
            });
        }
        try_brent(f, bracket.lower, bracket.upper, &self.config)
    }
}
