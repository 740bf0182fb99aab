//! Local polynomial basis for spline segments.
//!
//! A segment on `[left, right]` is parameterized by the local coordinate
//! `u = (t - left) / h` with `h = right - left`, and represented as
//! `Σ c_j u^j` for `j = 0..=degree`. Rows returned here are the linear
//! functionals applied to the coefficient vector `c`.

use nalgebra::DMatrix;

/// Monomial basis `1, u, u², …, u^degree` in local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolynomialBasis {
    degree: usize,
}

impl PolynomialBasis {
    /// Creates a basis of the given polynomial degree.
    #[must_use]
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of coefficients.
    pub fn dimension(&self) -> usize {
        self.degree + 1
    }

    /// Row evaluating the segment value at local coordinate `u`.
    pub fn value_row(&self, u: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.dimension());
        let mut power = 1.0;
        for _ in 0..self.dimension() {
            row.push(power);
            power *= u;
        }
        row
    }

    /// Row evaluating the `order`-th derivative with respect to `t`.
    ///
    /// `d^m/dt^m u^j = j!/(j-m)! · u^(j-m) / h^m`.
    pub fn derivative_row(&self, u: f64, order: usize, width: f64) -> Vec<f64> {
        if order == 0 {
            return self.value_row(u);
        }
        let scale = width.powi(order as i32).recip();
        (0..self.dimension())
            .map(|j| {
                if j < order {
                    0.0
                } else {
                    falling_factorial(j, order) * u.powi((j - order) as i32) * scale
                }
            })
            .collect()
    }

    /// Row evaluating `∫ segment dt` between local coordinates `from` and `to`.
    pub fn integral_row(&self, from: f64, to: f64, width: f64) -> Vec<f64> {
        (0..self.dimension())
            .map(|j| {
                let p = (j + 1) as i32;
                width * (to.powi(p) - from.powi(p)) / f64::from(p)
            })
            .collect()
    }

    /// Gram matrix of the `order`-th derivative over the whole segment:
    /// `G_jl = ∫ φ_j^(m) φ_l^(m) dt`.
    ///
    /// Used as a roughness penalty; `order = 2` penalizes curvature,
    /// `order = 1` penalizes slope.
    pub fn roughness_gram(&self, order: usize, width: f64) -> DMatrix<f64> {
        let n = self.dimension();
        let scale = width.powi(1 - 2 * order as i32);
        DMatrix::from_fn(n, n, |j, l| {
            if j < order || l < order {
                0.0
            } else {
                let power = (j + l + 1 - 2 * order) as f64;
                falling_factorial(j, order) * falling_factorial(l, order) / power * scale
            }
        })
    }

    /// Evaluates `Σ c_j u^j` by Horner's rule.
    pub fn evaluate(&self, coefficients: &[f64], u: f64) -> f64 {
        coefficients.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }

    /// Evaluates the `order`-th derivative with respect to `t`.
    pub fn evaluate_derivative(&self, coefficients: &[f64], u: f64, order: usize, width: f64) -> f64 {
        dot(&self.derivative_row(u, order, width), coefficients)
    }

    /// Evaluates `∫ segment dt` between local coordinates `from` and `to`.
    pub fn evaluate_integral(&self, coefficients: &[f64], from: f64, to: f64, width: f64) -> f64 {
        dot(&self.integral_row(from, to, width), coefficients)
    }
}

/// `j! / (j - m)!`
fn falling_factorial(j: usize, m: usize) -> f64 {
    ((j + 1 - m)..=j).fold(1.0, |acc, k| acc * k as f64)
}

fn dot(row: &[f64], coefficients: &[f64]) -> f64 {
    row.iter().zip(coefficients).map(|(a, b)| a * b).sum()
}
