//! The read interface shared by stretches, spans, curves and partial views.

use crate::error::{CurveError, CurveResult};

/// A queryable latent-state response over an ordinate range.
///
/// Ordinates are year fractions from the valuation date. What the response
/// means (discount factor, forward rate, hazard rate) is fixed by the
/// quantification metric of the curve that produced it.
///
/// # Required Methods
///
/// - [`response`](ResponseCurve::response)
/// - [`response_derivative`](ResponseCurve::response_derivative)
/// - [`response_integral`](ResponseCurve::response_integral)
/// - [`ordinate_range`](ResponseCurve::ordinate_range)
///
/// # Derived Methods
///
/// - [`zero_rate`](ResponseCurve::zero_rate) and
///   [`simple_forward`](ResponseCurve::simple_forward) read the response as
///   a discount factor
/// - [`survival_probability`](ResponseCurve::survival_probability) reads it
///   as a hazard rate
pub trait ResponseCurve: Send + Sync {
    /// Response value at ordinate `t`.
    fn response(&self, t: f64) -> CurveResult<f64>;

    /// `order`-th derivative of the response at `t`.
    fn response_derivative(&self, t: f64, order: usize) -> CurveResult<f64>;

    /// Integral of the response over `[from, to]`.
    fn response_integral(&self, from: f64, to: f64) -> CurveResult<f64>;

    /// Lowest and highest covered ordinate.
    fn ordinate_range(&self) -> (f64, f64);

    /// True if `t` lies in the covered range.
    fn contains(&self, t: f64) -> bool {
        let (min, max) = self.ordinate_range();
        t >= min && t <= max
    }

    /// Continuously compounded zero rate, reading the response as a discount
    /// factor. Returns the instantaneous forward at `t = 0`.
    fn zero_rate(&self, t: f64) -> CurveResult<f64> {
        if t <= 0.0 {
            let df = self.response(0.0)?;
            return Ok(-self.response_derivative(0.0, 1)? / df);
        }
        let df = self.response(t)?;
        if df <= 0.0 {
            return Err(CurveError::pricing(format!(
                "non-positive discount factor {df} at {t}"
            )));
        }
        Ok(-df.ln() / t)
    }

    /// Simply compounded forward rate between `t1` and `t2`, reading the
    /// response as a discount factor.
    fn simple_forward(&self, t1: f64, t2: f64) -> CurveResult<f64> {
        if t2 <= t1 {
            return Err(CurveError::pricing(format!(
                "forward period end {t2} must follow start {t1}"
            )));
        }
        let df1 = self.response(t1)?;
        let df2 = self.response(t2)?;
        if df2 <= 0.0 {
            return Err(CurveError::pricing(format!(
                "non-positive discount factor {df2} at {t2}"
            )));
        }
        Ok((df1 / df2 - 1.0) / (t2 - t1))
    }

    /// Survival probability to `t`, reading the response as a hazard rate:
    /// `Q(t) = exp(-∫ λ)` from the start of the range.
    fn survival_probability(&self, t: f64) -> CurveResult<f64> {
        let (min, _) = self.ordinate_range();
        if t <= min {
            return Ok(1.0);
        }
        Ok((-self.response_integral(min, t)?).exp())
    }
}
