//! Linear algebra utilities.
//!
//! Dense solves used by segment calibration: a square solve when a segment is
//! fully determined by its conditions, and a saddle-point (KKT) solve when it
//! has spare coefficients that are fixed by minimizing a roughness penalty.

use crate::error::{MathError, MathResult};
use nalgebra::{DMatrix, DVector};

/// Relative pivot size below which a matrix is treated as singular.
const PIVOT_TOLERANCE: f64 = 1e-14;

/// Solves a square linear system `A x = b` by partially pivoted LU.
///
/// # Errors
///
/// `SingularMatrix` when a pivot is zero or negligible relative to the
/// largest pivot, `DimensionMismatch` on incompatible shapes.
pub fn solve_linear_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(MathError::invalid_input("Matrix must be square"));
    }
    if n != b.len() {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: b.len(),
            cols2: 1,
        });
    }
    if n == 0 {
        return Err(MathError::insufficient_data(1, 0));
    }

    let lu = a.clone().lu();
    let pivots = lu.u().diagonal();
    let largest = pivots.amax();
    let smallest = pivots.iter().fold(f64::INFINITY, |acc, p| acc.min(p.abs()));
    if largest == 0.0 || smallest <= PIVOT_TOLERANCE * largest {
        return Err(MathError::SingularMatrix);
    }

    let x = lu.solve(b).ok_or(MathError::SingularMatrix)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::SingularMatrix);
    }
    Ok(x)
}

/// Minimizes `½ xᵀ Q x` subject to `A x = b`.
///
/// Solves the saddle-point system
///
/// ```text
/// | Q  Aᵀ | | x |   | 0 |
/// | A  0  | | λ | = | b |
/// ```
///
/// and returns `x`. The system is regular when `A` has full row rank and `Q`
/// is positive definite on the null space of `A`.
pub fn solve_kkt(q: &DMatrix<f64>, a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    let n = q.nrows();
    let m = a.nrows();
    if q.ncols() != n {
        return Err(MathError::invalid_input("Penalty matrix must be square"));
    }
    if a.ncols() != n {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: m,
            cols2: a.ncols(),
        });
    }
    if b.len() != m {
        return Err(MathError::DimensionMismatch {
            rows1: m,
            cols1: n,
            rows2: b.len(),
            cols2: 1,
        });
    }

    let size = n + m;
    let mut kkt = DMatrix::zeros(size, size);
    kkt.view_mut((0, 0), (n, n)).copy_from(q);
    kkt.view_mut((0, n), (n, m)).copy_from(&a.transpose());
    kkt.view_mut((n, 0), (m, n)).copy_from(a);

    let mut rhs = DVector::zeros(size);
    rhs.rows_mut(n, m).copy_from(b);

    let solution = solve_linear_system(&kkt, &rhs)?;
    Ok(solution.rows(0, n).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_linear_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![5.0, 5.0]);

        let x = solve_linear_system(&a, &b).unwrap();

        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_needs_pivoting() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0, 3.0]);

        let x = solve_linear_system(&a, &b).unwrap();

        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        assert!(matches!(
            solve_linear_system(&a, &b),
            Err(MathError::SingularMatrix)
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = DMatrix::identity(2, 2);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        assert!(matches!(
            solve_linear_system(&a, &b),
            Err(MathError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_kkt_minimum_norm() {
        // min ½(x² + y²) s.t. x + y = 2  =>  x = y = 1
        let q = DMatrix::identity(2, 2);
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0]);

        let x = solve_kkt(&q, &a, &b).unwrap();

        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kkt_honours_constraints_exactly() {
        // Penalize only the last coordinate; first two are pinned.
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![0.0, 0.0, 1.0]));
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![0.5, 3.0]);

        let x = solve_kkt(&q, &a, &b).unwrap();

        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1] + x[2], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kkt_unpenalized_null_space_is_singular() {
        let q = DMatrix::zeros(2, 2);
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0]);

        assert!(solve_kkt(&q, &a, &b).is_err());
    }
}
