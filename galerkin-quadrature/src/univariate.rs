//! Quadrature rules for the unit interval `[0, 1]`.

use crate::Rule;
use std::f64::consts::PI;

/// Legendre polynomial p_n and its predecessor p_{n - 1}, evaluated at a point in `(-1, 1)`.
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    p_n: f64,
    p_n_minus_1: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        // m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p_n = 1.0;
        let mut p_n_minus_1 = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let p_n_minus_2 = p_n_minus_1;
            p_n_minus_1 = p_n;
            p_n = ((2.0 * m - 1.0) * x * p_n_minus_1 - (m - 1.0) * p_n_minus_2) / m;
        }
        Self {
            n,
            x,
            p_n,
            p_n_minus_1,
        }
    }

    fn value(&self) -> f64 {
        self.p_n
    }

    /// Derivative of p_n. Only defined for |x| < 1.
    fn derivative(&self) -> f64 {
        let n = self.n as f64;
        n * (self.x * self.p_n - self.p_n_minus_1) / (self.x * self.x - 1.0)
    }
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`.
fn gauss_legendre_symmetric(n: usize) -> (Vec<f64>, Vec<f64>) {
    let num_roots_to_find = (n + 1) / 2;
    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];

    // Only the roots in (0, 1) are computed, the rest follow by symmetry
    for i in 0..num_roots_to_find {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut recurrence = LegendreRecurrence::evaluate(n, x);
        for _ in 0..100 {
            let dx = -recurrence.value() / recurrence.derivative();
            x += dx;
            recurrence = LegendreRecurrence::evaluate(n, x);
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let dp = recurrence.derivative();
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        points[i] = -x;
        weights[i] = w;
        points[n - i - 1] = x;
        weights[n - i - 1] = w;
    }

    (points, weights)
}

/// Gauss quadrature for the unit interval `[0, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2n - 1` exactly.
/// Points are sorted in ascending order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    assert!(num_points > 0, "number of points must be positive");
    let (points, weights) = gauss_legendre_symmetric(num_points);
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|x| [0.5 * (x + 1.0)]).collect();
    (weights, points)
}

#[cfg(test)]
mod tests {
    use super::{gauss, LegendreRecurrence};
    use matrixcompare::assert_scalar_eq;

    #[test]
    fn legendre_recurrence_matches_closed_form() {
        let p: Vec<fn(f64) -> f64> = vec![
            |_| 1.0,
            |x| x,
            |x| 0.5 * (3.0 * x.powi(2) - 1.0),
            |x| 0.5 * (5.0 * x.powi(3) - 3.0 * x),
        ];
        for (n, p_n) in p.iter().enumerate() {
            for &x in &[-0.7, -0.1, 0.3, 0.9] {
                assert_scalar_eq!(LegendreRecurrence::evaluate(n, x).value(), p_n(x), comp = abs, tol = 1e-14);
            }
        }
    }

    #[test]
    fn gauss_integrates_monomials_exactly() {
        for n in 1..8 {
            let (weights, points) = gauss(n);
            for degree in 0..(2 * n) {
                let integral: f64 = weights
                    .iter()
                    .zip(&points)
                    .map(|(w, [x])| w * x.powi(degree as i32))
                    .sum();
                let expected = 1.0 / (degree as f64 + 1.0);
                assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-13);
            }
        }
    }

    #[test]
    fn gauss_points_are_sorted_and_interior() {
        let (_, points) = gauss(5);
        for pair in points.windows(2) {
            assert!(pair[0][0] < pair[1][0]);
        }
        assert!(points.iter().all(|[x]| *x > 0.0 && *x < 1.0));
    }
}
