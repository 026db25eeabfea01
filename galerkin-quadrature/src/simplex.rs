//! Rules for the reference triangle and tetrahedron.
//!
//! The rules are obtained by mapping tensor product Gauss rules on the unit square/cube
//! onto the simplex through the collapsed (Duffy) coordinate transformation
//!
//! ```text
//! x = u,  y = v (1 - u),  z = w (1 - u) (1 - v),
//! ```
//!
//! with the Jacobian determinant absorbed into the weights. The number of points in each
//! direction accounts for the polynomial degree added by the Jacobian determinant, so a rule
//! of strength `s` integrates every polynomial of total degree `s` exactly.
//! The rules are not symmetric, but all points are strictly interior and all weights positive.

use crate::univariate::gauss;
use crate::{gauss_points_for_degree, Rule};

/// A rule for the reference triangle that is exact for polynomials of total degree `strength`.
pub fn collapsed_triangle(strength: usize) -> Rule<2> {
    let (weights_u, points_u) = gauss(gauss_points_for_degree(strength + 1));
    let (weights_v, points_v) = gauss(gauss_points_for_degree(strength));

    let mut weights = Vec::with_capacity(weights_u.len() * weights_v.len());
    let mut points = Vec::with_capacity(weights_u.len() * weights_v.len());
    for (&wu, &[u]) in weights_u.iter().zip(&points_u) {
        for (&wv, &[v]) in weights_v.iter().zip(&points_v) {
            weights.push(wu * wv * (1.0 - u));
            points.push([u, v * (1.0 - u)]);
        }
    }
    (weights, points)
}

/// A rule for the reference tetrahedron that is exact for polynomials of total degree `strength`.
pub fn collapsed_tetrahedron(strength: usize) -> Rule<3> {
    let (weights_u, points_u) = gauss(gauss_points_for_degree(strength + 2));
    let (weights_v, points_v) = gauss(gauss_points_for_degree(strength + 1));
    let (weights_w, points_w) = gauss(gauss_points_for_degree(strength));

    let capacity = weights_u.len() * weights_v.len() * weights_w.len();
    let mut weights = Vec::with_capacity(capacity);
    let mut points = Vec::with_capacity(capacity);
    for (&wu, &[u]) in weights_u.iter().zip(&points_u) {
        for (&wv, &[v]) in weights_v.iter().zip(&points_v) {
            for (&ww, &[w]) in weights_w.iter().zip(&points_w) {
                weights.push(wu * wv * ww * (1.0 - u).powi(2) * (1.0 - v));
                points.push([u, v * (1.0 - u), w * (1.0 - u) * (1.0 - v)]);
            }
        }
    }
    (weights, points)
}
