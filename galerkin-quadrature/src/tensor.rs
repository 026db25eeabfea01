//! Rules for quadrilaterals and hexahedra formed as tensor products of Gauss rules.

use crate::univariate::gauss;
use crate::Rule;

/// A Gauss rule for the unit square with the given number of points per dimension.
///
/// The first coordinate varies fastest.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    let (weights1d, points1d) = gauss(num_points_per_dim);
    let mut weights = Vec::with_capacity(weights1d.len().pow(2));
    let mut points = Vec::with_capacity(weights1d.len().pow(2));

    for (&wy, &[y]) in weights1d.iter().zip(&points1d) {
        for (&wx, &[x]) in weights1d.iter().zip(&points1d) {
            weights.push(wx * wy);
            points.push([x, y]);
        }
    }

    (weights, points)
}

/// A Gauss rule for the unit cube with the given number of points per dimension.
///
/// The first coordinate varies fastest.
pub fn hexahedron_gauss(num_points_per_dim: usize) -> Rule<3> {
    let (weights1d, points1d) = gauss(num_points_per_dim);
    let mut weights = Vec::with_capacity(weights1d.len().pow(3));
    let mut points = Vec::with_capacity(weights1d.len().pow(3));

    for (&wz, &[z]) in weights1d.iter().zip(&points1d) {
        for (&wy, &[y]) in weights1d.iter().zip(&points1d) {
            for (&wx, &[x]) in weights1d.iter().zip(&points1d) {
                weights.push(wx * wy * wz);
                points.push([x, y, z]);
            }
        }
    }

    (weights, points)
}
