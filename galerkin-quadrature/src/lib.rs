//! Quadrature rules for finite element reference domains.
//!
//! All rules are defined on the *unit* reference domains used by `galerkin`:
//!
//! - the interval `[0, 1]`,
//! - the quadrilateral `[0, 1]^2` and the hexahedron `[0, 1]^3`,
//! - the triangle with vertices `(0, 0), (1, 0), (0, 1)`,
//! - the tetrahedron with vertices `(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1)`.
//!
//! Rules are always computed in double precision. Conversion to other scalar types is left
//! to the user.

pub mod simplex;
pub mod tensor;
pub mod univariate;

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule, given as a pair of weights and points.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

pub type Rule1d = Rule<1>;
pub type Rule2d = Rule<2>;
pub type Rule3d = Rule<3>;

/// The number of Gauss points per dimension needed to integrate univariate polynomials
/// of the given degree exactly.
pub fn gauss_points_for_degree(degree: usize) -> usize {
    // n Gauss points integrate polynomials of degree 2n - 1 exactly
    degree / 2 + 1
}

/// A rule for the reference interval which integrates polynomials of the given degree exactly.
pub fn interval(strength: usize) -> Rule1d {
    univariate::gauss(gauss_points_for_degree(strength))
}

/// A rule for the reference quadrilateral which integrates polynomials of the given degree
/// in each variable exactly.
pub fn quadrilateral(strength: usize) -> Rule2d {
    tensor::quadrilateral_gauss(gauss_points_for_degree(strength))
}

/// A rule for the reference hexahedron which integrates polynomials of the given degree
/// in each variable exactly.
pub fn hexahedron(strength: usize) -> Rule3d {
    tensor::hexahedron_gauss(gauss_points_for_degree(strength))
}

/// A rule for the reference triangle which integrates polynomials of the given total degree
/// exactly.
pub fn triangle(strength: usize) -> Rule2d {
    simplex::collapsed_triangle(strength)
}

/// A rule for the reference tetrahedron which integrates polynomials of the given total degree
/// exactly.
pub fn tetrahedron(strength: usize) -> Rule3d {
    simplex::collapsed_tetrahedron(strength)
}
