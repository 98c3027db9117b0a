//! Pure, deterministic SPH smoothing kernels (SPEC_FULL.md §4.2).
//!
//! Each kernel accepts either a precomputed distance or a precomputed
//! squared distance, since callers (`SphSolver`) already have `r²` on hand
//! from the neighbor query's squared-distance pruning and sqrt is only
//! worth paying for once per pair.

use cgmath::{InnerSpace, Vector2};
use std::f32::consts::PI;

/// Poly6 density kernel: `315/(64π h⁹)·(h²−r²)³` for `0 ≤ r ≤ h`, else 0.
pub fn poly6_from_r_sq(r_sq: f32, h: f32) -> f32 {
    let h_sq = h * h;
    if r_sq > h_sq {
        return 0.0;
    }
    let coeff = 315.0 / (64.0 * PI * h.powi(9));
    let diff = h_sq - r_sq;
    coeff * diff * diff * diff
}

/// Same kernel from a plain (non-squared) distance.
pub fn poly6_from_r(r: f32, h: f32) -> f32 {
    poly6_from_r_sq(r * r, h)
}

/// Spiky pressure-kernel gradient: `−45/(π h⁶)·(h−r)²·(r⃗/r)` for
/// `0 < r ≤ h`, else the zero vector. Exactly zero at `r = 0` and `r = h`.
pub fn spiky_gradient_with_r(r_vec: Vector2<f32>, r: f32, h: f32) -> Vector2<f32> {
    if r <= 0.0 || r > h {
        return Vector2::new(0.0, 0.0);
    }
    let coeff = -45.0 / (PI * h.powi(6));
    let term = (h - r) * (h - r) / r;
    r_vec * (coeff * term)
}

/// Same gradient computing `r = |r⃗|` itself.
pub fn spiky_gradient(r_vec: Vector2<f32>, h: f32) -> Vector2<f32> {
    let r = r_vec.magnitude();
    spiky_gradient_with_r(r_vec, r, h)
}

/// Viscosity-kernel Laplacian: `45/(π h⁶)·(h−r)` for `0 ≤ r ≤ h`, else 0.
/// Non-negative on its support.
pub fn viscosity_laplacian_from_r(r: f32, h: f32) -> f32 {
    if r > h {
        return 0.0;
    }
    let coeff = 45.0 / (PI * h.powi(6));
    coeff * (h - r)
}

/// Same Laplacian from a precomputed squared distance.
pub fn viscosity_laplacian_from_r_sq(r_sq: f32, h: f32) -> f32 {
    if r_sq > h * h {
        return 0.0;
    }
    viscosity_laplacian_from_r(r_sq.sqrt(), h)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: f32 = 0.1;

    #[test]
    fn poly6_zero_at_boundary() {
        assert!((poly6_from_r(H, H)).abs() < 1e-6);
    }

    #[test]
    fn poly6_symmetric() {
        let r = 0.03;
        assert_eq!(poly6_from_r(r, H), poly6_from_r(-r, H));
    }

    #[test]
    fn poly6_monotonic_decreasing() {
        let r1 = 0.01;
        let r2 = 0.05;
        assert!(poly6_from_r(r1, H) >= poly6_from_r(r2, H));
    }

    #[test]
    fn poly6_zero_outside_support() {
        assert_eq!(poly6_from_r(H * 1.5, H), 0.0);
    }

    #[test]
    fn spiky_zero_at_origin_and_boundary() {
        let zero = Vector2::new(0.0, 0.0);
        assert_eq!(spiky_gradient(zero, H), Vector2::new(0.0, 0.0));

        let at_h = Vector2::new(H, 0.0);
        let g = spiky_gradient(at_h, H);
        assert!(g.magnitude() < 1e-6);
    }

    #[test]
    fn spiky_monotonic_in_magnitude() {
        let g1 = spiky_gradient(Vector2::new(0.01, 0.0), H).magnitude();
        let g2 = spiky_gradient(Vector2::new(0.05, 0.0), H).magnitude();
        assert!(g1 >= g2);
    }

    #[test]
    fn viscosity_zero_at_boundary_and_nonnegative() {
        assert!((viscosity_laplacian_from_r(H, H)).abs() < 1e-6);
        assert!(viscosity_laplacian_from_r(0.0, H) >= 0.0);
        assert!(viscosity_laplacian_from_r(H * 0.5, H) >= 0.0);
    }

    #[test]
    fn viscosity_monotonic_decreasing() {
        let l1 = viscosity_laplacian_from_r(0.01, H);
        let l2 = viscosity_laplacian_from_r(0.05, H);
        assert!(l1 >= l2);
    }

    #[test]
    fn viscosity_zero_outside_support() {
        assert_eq!(viscosity_laplacian_from_r(H * 2.0, H), 0.0);
    }

    #[test]
    fn r_and_r_sq_forms_agree() {
        let r = 0.037;
        assert!((poly6_from_r(r, H) - poly6_from_r_sq(r * r, H)).abs() < 1e-9);
        assert!((viscosity_laplacian_from_r(r, H) - viscosity_laplacian_from_r_sq(r * r, H)).abs() < 1e-6);
    }
}
