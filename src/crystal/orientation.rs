//! Crystal orientation.
//!
//! # Convention
//!
//! The orientation matrix `g` is passive: it maps vectors expressed in the
//! laboratory frame into the crystal frame, `V_c = g · V_s`. Its transpose
//! brings crystal vectors (plane normals, scattering vectors) into the lab.
//! Euler angles follow the Bunge (z-x-z) convention and are given in degrees.

use std::f64::consts::SQRT_2;

use super::symmetry::{rotation_angle, Symmetry};
use crate::error::{LaueError, Result};
use crate::{Matrix3, Vector3};

/// Maximum deviation from orthonormality accepted by [`Orientation::from_matrix`].
const ROTATION_TOLERANCE: f64 = 1e-6;

/// A crystal orientation, stored as a proper rotation matrix.
///
/// Never mutated in place: every operation returns a new value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    g: Matrix3,
}

impl Orientation {
    /// Wrap a rotation matrix, rejecting anything that is not orthonormal with det = +1.
    pub fn from_matrix(g: Matrix3) -> Result<Self> {
        let error = (g * g.transpose() - Matrix3::identity()).abs().max();
        let det = g.determinant();
        if error > ROTATION_TOLERANCE || (det - 1.0).abs() > ROTATION_TOLERANCE {
            return Err(LaueError::NotARotation { det, error });
        }
        Ok(Self { g })
    }

    /// Orientation from Bunge Euler angles (degrees).
    pub fn from_euler(phi1: f64, phi: f64, phi2: f64) -> Self {
        let (s1, c1) = phi1.to_radians().sin_cos();
        let (s, c) = phi.to_radians().sin_cos();
        let (s2, c2) = phi2.to_radians().sin_cos();
        let g = Matrix3::new(
            c1 * c2 - s1 * s2 * c,
            s1 * c2 + c1 * s2 * c,
            s2 * s,
            -c1 * s2 - s1 * c2 * c,
            -s1 * s2 + c1 * c2 * c,
            c2 * s,
            s1 * s,
            -c1 * s,
            c,
        );
        Self { g }
    }

    /// Orientation from a Rodrigues vector `r = tan(ω/2)·n`.
    pub fn from_rodrigues(rod: &Vector3) -> Self {
        let r = rod.norm();
        if r == 0.0 {
            return Self::cube();
        }
        let n = rod / r;
        let omega = 2.0 * r.atan();
        let (s, c) = omega.sin_cos();
        let k = Matrix3::new(0.0, n.z, -n.y, -n.z, 0.0, n.x, n.y, -n.x, 0.0);
        let g = (1.0 - c) * n * n.transpose() + c * Matrix3::identity() + s * k;
        Self { g }
    }

    pub fn cube() -> Self {
        Self {
            g: Matrix3::identity(),
        }
    }

    pub fn goss() -> Self {
        Self::from_euler(0.0, 45.0, 0.0)
    }

    pub fn brass() -> Self {
        Self::from_euler(35.264, 45.0, 0.0)
    }

    pub fn copper() -> Self {
        Self::from_euler(90.0, 35.264, 45.0)
    }

    pub fn s3() -> Self {
        Self::from_euler(58.98, 36.7, 63.43)
    }

    pub fn shear() -> Self {
        Self::from_euler(45.0, 0.0, 0.0)
    }

    #[inline]
    pub fn orientation_matrix(&self) -> Matrix3 {
        self.g
    }

    /// Bunge Euler angles in degrees, φ1 and φ2 in [0, 360), Φ in [0, 180].
    pub fn euler(&self) -> [f64; 3] {
        let g = &self.g;
        let phi = g[(2, 2)].clamp(-1.0, 1.0).acos();
        let (phi1, phi2) = if (1.0 - g[(2, 2)].abs()) < 1e-12 {
            (g[(0, 1)].atan2(g[(0, 0)]), 0.0)
        } else {
            (g[(2, 0)].atan2(-g[(2, 1)]), g[(0, 2)].atan2(g[(1, 2)]))
        };
        [
            phi1.to_degrees().rem_euclid(360.0),
            phi.to_degrees(),
            phi2.to_degrees().rem_euclid(360.0),
        ]
    }

    /// Rodrigues vector `tan(ω/2)·n`.
    pub fn rodrigues(&self) -> Vector3 {
        let g = &self.g;
        let t = g.trace() + 1.0;
        Vector3::new(
            (g[(1, 2)] - g[(2, 1)]) / t,
            (g[(2, 0)] - g[(0, 2)]) / t,
            (g[(0, 1)] - g[(1, 0)]) / t,
        )
    }

    pub fn quaternion(&self) -> crate::Quaternion {
        crate::Quaternion::from_rotation_matrix(&nalgebra::Rotation3::from_matrix_unchecked(self.g))
    }

    /// True if this orientation lies in the fundamental zone of `symmetry`.
    pub fn in_fz(&self, symmetry: Symmetry) -> bool {
        match symmetry {
            Symmetry::Cubic => {
                let r = self.rodrigues();
                let r1 = r.x.abs() + r.y.abs() + r.z.abs();
                r1 <= 1.0 && r.amax() <= SQRT_2 - 1.0
            }
            _ => {
                let reduced = symmetry.move_rotation_to_fz(&self.g);
                rotation_angle(&reduced) >= rotation_angle(&self.g) - 1e-12
            }
        }
    }

    /// Symmetry-equivalent orientation with the smallest rotation angle.
    pub fn to_fz(&self, symmetry: Symmetry) -> Self {
        Self {
            g: symmetry.move_rotation_to_fz(&self.g),
        }
    }

    /// Misorientation angle (radians) of a misorientation matrix `Δ = g_a·g_bᵀ`.
    ///
    /// Crystal symmetry is not taken into account.
    pub fn misorientation_angle_from_delta(delta: &Matrix3) -> f64 {
        rotation_angle(delta)
    }

    /// Unit rotation axis of a misorientation matrix, `None` for the identity.
    pub fn misorientation_axis_from_delta(delta: &Matrix3) -> Option<Vector3> {
        let axis = Vector3::new(
            delta[(1, 2)] - delta[(2, 1)],
            delta[(2, 0)] - delta[(0, 2)],
            delta[(0, 1)] - delta[(1, 0)],
        );
        let norm = axis.norm();
        (norm > 1e-12).then(|| axis / norm)
    }

    /// Smallest misorientation angle (radians) to `other` over all symmetry operators.
    pub fn disorientation(&self, other: &Orientation, symmetry: Symmetry) -> f64 {
        let delta = other.g * self.g.transpose();
        symmetry
            .symmetry_operators()
            .iter()
            .map(|op| rotation_angle(&(op * delta)))
            .fold(f64::INFINITY, f64::min)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::cube()
    }
}
