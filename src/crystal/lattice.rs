//! Crystal lattices, lattice planes and lattice directions.
//!
//! All lengths are in nanometers. Reciprocal vectors follow the
//! crystallographic convention `a·a* = 1` (no 2π factor), so the norm of a
//! scattering vector is the inverse of the interplanar spacing.

use std::str::FromStr;

use super::symmetry::Symmetry;
use crate::diffraction::lambda_kev_to_nm;
use crate::error::LaueError;
use crate::{Matrix3, Vector3};

/// A crystal lattice described by its direct basis vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    /// Rows are the direct basis vectors a, b, c in a Cartesian crystal frame (nm).
    basis: Matrix3,
    symmetry: Symmetry,
}

impl Lattice {
    /// Build a lattice from its six parameters (lengths in nm, angles in degrees).
    ///
    /// `a` lies along x, `b` in the xy plane.
    pub fn from_parameters(
        a: f64,
        b: f64,
        c: f64,
        alpha_deg: f64,
        beta_deg: f64,
        gamma_deg: f64,
        symmetry: Symmetry,
    ) -> Self {
        let (alpha, beta, gamma) = (
            alpha_deg.to_radians(),
            beta_deg.to_radians(),
            gamma_deg.to_radians(),
        );
        let cx = c * beta.cos();
        let cy = c * (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
        let cz = (c * c - cx * cx - cy * cy).max(0.0).sqrt();
        let basis = Matrix3::new(
            a,
            0.0,
            0.0,
            b * gamma.cos(),
            b * gamma.sin(),
            0.0,
            cx,
            cy,
            cz,
        );
        // Clean up round-off on the exact zeros of orthogonal cells
        let basis = basis.map(|v| if v.abs() < 1e-15 { 0.0 } else { v });
        Self { basis, symmetry }
    }

    pub fn cubic(a: f64) -> Self {
        Self::from_parameters(a, a, a, 90.0, 90.0, 90.0, Symmetry::Cubic)
    }

    pub fn tetragonal(a: f64, c: f64) -> Self {
        Self::from_parameters(a, a, c, 90.0, 90.0, 90.0, Symmetry::Tetragonal)
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self::from_parameters(a, b, c, 90.0, 90.0, 90.0, Symmetry::Orthorhombic)
    }

    pub fn hexagonal(a: f64, c: f64) -> Self {
        Self::from_parameters(a, a, c, 90.0, 90.0, 120.0, Symmetry::Hexagonal)
    }

    pub fn triclinic(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        Self::from_parameters(a, b, c, alpha, beta, gamma, Symmetry::Triclinic)
    }

    /// Lattice of a common element, looked up by chemical symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let lattice = match symbol {
            "Al" => Self::cubic(0.40495),
            "Au" => Self::cubic(0.4078),
            "Cu" => Self::cubic(0.3615),
            "Fe" => Self::cubic(0.2856),
            "Ni" => Self::cubic(0.3524),
            "Si" => Self::cubic(0.5431),
            "W" => Self::cubic(0.3165),
            "Mg" => Self::hexagonal(0.3209, 0.5211),
            "Ti" => Self::hexagonal(0.2951, 0.4684),
            "Zn" => Self::hexagonal(0.2665, 0.4947),
            "Sn" => Self::tetragonal(0.5832, 0.3182),
            _ => return None,
        };
        Some(lattice)
    }

    /// Direct basis, one vector per row.
    pub fn basis(&self) -> &Matrix3 {
        &self.basis
    }

    /// Reciprocal basis, one vector per row (`a* = b×c / V`).
    pub fn reciprocal_basis(&self) -> Matrix3 {
        let (a, b, c) = self.basis_vectors();
        let v = self.volume();
        Matrix3::from_rows(&[
            (b.cross(&c) / v).transpose(),
            (c.cross(&a) / v).transpose(),
            (a.cross(&b) / v).transpose(),
        ])
    }

    /// Unit cell volume in nm³.
    pub fn volume(&self) -> f64 {
        let (a, b, c) = self.basis_vectors();
        a.dot(&b.cross(&c))
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    fn basis_vectors(&self) -> (Vector3, Vector3, Vector3) {
        (
            self.basis.row(0).transpose(),
            self.basis.row(1).transpose(),
            self.basis.row(2).transpose(),
        )
    }
}

/// A lattice plane (h k l).
///
/// The scattering vector is computed once at construction; planes are
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct HklPlane {
    miller: [i32; 3],
    gc: Vector3,
}

impl HklPlane {
    pub fn new(h: i32, k: i32, l: i32, lattice: &Lattice) -> Self {
        let hkl = Vector3::new(h as f64, k as f64, l as f64);
        let gc = lattice.reciprocal_basis().transpose() * hkl;
        Self {
            miller: [h, k, l],
            gc,
        }
    }

    #[inline]
    pub fn miller_indices(&self) -> [i32; 3] {
        self.miller
    }

    /// Scattering vector G in the crystal frame (nm⁻¹).
    #[inline]
    pub fn scattering_vector(&self) -> Vector3 {
        self.gc
    }

    /// Interplanar spacing d = 1/|G| (nm).
    #[inline]
    pub fn interplanar_spacing(&self) -> f64 {
        1.0 / self.gc.norm()
    }

    /// Unit plane normal in the crystal frame.
    #[inline]
    pub fn normal(&self) -> Vector3 {
        self.gc.normalize()
    }

    /// Bragg angle (radians) for a beam of the given energy in keV.
    ///
    /// A negative energy gives the negative angle of the backward solution.
    pub fn bragg_angle(&self, energy_kev: f64) -> f64 {
        let lambda = lambda_kev_to_nm(energy_kev);
        (lambda / (2.0 * self.interplanar_spacing())).asin()
    }
}

impl std::fmt::Display for HklPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [h, k, l] = self.miller;
        write!(f, "({h} {k} {l})")
    }
}

/// A lattice direction [u v w], typically a zone axis.
#[derive(Debug, Clone, PartialEq)]
pub struct HklDirection {
    uvw: [i32; 3],
    direction: Vector3,
}

impl HklDirection {
    pub fn new(u: i32, v: i32, w: i32, lattice: &Lattice) -> Self {
        let uvw = Vector3::new(u as f64, v as f64, w as f64);
        Self {
            uvw: [u, v, w],
            direction: lattice.basis().transpose() * uvw,
        }
    }

    pub fn indices(&self) -> [i32; 3] {
        self.uvw
    }

    /// Unit direction in the crystal frame.
    pub fn direction(&self) -> Vector3 {
        self.direction.normalize()
    }
}

/// Systematic extinction rule applied when enumerating planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extinction {
    /// Face-centered cubic: h, k, l all even or all odd.
    Fcc,
    /// Body-centered cubic: h + k + l even.
    Bcc,
}

impl FromStr for Extinction {
    type Err = LaueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcc" => Ok(Self::Fcc),
            "bcc" => Ok(Self::Bcc),
            _ => Err(LaueError::UnsupportedExtinction(s.to_string())),
        }
    }
}

impl Extinction {
    /// True if the reflection (h k l) is allowed.
    pub fn allows(&self, h: i32, k: i32, l: i32) -> bool {
        match self {
            Self::Fcc => {
                let parity = [h, k, l].map(|i| i.rem_euclid(2));
                parity == [0, 0, 0] || parity == [1, 1, 1]
            }
            Self::Bcc => (h * h + k * k + l * l).rem_euclid(2) == 0,
        }
    }
}

/// All planes with indices in `[-max_miller, max_miller]`, (0 0 0) excluded.
///
/// Enumeration is h-major, then k, then l, each ascending.
pub fn build_list(lattice: &Lattice, max_miller: i32, extinction: Option<Extinction>) -> Vec<HklPlane> {
    let mut planes = Vec::new();
    for h in -max_miller..=max_miller {
        for k in -max_miller..=max_miller {
            for l in -max_miller..=max_miller {
                if h == 0 && k == 0 && l == 0 {
                    continue;
                }
                if extinction.is_some_and(|rule| !rule.allows(h, k, l)) {
                    continue;
                }
                planes.push(HklPlane::new(h, k, l, lattice));
            }
        }
    }
    planes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_plane_geometry() {
        let ni = Lattice::cubic(0.3524);
        let p = HklPlane::new(1, 1, 1, &ni);
        let d = p.interplanar_spacing();
        assert!((d - 0.3524 / 3f64.sqrt()).abs() < 1e-12, "d = {d}");
        let n = p.normal();
        let expected = Vector3::new(1.0, 1.0, 1.0).normalize();
        assert!((n - expected).norm() < 1e-12);
        assert!((p.scattering_vector().norm() - 1.0 / d).abs() < 1e-9);
    }

    #[test]
    fn test_reciprocal_basis_is_dual() {
        let lat = Lattice::triclinic(0.5, 0.6, 0.7, 80.0, 95.0, 105.0);
        let prod = lat.basis() * lat.reciprocal_basis().transpose();
        assert!(
            (prod - Matrix3::identity()).abs().max() < 1e-12,
            "a_i . a*_j should be the identity, got {prod}"
        );
    }

    #[test]
    fn test_hexagonal_spacing() {
        let lat = Lattice::hexagonal(0.2951, 0.4684);
        // d(001) = c for a hexagonal cell
        let d = HklPlane::new(0, 0, 1, &lat).interplanar_spacing();
        assert!((d - 0.4684).abs() < 1e-12);
        // d(100) = a·sqrt(3)/2
        let d = HklPlane::new(1, 0, 0, &lat).interplanar_spacing();
        assert!((d - 0.2951 * 3f64.sqrt() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bragg_angle() {
        let lat = Lattice::cubic(0.4);
        let p = HklPlane::new(2, 0, 0, &lat);
        // d = 0.2 nm, at 12.398 keV lambda = 0.1 nm, sin(theta) = 0.25
        let theta = p.bragg_angle(12.398);
        assert!((theta - 0.25f64.asin()).abs() < 1e-12);
        assert!((p.bragg_angle(-12.398) + theta).abs() < 1e-12);
    }

    #[test]
    fn test_zone_axis_direction() {
        let lat = Lattice::cubic(0.36);
        let za = HklDirection::new(1, 1, 0, &lat);
        assert!((za.direction() - Vector3::new(1.0, 1.0, 0.0).normalize()).norm() < 1e-12);
        // Every plane of the [110] zone is parallel to the axis
        for (h, k, l) in [(1, -1, 0), (1, -1, 1), (0, 0, 1), (2, -2, 3)] {
            let n = HklPlane::new(h, k, l, &lat).normal();
            assert!(n.dot(&za.direction()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_build_list_counts() {
        let lat = Lattice::cubic(0.35);
        assert_eq!(build_list(&lat, 1, None).len(), 26);
        // FCC: unmixed parity in [-1, 1]^3 -> the 8 (+-1 +-1 +-1) plus nothing even but 0
        let fcc = build_list(&lat, 1, Some(Extinction::Fcc));
        assert_eq!(fcc.len(), 8);
        assert!(fcc.iter().all(|p| p.miller_indices().iter().all(|i| i.abs() == 1)));
        // BCC: h + k + l even -> 110-type (12) and nothing else in [-1, 1]^3
        let bcc = build_list(&lat, 1, Some(Extinction::Bcc));
        assert_eq!(bcc.len(), 12);
        // Enumeration order starts at (-1 -1 -1)
        assert_eq!(build_list(&lat, 1, None)[0].miller_indices(), [-1, -1, -1]);
    }

    #[test]
    fn test_parse_extinction() {
        assert_eq!("FCC".parse::<Extinction>().unwrap(), Extinction::Fcc);
        assert!("hcp".parse::<Extinction>().is_err());
    }
}
