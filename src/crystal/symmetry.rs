//! Crystal symmetry classes and fundamental-zone reduction.

use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::LaueError;
use crate::Matrix3;

/// Crystal structure tag used to pick the set of proper symmetry rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Symmetry {
    #[default]
    Cubic,
    Hexagonal,
    Tetragonal,
    Orthorhombic,
    Triclinic,
}

impl FromStr for Symmetry {
    type Err = LaueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cubic" => Ok(Self::Cubic),
            "hexagonal" => Ok(Self::Hexagonal),
            "tetragonal" => Ok(Self::Tetragonal),
            "orthorhombic" => Ok(Self::Orthorhombic),
            "triclinic" => Ok(Self::Triclinic),
            _ => Err(LaueError::UnsupportedSymmetry(s.to_string())),
        }
    }
}

impl std::fmt::Display for Symmetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cubic => "cubic",
            Self::Hexagonal => "hexagonal",
            Self::Tetragonal => "tetragonal",
            Self::Orthorhombic => "orthorhombic",
            Self::Triclinic => "triclinic",
        };
        f.write_str(name)
    }
}

impl Symmetry {
    /// Proper rotations of the Laue group, identity first.
    ///
    /// Cubic: 24, hexagonal: 12, tetragonal: 8, orthorhombic: 4, triclinic: 1.
    pub fn symmetry_operators(&self) -> Vec<Matrix3> {
        match self {
            Self::Cubic => signed_permutations(|_| true),
            // Permutations that leave z in place
            Self::Tetragonal => signed_permutations(|perm| perm[2] == 2),
            Self::Orthorhombic => signed_permutations(|perm| *perm == [0, 1, 2]),
            Self::Hexagonal => hexagonal_operators(),
            Self::Triclinic => vec![Matrix3::identity()],
        }
    }

    /// Bring an orientation matrix into the fundamental zone.
    ///
    /// Every operator `o` is applied on the crystal side (`o·g`) and the
    /// equivalent with the smallest rotation angle is returned. The first
    /// operator wins on ties, so the identity is kept when `g` is already
    /// in the zone.
    pub fn move_rotation_to_fz(&self, g: &Matrix3) -> Matrix3 {
        let mut best = *g;
        let mut best_angle = f64::INFINITY;
        for op in self.symmetry_operators() {
            let candidate = op * g;
            let angle = rotation_angle(&candidate);
            if angle < best_angle {
                best_angle = angle;
                best = candidate;
            }
        }
        best
    }
}

/// Rotation angle (radians) of a proper rotation matrix.
#[inline]
pub fn rotation_angle(g: &Matrix3) -> f64 {
    (0.5 * (g.trace() - 1.0)).clamp(-1.0, 1.0).acos()
}

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [1, 2, 0],
    [2, 0, 1],
    [0, 2, 1],
    [2, 1, 0],
    [1, 0, 2],
];

/// Signed permutation matrices with determinant +1 whose permutation passes `keep`.
fn signed_permutations(keep: impl Fn(&[usize; 3]) -> bool) -> Vec<Matrix3> {
    let mut ops = Vec::new();
    for perm in PERMUTATIONS.iter().filter(|p| keep(p)) {
        for signs in 0..8u8 {
            let mut m = Matrix3::zeros();
            for (row, &col) in perm.iter().enumerate() {
                m[(row, col)] = if signs & (1 << row) != 0 { -1.0 } else { 1.0 };
            }
            if m.determinant() > 0.0 {
                ops.push(m);
            }
        }
    }
    ops
}

fn hexagonal_operators() -> Vec<Matrix3> {
    let mut ops = Vec::with_capacity(12);
    // Six-fold axis along z
    for k in 0..6 {
        let (s, c) = (k as f64 * PI / 3.0).sin_cos();
        ops.push(Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0));
    }
    // Two-fold axes in the basal plane, every 30 degrees
    for k in 0..6 {
        let (s, c) = (k as f64 * PI / 3.0).sin_cos();
        ops.push(Matrix3::new(c, s, 0.0, s, -c, 0.0, 0.0, 0.0, -1.0));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_proper_rotation(m: &Matrix3) -> bool {
        (m * m.transpose() - Matrix3::identity()).abs().max() < 1e-12
            && (m.determinant() - 1.0).abs() < 1e-12
    }

    #[test]
    fn test_operator_counts() {
        assert_eq!(Symmetry::Cubic.symmetry_operators().len(), 24);
        assert_eq!(Symmetry::Hexagonal.symmetry_operators().len(), 12);
        assert_eq!(Symmetry::Tetragonal.symmetry_operators().len(), 8);
        assert_eq!(Symmetry::Orthorhombic.symmetry_operators().len(), 4);
        assert_eq!(Symmetry::Triclinic.symmetry_operators().len(), 1);
    }

    #[test]
    fn test_operators_are_rotations_identity_first() {
        for sym in [
            Symmetry::Cubic,
            Symmetry::Hexagonal,
            Symmetry::Tetragonal,
            Symmetry::Orthorhombic,
            Symmetry::Triclinic,
        ] {
            let ops = sym.symmetry_operators();
            assert_eq!(ops[0], Matrix3::identity(), "{sym}: identity must come first");
            for op in &ops {
                assert!(is_proper_rotation(op), "{sym}: {op} is not a rotation");
            }
            // Group closure: product of any two operators is in the set
            for a in &ops {
                for b in &ops {
                    let p = a * b;
                    assert!(
                        ops.iter().any(|o| (o - p).abs().max() < 1e-9),
                        "{sym}: set not closed"
                    );
                }
            }
        }
    }

    #[test]
    fn test_fz_reduction_picks_smallest_angle() {
        // 90 degree rotation about z is equivalent to identity in cubic symmetry
        let g = Matrix3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let fz = Symmetry::Cubic.move_rotation_to_fz(&g);
        assert!(rotation_angle(&fz) < 1e-12);
        // ... but not in orthorhombic symmetry
        let fz = Symmetry::Orthorhombic.move_rotation_to_fz(&g);
        assert!((rotation_angle(&fz) - PI / 2.0).abs() < 1e-12);
        // Pure function: the input is left untouched
        assert_eq!(g[(0, 1)], 1.0);
    }

    #[test]
    fn test_fz_keeps_matrix_already_in_zone() {
        let (s, c) = 0.1f64.sin_cos();
        let g = Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(Symmetry::Cubic.move_rotation_to_fz(&g), g);
    }

    #[test]
    fn test_parse_symmetry() {
        assert_eq!("Cubic".parse::<Symmetry>().unwrap(), Symmetry::Cubic);
        assert_eq!(" hexagonal ".parse::<Symmetry>().unwrap(), Symmetry::Hexagonal);
        let err = "monoclinic".parse::<Symmetry>().unwrap_err();
        assert!(matches!(err, LaueError::UnsupportedSymmetry(ref s) if s == "monoclinic"));
    }
}
