//! Inter-normal angles: experimental matrix and sorted theoretical table.

use rkyv::{Archive, Deserialize, Serialize};
use tracing::info;

use crate::crystal::HklPlane;
use crate::error::{LaueError, Result};
use crate::Vector3;

/// Angle between two directions in degrees. Inputs need not be normalized.
#[inline]
pub fn angle_between_deg(a: &Vector3, b: &Vector3) -> f64 {
    let cos = a.dot(b) / (a.norm() * b.norm());
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Upper-triangular matrix of angles (degrees) between experimental normals.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentalAngles {
    n: usize,
    angles: Vec<f64>,
}

impl ExperimentalAngles {
    pub fn new(normals: &[Vector3]) -> Self {
        let n = normals.len();
        let mut angles = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                angles[i * n + j] = angle_between_deg(&normals[i], &normals[j]);
            }
        }
        Self { n, angles }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Angle between normals `i` and `j`, with `i < j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < j && j < self.n);
        self.angles[i * self.n + j]
    }
}

/// One row of the theoretical table: the angle between two candidate planes.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct AngleTableEntry {
    /// Angle between the plane normals in degrees.
    pub angle_deg: f64,
    /// Index of the first plane in the candidate list.
    pub plane1: u32,
    /// Index of the second plane, always greater than `plane1`.
    pub plane2: u32,
}

/// Angles between every pair of candidate plane normals, sorted ascending.
///
/// Built once per candidate list and read-only afterwards. The Miller
/// indices of the planes are stored alongside so that a persisted table
/// can be checked against the list it is used with.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct AngleTable {
    pub entries: Vec<AngleTableEntry>,
    pub miller: Vec<[i32; 3]>,
}

impl AngleTable {
    pub fn build(planes: &[HklPlane]) -> Self {
        let normals: Vec<Vector3> = planes.iter().map(|p| p.normal()).collect();
        let n = normals.len();
        let mut entries = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                entries.push(AngleTableEntry {
                    angle_deg: angle_between_deg(&normals[i], &normals[j]),
                    plane1: i as u32,
                    plane2: j as u32,
                });
            }
        }
        // Stable: equal angles keep their (i, j) enumeration order
        entries.sort_by(|a, b| a.angle_deg.total_cmp(&b.angle_deg));
        Self {
            entries,
            miller: planes.iter().map(|p| p.miller_indices()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_planes(&self) -> usize {
        self.miller.len()
    }

    /// Row range of all entries with `|angle_deg − angle| < tol`, in table order.
    pub fn matches(&self, angle: f64, tol: f64) -> std::ops::Range<usize> {
        let lo = self.entries.partition_point(|e| e.angle_deg <= angle - tol);
        let hi = self.entries.partition_point(|e| e.angle_deg < angle + tol);
        lo..hi.max(lo)
    }

    /// Fail unless this table was built for exactly these planes.
    pub fn check_planes(&self, planes: &[HklPlane]) -> Result<()> {
        let same = self.miller.len() == planes.len()
            && self.miller.iter().zip(planes).all(|(m, p)| *m == p.miller_indices());
        if !same {
            return Err(LaueError::AngleTableMismatch {
                expected: self.miller.len(),
                found: planes.len(),
            });
        }
        Ok(())
    }

    /// Serialize the table with rkyv.
    pub fn to_rkyv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {}", e))?;
        Ok(bytes.to_vec())
    }

    /// Save the table to a file using rkyv.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let bytes = self.to_rkyv_bytes()?;
        std::fs::write(path, &bytes)?;
        info!("Saved angle table to {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    /// Load a table from an rkyv file.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let table = rkyv::from_bytes::<Self, rkyv::rancor::Error>(&bytes)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;
        info!(
            "Loaded angle table: {} planes, {} pairs",
            table.num_planes(),
            table.len()
        );
        Ok(table)
    }
}
