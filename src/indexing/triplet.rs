//! Triplet matching between experimental spots and candidate planes.

use tracing::{debug, trace};

use super::angles::{AngleTable, ExperimentalAngles};
use crate::crystal::HklPlane;
use crate::{Matrix3, Vector3};

/// Below this |det| three directions are treated as coplanar and the
/// handedness test is skipped.
const COPLANAR_EPS: f64 = 1e-6;

/// Below this norm two directions are treated as parallel.
const PARALLEL_EPS: f64 = 1e-9;

/// Three experimental spots matched to three distinct candidate planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripletMatch {
    /// Spot indices `(ti, tj, tk)`, `ti < tj < tk`.
    pub spots: [usize; 3],
    /// Plane index assigned to each spot of `spots`.
    pub planes: [usize; 3],
    /// Table rows matched by the pairs `(ti, tj)`, `(tj, tk)` and `(ti, tk)`.
    pub rows: [usize; 3],
}

/// Assign plane indices to spots from the six plane indices of a triplet.
///
/// `list` holds the planes of the pairs `(ti, tj)`, `(tj, tk)` and `(ti, tk)`,
/// two per pair. The plane shared by the first two pairs belongs to `tj`.
/// Returns the planes of `[tj, tk, ti]`, or `None` when the first two pairs
/// share no plane.
pub fn identify_hkl_from_list(list: &[usize; 6]) -> Option<[usize; 3]> {
    let ids = if list[1] == list[2] {
        [1, 3, 0]
    } else if list[1] == list[3] {
        [1, 2, 0]
    } else if list[0] == list[2] {
        [0, 3, 1]
    } else if list[0] == list[3] {
        [0, 2, 1]
    } else {
        return None;
    };
    Some(ids.map(|i| list[i]))
}

/// True if the six indices hold exactly three distinct planes, each twice.
fn is_real_triplet(list: &[usize; 6]) -> bool {
    let mut sorted = *list;
    sorted.sort_unstable();
    sorted[0] == sorted[1]
        && sorted[2] == sorted[3]
        && sorted[4] == sorted[5]
        && sorted[1] != sorted[2]
        && sorted[3] != sorted[4]
}

#[inline]
fn triple_product(a: &Vector3, b: &Vector3, c: &Vector3) -> f64 {
    a.dot(&b.cross(c))
}

/// Match every spot triplet against the theoretical angle table.
///
/// Triplets are enumerated lexicographically over `ti < tj < tk`; within a
/// triplet, the table rows of the three pairs are combined as a nested
/// cross product in table order. A combination is kept when it references
/// exactly three planes, each twice, when a pivot plane identifies which
/// plane goes to which spot, and when the assignment does not mirror the
/// spots (a rotation cannot change handedness).
pub fn triplet_indexing(
    normals: &[Vector3],
    planes: &[HklPlane],
    angles: &ExperimentalAngles,
    table: &AngleTable,
    tol: f64,
) -> Vec<TripletMatch> {
    let n = normals.len();
    let plane_normals: Vec<Vector3> = planes.iter().map(|p| p.normal()).collect();
    let mut matches = Vec::new();
    let mut num_triplets = 0usize;

    for ti in 0..n.saturating_sub(2) {
        for tj in (ti + 1)..n.saturating_sub(1) {
            for tk in (tj + 1)..n {
                num_triplets += 1;
                let pairs = [(ti, tj), (tj, tk), (ti, tk)];
                let [ri, rj, rk] = pairs.map(|(i, j)| table.matches(angles.get(i, j), tol));
                trace!(
                    "Triplet ({ti}, {tj}, {tk}): {} x {} x {} candidate rows",
                    ri.len(),
                    rj.len(),
                    rk.len()
                );

                let spot_det = triple_product(&normals[ti], &normals[tj], &normals[tk]);
                for ci in ri.clone() {
                    for cj in rj.clone() {
                        for ck in rk.clone() {
                            let (ei, ej, ek) = (&table.entries[ci], &table.entries[cj], &table.entries[ck]);
                            let list = [
                                ei.plane1 as usize,
                                ei.plane2 as usize,
                                ej.plane1 as usize,
                                ej.plane2 as usize,
                                ek.plane1 as usize,
                                ek.plane2 as usize,
                            ];
                            if !is_real_triplet(&list) {
                                continue;
                            }
                            let Some([pj, pk, pi]) = identify_hkl_from_list(&list) else {
                                debug!("Rows {ci}, {cj}, {ck}: no consistent pivot plane, skipped");
                                continue;
                            };
                            let plane_det =
                                triple_product(&plane_normals[pi], &plane_normals[pj], &plane_normals[pk]);
                            if spot_det.abs() > COPLANAR_EPS
                                && plane_det.abs() > COPLANAR_EPS
                                && spot_det.signum() != plane_det.signum()
                            {
                                trace!("Rows {ci}, {cj}, {ck}: mirrored assignment, skipped");
                                continue;
                            }
                            matches.push(TripletMatch {
                                spots: [ti, tj, tk],
                                planes: [pi, pj, pk],
                                rows: [ci, cj, ck],
                            });
                        }
                    }
                }
            }
        }
    }
    debug!("{} matches from {num_triplets} triplets", matches.len());
    matches
}

/// Orientation matrix mapping two lab directions onto two crystal plane normals.
///
/// Builds the right-handed frames `(e1, e2, e3)` with `e1 = n1`,
/// `e2 = n1 × n2 / |n1 × n2|`, `e3 = e1 × e2` in both the crystal and lab
/// frames and returns `e_cᵀ · e_lab`. `None` if either pair is parallel.
pub fn transformation_matrix(
    plane1: &HklPlane,
    plane2: &HklPlane,
    normal1: &Vector3,
    normal2: &Vector3,
) -> Option<Matrix3> {
    let e_c = local_frame(&plane1.normal(), &plane2.normal())?;
    let e_lab = local_frame(&normal1.normalize(), &normal2.normalize())?;
    Some(e_c.transpose() * e_lab)
}

/// Rows are the unit vectors of the frame attached to `(n1, n2)`.
fn local_frame(n1: &Vector3, n2: &Vector3) -> Option<Matrix3> {
    let e2 = n1.cross(n2).try_normalize(PARALLEL_EPS)?;
    let e3 = n1.cross(&e2);
    Some(Matrix3::from_rows(&[n1.transpose(), e2.transpose(), e3.transpose()]))
}
