//! Orientation indexing of a Laue pattern from spot directions.
//!
//! # Pipeline
//!
//! 1. **Angles**: angles between every pair of experimental plane normals,
//!    and the sorted table of angles between every pair of candidate planes
//!    ([`angles`]).
//! 2. **Triplets**: every spot triplet whose three pairwise angles match
//!    three table rows built on exactly three planes is accepted, with the
//!    planes assigned to the spots ([`triplet`]).
//! 3. **Candidates**: each accepted triplet gives one orientation matrix,
//!    built from two of its spot/plane pairs and moved into the
//!    fundamental zone.
//! 4. **Polling**: candidates are clustered by misorientation and the most
//!    voted cluster(s) win ([`poll`]).
//!
//! Candidate lists should contain both `hkl` and `-h-k-l`: gnomonic spot
//! directions are the plane normals up to a sign.

pub mod angles;
pub mod poll;
pub mod triplet;

use std::time::Instant;

use tracing::{debug, info};

use crate::crystal::{HklPlane, Orientation, Symmetry};
use crate::error::Result;
use crate::{Matrix3, Vector3};

pub use angles::{AngleTable, ExperimentalAngles};
pub use poll::{confidence_index, poll_system, ConsensusCluster, PollResult};
pub use triplet::{identify_hkl_from_list, transformation_matrix, triplet_indexing, TripletMatch};

// ── Status ──────────────────────────────────────────────────────────────────

/// Outcome of an indexing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// At least one consensus orientation was found.
    Solved,
    /// No spot triplet matched the candidate planes.
    NoTriplet,
    /// Fewer than three spot directions were provided.
    TooFewSpots,
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Parameters controlling indexing.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Tolerance (degrees) between an experimental and a theoretical
    /// inter-normal angle. Default 0.5.
    pub tol_angle: f64,
    /// Misorientation (degrees) under which two candidates vote for the same
    /// orientation. Default 1.0.
    pub tol_disorientation: f64,
    /// Crystal symmetry used for the fundamental zone. Default cubic.
    pub symmetry: Symmetry,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            tol_angle: 0.5,
            tol_disorientation: 1.0,
            symmetry: Symmetry::Cubic,
        }
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Result of an indexing attempt.
///
/// A failed attempt is not an error: check `status` or `orientations`.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub status: IndexStatus,
    /// Orientations of the cluster(s) tied for the most votes.
    pub orientations: Vec<Orientation>,
    /// Vote count of the winning cluster(s).
    pub votes: usize,
    /// Confidence index in `[0, 1]`.
    pub confidence: f64,
    /// Number of accepted triplets (one candidate each, unless degenerate).
    pub num_triplets: usize,
    /// Per-candidate vote count of its cluster.
    pub vote_field: Vec<usize>,
    /// Fundamental-zone orientation candidates, in triplet order.
    pub candidates: Vec<Matrix3>,
    /// Wall-clock time spent indexing, in milliseconds.
    pub solve_time_ms: f32,
}

impl IndexResult {
    fn failure(status: IndexStatus, num_triplets: usize, solve_time_ms: f32) -> Self {
        Self {
            status,
            orientations: Vec::new(),
            votes: 0,
            confidence: 0.0,
            num_triplets,
            vote_field: Vec::new(),
            candidates: Vec::new(),
            solve_time_ms,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status == IndexStatus::Solved
    }
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Index a set of experimental plane-normal directions (lab frame).
///
/// Builds the angle table for `planes` and delegates to [`index_with_table`].
pub fn index(normals: &[Vector3], planes: &[HklPlane], config: &IndexConfig) -> Result<IndexResult> {
    let table = AngleTable::build(planes);
    debug!("Built angle table: {} planes, {} pairs", planes.len(), table.len());
    index_with_table(normals, planes, &table, config)
}

/// Index with a prebuilt angle table, e.g. one loaded from disk.
///
/// Fails only when `table` was not built for `planes`.
pub fn index_with_table(
    normals: &[Vector3],
    planes: &[HklPlane],
    table: &AngleTable,
    config: &IndexConfig,
) -> Result<IndexResult> {
    let t0 = Instant::now();
    table.check_planes(planes)?;

    if normals.len() < 3 {
        debug!("Only {} spot directions, nothing to index", normals.len());
        return Ok(IndexResult::failure(IndexStatus::TooFewSpots, 0, elapsed_ms(t0)));
    }

    // ── Step 1: triplet matching ──
    let angles = ExperimentalAngles::new(normals);
    let matches = triplet_indexing(normals, planes, &angles, table, config.tol_angle);

    // ── Step 2: one fundamental-zone candidate per triplet ──
    let candidates: Vec<Matrix3> = matches
        .iter()
        .filter_map(|m| {
            let [ti, tj, _] = m.spots;
            let [pi, pj, _] = m.planes;
            let g = transformation_matrix(&planes[pi], &planes[pj], &normals[ti], &normals[tj]);
            if g.is_none() {
                debug!("Triplet {:?}: parallel pair, no orientation", m.spots);
            }
            g.map(|g| config.symmetry.move_rotation_to_fz(&g))
        })
        .collect();

    if candidates.is_empty() {
        info!(
            "No orientation found from {} spots ({} triplets accepted)",
            normals.len(),
            matches.len()
        );
        return Ok(IndexResult::failure(IndexStatus::NoTriplet, matches.len(), elapsed_ms(t0)));
    }

    // ── Step 3: polling ──
    let poll = poll_system(&candidates, config.tol_disorientation);
    let orientations = poll
        .winners
        .iter()
        .map(|g| Orientation::from_matrix(*g))
        .collect::<Result<Vec<_>>>()?;

    let solve_time_ms = elapsed_ms(t0);
    info!(
        "Indexed {} spots: {} candidates, {} votes, CI {:.3}, {} solution(s) in {:.1} ms",
        normals.len(),
        candidates.len(),
        poll.max_votes,
        poll.confidence,
        orientations.len(),
        solve_time_ms
    );
    Ok(IndexResult {
        status: IndexStatus::Solved,
        orientations,
        votes: poll.max_votes,
        confidence: poll.confidence,
        num_triplets: matches.len(),
        vote_field: poll.vote_field,
        candidates,
        solve_time_ms,
    })
}

fn elapsed_ms(t0: Instant) -> f32 {
    t0.elapsed().as_secs_f32() * 1000.0
}
