//! Greedy consensus voting over orientation candidates.

use tracing::debug;

use crate::crystal::Orientation;
use crate::Matrix3;

/// One consensus cluster, represented by the first candidate that opened it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusCluster {
    /// Index of the seed candidate in the input list.
    pub seed: usize,
    /// Number of candidates absorbed, the seed included.
    pub votes: usize,
    /// Input indices of the absorbed candidates, in input order.
    pub members: Vec<usize>,
}

/// Outcome of [`poll_system`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    /// Seed matrices of every cluster tied at `max_votes`, in cluster order.
    pub winners: Vec<Matrix3>,
    /// Vote count of the best cluster (0 for an empty input).
    pub max_votes: usize,
    /// `(votes[1st] − votes[2nd]) / total`, in `[0, 1]`.
    pub confidence: f64,
    /// For each input candidate, the vote count of the cluster it joined.
    pub vote_field: Vec<usize>,
    pub clusters: Vec<ConsensusCluster>,
}

/// Cluster orientation candidates by misorientation angle.
///
/// Candidates are visited in input order and compared against the existing
/// seeds in creation order. A candidate joins the first seed whose
/// misorientation `g · seedᵀ` is within `tol_deg`, or opens a new cluster.
/// The candidates are expected in the fundamental zone already; no
/// symmetry is applied here. The result depends on the input order.
pub fn poll_system(candidates: &[Matrix3], tol_deg: f64) -> PollResult {
    let tol_rad = tol_deg.to_radians();
    let mut clusters: Vec<ConsensusCluster> = Vec::new();
    let mut membership = Vec::with_capacity(candidates.len());

    for (i, g) in candidates.iter().enumerate() {
        let joined = clusters.iter().position(|c| {
            let delta = g * candidates[c.seed].transpose();
            Orientation::misorientation_angle_from_delta(&delta) <= tol_rad
        });
        match joined {
            Some(j) => {
                clusters[j].votes += 1;
                clusters[j].members.push(i);
                membership.push(j);
            }
            None => {
                membership.push(clusters.len());
                clusters.push(ConsensusCluster {
                    seed: i,
                    votes: 1,
                    members: vec![i],
                });
            }
        }
    }

    let votes: Vec<usize> = clusters.iter().map(|c| c.votes).collect();
    let max_votes = votes.iter().copied().max().unwrap_or(0);
    let winners = clusters
        .iter()
        .filter(|c| c.votes == max_votes)
        .map(|c| candidates[c.seed])
        .collect::<Vec<_>>();
    let confidence = confidence_index(&votes);
    let vote_field = membership.iter().map(|&j| clusters[j].votes).collect();

    debug!(
        "Polled {} candidates into {} clusters: max votes {max_votes}, {} winner(s), CI {confidence:.3}",
        candidates.len(),
        clusters.len(),
        winners.len()
    );
    PollResult {
        winners,
        max_votes,
        confidence,
        vote_field,
        clusters,
    }
}

/// Normalized vote margin between the two best clusters.
///
/// Computed on a sorted copy; the runner-up counts as 0 when a single
/// cluster exists. Returns 0 when there are no votes.
pub fn confidence_index(votes: &[usize]) -> f64 {
    let total: usize = votes.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mut sorted = votes.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let first = sorted[0];
    let second = sorted.get(1).copied().unwrap_or(0);
    (first - second) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rot(phi1: f64, phi: f64, phi2: f64) -> Matrix3 {
        Orientation::from_euler(phi1, phi, phi2).orientation_matrix()
    }

    #[test]
    fn test_identical_candidates() {
        let g = rot(10.0, 20.0, 30.0);
        let result = poll_system(&[g; 5], 1.0);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.max_votes, 5);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.winners, vec![g]);
        assert_eq!(result.vote_field, vec![5; 5]);
    }

    #[test]
    fn test_greedy_clustering() {
        let a = rot(10.0, 20.0, 30.0);
        let a2 = rot(10.3, 20.0, 30.0);
        let b = rot(40.0, 20.0, 30.0);
        let result = poll_system(&[a, b, a2, a, b], 1.0);
        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].members, vec![0, 2, 3]);
        assert_eq!(result.clusters[1].members, vec![1, 4]);
        assert_eq!(result.max_votes, 3);
        assert_eq!(result.winners, vec![a]);
        assert!((result.confidence - 0.2).abs() < 1e-12);
        assert_eq!(result.vote_field, vec![3, 2, 3, 3, 2]);
    }

    #[test]
    fn test_tie_returns_all_winners() {
        let a = rot(10.0, 20.0, 30.0);
        let b = rot(40.0, 20.0, 30.0);
        let result = poll_system(&[a, b, b, a], 1.0);
        assert_eq!(result.winners, vec![a, b]);
        assert_eq!(result.max_votes, 2);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_polling_is_idempotent() {
        let list: Vec<Matrix3> = (0..12)
            .map(|i| rot(10.0 + (i % 4) as f64 * 0.4, 20.0, 30.0 + (i % 3) as f64 * 15.0))
            .collect();
        assert_eq!(poll_system(&list, 1.0), poll_system(&list, 1.0));
    }

    #[test]
    fn test_empty_input() {
        let result = poll_system(&[], 1.0);
        assert!(result.winners.is_empty());
        assert_eq!(result.max_votes, 0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.vote_field.is_empty());
    }

    #[test]
    fn test_confidence_index() {
        assert_eq!(confidence_index(&[]), 0.0);
        assert_eq!(confidence_index(&[4]), 1.0);
        assert!((confidence_index(&[1, 6, 3]) - 0.3).abs() < 1e-12);
        let votes = vec![2, 5, 5];
        assert_eq!(confidence_index(&votes), 0.0);
        assert_eq!(votes, vec![2, 5, 5]);
    }
}
