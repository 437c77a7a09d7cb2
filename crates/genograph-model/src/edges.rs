// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One directed relationship observation as returned by the traversal
/// query. Several observations between the same endpoints (one per
/// relationship type, or the reverse direction) merge into a single
/// undirected [`GeneInteraction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeObservation {
    pub gene1: String,
    pub gene2: String,
    pub interaction_type: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneInteraction {
    pub gene1: String,
    pub gene2: String,
    pub score: f64,
    pub type_scores: BTreeMap<String, f64>,
}

struct MergeAcc {
    total_score: f64,
    count: u32,
    type_scores: BTreeMap<String, f64>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Merges duplicate observations per unordered endpoint pair into one
/// edge with the arithmetic-mean score (2 decimals) and a per-type
/// score breakdown (last observation per type wins). No edge is ever
/// dropped; output order is deterministic by pair key.
#[must_use]
pub fn merge_edges_and_average_score(observations: &[EdgeObservation]) -> Vec<GeneInteraction> {
    let mut merged: BTreeMap<(String, String), MergeAcc> = BTreeMap::new();

    for obs in observations {
        let key = if obs.gene1 <= obs.gene2 {
            (obs.gene1.clone(), obs.gene2.clone())
        } else {
            (obs.gene2.clone(), obs.gene1.clone())
        };
        let entry = merged.entry(key).or_insert_with(|| MergeAcc {
            total_score: 0.0,
            count: 0,
            type_scores: BTreeMap::new(),
        });
        entry.total_score += obs.score;
        entry.count += 1;
        entry
            .type_scores
            .insert(obs.interaction_type.clone(), obs.score);
    }

    merged
        .into_iter()
        .map(|((gene1, gene2), acc)| GeneInteraction {
            gene1,
            gene2,
            score: round2(acc.total_score / f64::from(acc.count)),
            type_scores: acc.type_scores,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(g1: &str, g2: &str, ty: &str, score: f64) -> EdgeObservation {
        EdgeObservation {
            gene1: g1.to_string(),
            gene2: g2.to_string(),
            interaction_type: ty.to_string(),
            score,
        }
    }

    #[test]
    fn opposite_directions_merge_into_one_edge() {
        let out = merge_edges_and_average_score(&[obs("A", "B", "X", 10.0), obs("B", "A", "Y", 20.0)]);
        assert_eq!(out.len(), 1);
        let edge = &out[0];
        assert_eq!(edge.gene1, "A");
        assert_eq!(edge.gene2, "B");
        assert_eq!(edge.score, 15.0);
        assert_eq!(edge.type_scores.get("X"), Some(&10.0));
        assert_eq!(edge.type_scores.get("Y"), Some(&20.0));
    }

    #[test]
    fn single_observation_passes_through() {
        let out = merge_edges_and_average_score(&[obs("A", "B", "X", 0.42)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, 0.42);
        assert_eq!(out[0].type_scores.len(), 1);
    }

    #[test]
    fn mean_is_rounded_to_two_decimals() {
        let out = merge_edges_and_average_score(&[
            obs("A", "B", "X", 0.333),
            obs("A", "B", "Y", 0.333),
            obs("A", "B", "Z", 0.334),
        ]);
        assert_eq!(out[0].score, 0.33);
    }

    #[test]
    fn last_seen_score_wins_per_type() {
        let out = merge_edges_and_average_score(&[obs("A", "B", "X", 0.2), obs("B", "A", "X", 0.8)]);
        assert_eq!(out[0].type_scores.get("X"), Some(&0.8));
        assert_eq!(out[0].score, 0.5);
    }

    #[test]
    fn distinct_pairs_stay_distinct() {
        let out = merge_edges_and_average_score(&[
            obs("A", "B", "X", 1.0),
            obs("A", "C", "X", 1.0),
            obs("C", "A", "Y", 0.0),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].gene1, "A");
        assert_eq!(out[0].gene2, "B");
        assert_eq!(out[1].gene1, "A");
        assert_eq!(out[1].gene2, "C");
        assert_eq!(out[1].score, 0.5);
    }
}
