// SPDX-License-Identifier: Apache-2.0

//! Defensive decoders, one per query shape. Engine rows are untyped
//! records; field absence degrades to a default or a skipped entry,
//! never a panic.

use genograph_engine::Row;
use genograph_model::{Community, CommunityOutput, EdgeObservation, GeneNode};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

fn string_field(entry: &Value, field: &str) -> Option<String> {
    entry.get(field).and_then(Value::as_str).map(str::to_string)
}

fn f64_field(entry: &Value, field: &str) -> Option<f64> {
    entry.get(field).and_then(Value::as_f64)
}

/// Traversal rows carry a `genes` node array and a `links` edge array.
/// An empty result set decodes to empty output, matching the engine's
/// behavior for projections with no qualifying edges.
pub(crate) fn decode_interaction_rows(rows: &[Row]) -> (Vec<GeneNode>, Vec<EdgeObservation>) {
    let Some(first) = rows.first() else {
        return (Vec::new(), Vec::new());
    };

    let genes = first
        .get("genes")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let Some(id) = string_field(entry, "ID") else {
                        warn!("gene entry without ID skipped");
                        return None;
                    };
                    Some(GeneNode {
                        id,
                        name: string_field(entry, "Gene_name"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let links = first
        .get("links")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let (Some(gene1), Some(gene2)) =
                        (string_field(entry, "gene1"), string_field(entry, "gene2"))
                    else {
                        warn!("link entry without endpoints skipped");
                        return None;
                    };
                    Some(EdgeObservation {
                        gene1,
                        gene2,
                        interaction_type: string_field(entry, "interactionType")
                            .unwrap_or_else(|| "UNKNOWN".to_string()),
                        score: f64_field(entry, "score").unwrap_or(0.0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    (genes, links)
}

pub(crate) fn decode_clustering_coefficient(rows: &[Row]) -> f64 {
    rows.first()
        .and_then(|row| row.get("averageClusteringCoefficient"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

/// The expansion query returns exactly one row with a `geneIDs` list;
/// anything else means the query shape changed under us.
pub(crate) fn decode_expanded_gene_ids(rows: &[Row]) -> Option<Vec<String>> {
    let entries = rows.first()?.get("geneIDs")?.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

pub(crate) fn decode_community_rows(rows: &[Row]) -> CommunityOutput {
    let Some(first) = rows.first() else {
        return CommunityOutput {
            modularity: 0.0,
            communities: Vec::new(),
        };
    };

    let modularity = first
        .get("modularity")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    if let Some(entries) = first.get("community").and_then(Value::as_array) {
        for entry in entries {
            let Some(id) = string_field(entry, "ID") else {
                warn!("community entry without ID skipped");
                continue;
            };
            let community_id = entry
                .get("communityId")
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            grouped.entry(community_id).or_default().push(id);
        }
    }

    CommunityOutput {
        modularity,
        communities: grouped
            .into_iter()
            .map(|(community_id, genes)| Community {
                community_id,
                genes,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn interaction_rows_decode_and_skip_malformed_entries() {
        let rows = vec![row(json!({
            "genes": [
                {"ID": "g1", "Gene_name": "BRCA1"},
                {"Gene_name": "orphan"},
                {"ID": "g2"}
            ],
            "links": [
                {"gene1": "g1", "gene2": "g2", "interactionType": "PPI", "score": 0.9},
                {"gene1": "g1"},
                {"gene1": "g2", "gene2": "g1", "score": 0.4}
            ]
        }))];
        let (genes, links) = decode_interaction_rows(&rows);
        assert_eq!(genes.len(), 2);
        assert_eq!(genes[0].name.as_deref(), Some("BRCA1"));
        assert_eq!(genes[1].name, None);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].interaction_type, "UNKNOWN");
        assert_eq!(links[1].score, 0.4);
    }

    #[test]
    fn empty_result_set_decodes_to_empty_output() {
        let (genes, links) = decode_interaction_rows(&[]);
        assert!(genes.is_empty());
        assert!(links.is_empty());
        assert_eq!(decode_clustering_coefficient(&[]), 0.0);
    }

    #[test]
    fn community_rows_group_by_community_id() {
        let rows = vec![row(json!({
            "modularity": 0.734,
            "community": [
                {"ID": "g1", "communityId": 2},
                {"ID": "g2", "communityId": 1},
                {"ID": "g3", "communityId": 2}
            ]
        }))];
        let out = decode_community_rows(&rows);
        assert_eq!(out.modularity, 0.734);
        assert_eq!(out.communities.len(), 2);
        assert_eq!(out.communities[0].community_id, 1);
        assert_eq!(out.communities[1].genes, vec!["g1", "g3"]);
    }

    #[test]
    fn expansion_requires_the_gene_id_list() {
        assert!(decode_expanded_gene_ids(&[]).is_none());
        let rows = vec![row(json!({"geneIDs": ["g1", "g2"]}))];
        assert_eq!(
            decode_expanded_gene_ids(&rows),
            Some(vec!["g1".to_string(), "g2".to_string()])
        );
    }
}
