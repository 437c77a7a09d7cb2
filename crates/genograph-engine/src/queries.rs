// SPDX-License-Identifier: Apache-2.0

//! Query constructors for the four engine-facing query shapes:
//! existence check, projection build, analysis, and drop. Relationship
//! types cannot be parameterized in the query language, so they are
//! validated as bare identifiers before being spliced; everything else
//! travels as a named parameter.

use crate::{EngineError, EngineErrorKind};
use genograph_model::{valid_relationship_type, TraversalOrder};

fn relationship_pattern(interaction_types: &[String]) -> Result<String, EngineError> {
    if interaction_types.is_empty() {
        return Err(EngineError::query("at least one relationship type required"));
    }
    for ty in interaction_types {
        if !valid_relationship_type(ty) {
            return Err(EngineError {
                kind: EngineErrorKind::Query,
                message: format!("invalid relationship type identifier: {ty:?}"),
            });
        }
    }
    Ok(interaction_types.join("|"))
}

#[must_use]
pub fn graph_exists_query() -> &'static str {
    "CALL gds.graph.exists($graphName) YIELD exists RETURN exists"
}

#[must_use]
pub fn projection_drop_query() -> &'static str {
    "CALL gds.graph.drop($graphName) YIELD graphName RETURN graphName"
}

/// Materializes the named projection. `Second`-order requests must be
/// widened to a `Zero`-order gene set first (see
/// [`first_order_expansion_query`]); only `Zero` and `First` reach the
/// engine.
pub fn projection_build_query(
    order: TraversalOrder,
    interaction_types: &[String],
) -> Result<String, EngineError> {
    let rel = relationship_pattern(interaction_types)?;
    match order {
        TraversalOrder::Zero => Ok(format!(
            "MATCH (g1:Gene)-[r:{rel}]->(g2:Gene)
             WHERE g1.ID IN $geneIDs AND g2.ID IN $geneIDs AND r.score >= $minScore
             WITH gds.graph.project($graphName, g1, g2, {{relationshipProperties: r {{ .score }}}}) AS g
             RETURN g.graphName AS graphName, g.nodeCount AS nodeCount, g.relationshipCount AS relationshipCount"
        )),
        TraversalOrder::First => Ok(format!(
            "MATCH (g1:Gene)-[r:{rel}]->(g2:Gene)
             WHERE g1.ID IN $geneIDs AND r.score >= $minScore
             WITH gds.graph.project($graphName, g1, g2, {{relationshipProperties: r {{ .score }}}}) AS g
             RETURN g.graphName AS graphName, g.nodeCount AS nodeCount, g.relationshipCount AS relationshipCount"
        )),
        TraversalOrder::Second => Err(EngineError::query(
            "second-order projections must be expanded to a zero-order gene set before building",
        )),
    }
}

/// Widens a seed gene set to its first-order neighborhood; the caller
/// re-issues the request as `Zero`-order over the widened set.
pub fn first_order_expansion_query(interaction_types: &[String]) -> Result<String, EngineError> {
    let rel = relationship_pattern(interaction_types)?;
    Ok(format!(
        "MATCH (g1:Gene)-[r:{rel}]->(g2:Gene)
         WHERE g1.ID IN $geneIDs AND r.score >= $minScore
         RETURN apoc.coll.toSet(COLLECT(g1.ID) + COLLECT(g2.ID)) AS geneIDs"
    ))
}

/// Streams the interaction edges among the requested genes together
/// with the gene nodes touched.
pub fn interaction_traversal_query(
    order: TraversalOrder,
    interaction_types: &[String],
) -> Result<String, EngineError> {
    let rel = relationship_pattern(interaction_types)?;
    match order {
        TraversalOrder::Zero => Ok(format!(
            "MATCH (g:Gene) WHERE g.ID IN $geneIDs
             WITH COLLECT(g) AS genes
             UNWIND genes AS g1
             MATCH (g1)-[r:{rel}]->(g2:Gene)
             WHERE r.score >= $minScore AND elementId(g1) < elementId(g2) AND g2.ID IN $geneIDs
             RETURN [g IN genes | {{ID: g.ID, Gene_name: g.Gene_name}}] AS genes,
                    COLLECT({{gene1: g1.ID, gene2: g2.ID, interactionType: type(r), score: r.score}}) AS links"
        )),
        TraversalOrder::First => Ok(format!(
            "MATCH (g1:Gene)-[r:{rel}]->(g2:Gene)
             WHERE g1.ID IN $geneIDs AND r.score >= $minScore
             WITH apoc.coll.toSet(COLLECT(g1) + COLLECT(g2)) AS genes,
                  COLLECT({{gene1: g1.ID, gene2: g2.ID, interactionType: type(r), score: r.score}}) AS links
             RETURN [g IN genes | {{ID: g.ID, Gene_name: g.Gene_name}}] AS genes, links"
        )),
        TraversalOrder::Second => Err(EngineError::query(
            "second-order traversals must be expanded to a zero-order gene set first",
        )),
    }
}

#[must_use]
pub fn clustering_coefficient_query() -> &'static str {
    "CALL gds.localClusteringCoefficient.stats($graphName)
     YIELD averageClusteringCoefficient
     RETURN averageClusteringCoefficient"
}

/// Community detection over the named projection. The community-size
/// floor and the weight toggle shape the call itself; resolution and
/// graph name stay parameters.
#[must_use]
pub fn community_detection_query(min_community_size: i64, weighted: bool) -> String {
    let weight_clause = if weighted {
        ", relationshipWeightProperty: 'score'"
    } else {
        ""
    };
    let floor = min_community_size.max(0);
    format!(
        "CALL gds.leiden.stats($graphName, {{gamma: $resolution, minCommunitySize: {floor}{weight_clause}}})
         YIELD modularity
         CALL gds.leiden.stream($graphName, {{gamma: $resolution, minCommunitySize: {floor}{weight_clause}}})
         YIELD nodeId, communityId
         WITH modularity, gds.util.asNode(nodeId) AS node, communityId
         RETURN modularity, COLLECT({{ID: node.ID, communityId: communityId}}) AS community"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn relationship_types_join_into_alternation() {
        let q = projection_build_query(TraversalOrder::Zero, &types(&["PPI", "COEXPRESSION"]))
            .expect("query");
        assert!(q.contains("[r:PPI|COEXPRESSION]"));
        assert!(q.contains("$graphName"));
        assert!(q.contains("$minScore"));
    }

    #[test]
    fn invalid_relationship_type_is_rejected() {
        let err = projection_build_query(TraversalOrder::Zero, &types(&["PPI) DROP"]))
            .expect_err("must reject");
        assert_eq!(err.kind, EngineErrorKind::Query);
    }

    #[test]
    fn second_order_build_is_rejected() {
        assert!(projection_build_query(TraversalOrder::Second, &types(&["PPI"])).is_err());
        assert!(interaction_traversal_query(TraversalOrder::Second, &types(&["PPI"])).is_err());
    }

    #[test]
    fn community_query_toggles_weight_property() {
        let weighted = community_detection_query(2, true);
        assert!(weighted.contains("relationshipWeightProperty"));
        let unweighted = community_detection_query(2, false);
        assert!(!unweighted.contains("relationshipWeightProperty"));
        assert!(unweighted.contains("minCommunitySize: 2"));
    }
}
