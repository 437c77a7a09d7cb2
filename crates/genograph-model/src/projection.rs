// SPDX-License-Identifier: Apache-2.0

use crate::ids::{ProjectionId, ValidationError};
use genograph_core::canonical;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const GENE_IDS_MAX: usize = 10_000;

/// How far the subgraph reaches from the seed genes before it is
/// materialized: only seed-to-seed edges, seeds plus direct neighbors,
/// or the neighborhood widened by one hop first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOrder {
    Zero,
    First,
    Second,
}

impl TraversalOrder {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

impl TryFrom<u8> for TraversalOrder {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Zero),
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(ValidationError(format!(
                "traversal order must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Relationship types are spliced into query text, so they must be
/// bare identifiers rather than arbitrary strings.
#[must_use]
pub fn valid_relationship_type(input: &str) -> bool {
    let mut chars = input.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One analysis request over the interaction network. Identical
/// requests must map to the same projection identity, so the identity
/// is a hash over the canonicalized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub gene_ids: Vec<String>,
    pub interaction_types: Vec<String>,
    pub min_score: f64,
    pub order: TraversalOrder,
}

impl ProjectionSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.gene_ids.is_empty() {
            return Err(ValidationError(
                "at least one gene id is required".to_string(),
            ));
        }
        if self.gene_ids.len() > GENE_IDS_MAX {
            return Err(ValidationError(format!(
                "gene id list exceeds max length {GENE_IDS_MAX}"
            )));
        }
        if self.gene_ids.iter().any(|g| g.trim().is_empty()) {
            return Err(ValidationError("gene ids must not be empty".to_string()));
        }
        if self.interaction_types.is_empty() {
            return Err(ValidationError(
                "at least one interaction type is required".to_string(),
            ));
        }
        for ty in &self.interaction_types {
            if !valid_relationship_type(ty) {
                return Err(ValidationError(format!(
                    "invalid interaction type identifier: {ty:?}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ValidationError(format!(
                "min score must be within 0.0..=1.0, got {}",
                self.min_score
            )));
        }
        Ok(())
    }

    /// Canonical form: sorted, deduplicated gene ids and interaction
    /// types. Two requests that differ only in list order share one
    /// projection.
    #[must_use]
    pub fn canonical(&self) -> Self {
        Self {
            gene_ids: canonical::stable_sort_dedup(
                self.gene_ids.iter().map(|g| g.trim().to_string()).collect(),
            ),
            interaction_types: canonical::stable_sort_dedup(self.interaction_types.clone()),
            min_score: self.min_score,
            order: self.order,
        }
    }

    #[must_use]
    pub fn identity(&self) -> ProjectionId {
        let canon = self.canonical();
        let payload = json!({
            "geneIds": canon.gene_ids,
            "interactionTypes": canon.interaction_types,
            "minScore": canon.min_score,
            "order": canon.order.as_u8(),
        });
        // Canonical JSON of a canonical spec cannot fail to serialize.
        let hash = canonical::stable_json_hash_hex(&payload)
            .unwrap_or_else(|_| genograph_core::sha256_hex(format!("{payload}").as_bytes()));
        ProjectionId::from_hash(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(genes: &[&str]) -> ProjectionSpec {
        ProjectionSpec {
            gene_ids: genes.iter().map(|g| g.to_string()).collect(),
            interaction_types: vec!["PPI".to_string()],
            min_score: 0.7,
            order: TraversalOrder::Zero,
        }
    }

    #[test]
    fn identity_is_stable_under_gene_order_and_duplication() {
        let a = spec(&["g1", "g2", "g3"]);
        let b = spec(&["g3", "g1", "g2", "g1"]);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn identity_distinguishes_filters() {
        let base = spec(&["g1", "g2"]);
        let mut other = base.clone();
        other.min_score = 0.8;
        assert_ne!(base.identity(), other.identity());

        let mut order = base.clone();
        order.order = TraversalOrder::First;
        assert_ne!(base.identity(), order.identity());

        let mut types = base.clone();
        types.interaction_types = vec!["COEXPRESSION".to_string()];
        assert_ne!(base.identity(), types.identity());
    }

    #[test]
    fn validate_rejects_bad_input() {
        assert!(spec(&[]).validate().is_err());

        let mut bad_score = spec(&["g1"]);
        bad_score.min_score = 1.5;
        assert!(bad_score.validate().is_err());

        let mut bad_type = spec(&["g1"]);
        bad_type.interaction_types = vec!["PPI; DROP".to_string()];
        assert!(bad_type.validate().is_err());

        assert!(spec(&["g1"]).validate().is_ok());
    }

    #[test]
    fn relationship_type_identifier_rules() {
        assert!(valid_relationship_type("PPI"));
        assert!(valid_relationship_type("CO_EXPRESSION2"));
        assert!(!valid_relationship_type(""));
        assert!(!valid_relationship_type("2PPI"));
        assert!(!valid_relationship_type("PPI|X"));
    }
}
