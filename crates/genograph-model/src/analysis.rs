// SPDX-License-Identifier: Apache-2.0

use crate::edges::GeneInteraction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Result of the interaction-traversal analysis: the genes touched,
/// the merged undirected edges, and the projection-wide average
/// clustering coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOutput {
    pub genes: Vec<GeneNode>,
    pub links: Vec<GeneInteraction>,
    pub average_clustering_coefficient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommunityParams {
    pub resolution: f64,
    pub weighted: bool,
    pub min_community_size: i64,
}

impl Default for CommunityParams {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            weighted: false,
            min_community_size: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub community_id: i64,
    pub genes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityOutput {
    pub modularity: f64,
    pub communities: Vec<Community>,
}
