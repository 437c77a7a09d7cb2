#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "genograph-model";

mod analysis;
mod edges;
mod ids;
mod projection;

pub use analysis::{Community, CommunityOutput, CommunityParams, GeneNode, InteractionOutput};
pub use edges::{merge_edges_and_average_score, EdgeObservation, GeneInteraction};
pub use ids::{ProjectionId, SessionId, ValidationError};
pub use projection::{valid_relationship_type, ProjectionSpec, TraversalOrder};
