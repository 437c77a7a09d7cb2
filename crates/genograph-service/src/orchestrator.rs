// SPDX-License-Identifier: Apache-2.0

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::lifecycle::{build_lock_key, ProjectionLifecycle};
use crate::rows;
use genograph_engine::{
    queries, AccessMode, EngineError, EngineErrorKind, Params, Row, SessionPool,
};
use genograph_model::{
    merge_edges_and_average_score, CommunityOutput, CommunityParams, InteractionOutput,
    ProjectionId, ProjectionSpec, SessionId, TraversalOrder,
};
use genograph_store::KeyStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which analysis to run against the resolved projection.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Analysis {
    InteractionTraversal,
    ClusteringCoefficient,
    CommunityDetection(CommunityParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub projection: ProjectionSpec,
    pub analysis: Analysis,
}

fn params_from(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Drives the lifecycle manager and the session pool end to end:
/// existence check, build-once, session bind, analysis query.
pub struct AnalysisService {
    lifecycle: Arc<ProjectionLifecycle>,
    pool: Arc<SessionPool>,
    store: Arc<dyn KeyStore>,
    cfg: ServiceConfig,
}

impl AnalysisService {
    #[must_use]
    pub fn new(
        lifecycle: Arc<ProjectionLifecycle>,
        pool: Arc<SessionPool>,
        store: Arc<dyn KeyStore>,
        cfg: ServiceConfig,
    ) -> Self {
        Self {
            lifecycle,
            pool,
            store,
            cfg,
        }
    }

    pub async fn bind_session(
        &self,
        session: &SessionId,
        projection: &ProjectionId,
    ) -> Result<(), ServiceError> {
        self.lifecycle.bind(session, projection).await
    }

    /// Consumer-facing entry point: raw rows for one analysis over the
    /// (possibly reused) projection the request identifies.
    pub async fn resolve(
        &self,
        request: &AnalysisRequest,
        session: &SessionId,
    ) -> Result<Vec<Row>, ServiceError> {
        let (id, effective) = self.prepare(&request.projection).await?;
        self.lifecycle.bind(session, &id).await?;

        let mut conn = self.pool.acquire(AccessMode::Read).await?;
        let rows = match &request.analysis {
            Analysis::InteractionTraversal => {
                let query = queries::interaction_traversal_query(
                    effective.order,
                    &effective.interaction_types,
                )?;
                conn.run(
                    &query,
                    params_from(json!({
                        "geneIDs": effective.gene_ids,
                        "minScore": effective.min_score,
                    })),
                )
                .await?
            }
            Analysis::ClusteringCoefficient => {
                conn.run(
                    queries::clustering_coefficient_query(),
                    params_from(json!({"graphName": id.as_str()})),
                )
                .await?
            }
            Analysis::CommunityDetection(params) => {
                let query =
                    queries::community_detection_query(params.min_community_size, params.weighted);
                conn.run(
                    &query,
                    params_from(json!({
                        "graphName": id.as_str(),
                        "resolution": params.resolution,
                    })),
                )
                .await?
            }
        };
        Ok(rows)
    }

    /// Interaction traversal with merged undirected edges and the
    /// projection-wide average clustering coefficient.
    pub async fn gene_interactions(
        &self,
        spec: &ProjectionSpec,
        session: &SessionId,
    ) -> Result<InteractionOutput, ServiceError> {
        let (id, effective) = self.prepare(spec).await?;
        self.lifecycle.bind(session, &id).await?;

        let mut conn = self.pool.acquire(AccessMode::Read).await?;
        let traversal =
            queries::interaction_traversal_query(effective.order, &effective.interaction_types)?;
        let traversal_rows = conn
            .run(
                &traversal,
                params_from(json!({
                    "geneIDs": effective.gene_ids,
                    "minScore": effective.min_score,
                })),
            )
            .await?;
        let (genes, observations) = rows::decode_interaction_rows(&traversal_rows);

        let coefficient_rows = conn
            .run(
                queries::clustering_coefficient_query(),
                params_from(json!({"graphName": id.as_str()})),
            )
            .await?;

        Ok(InteractionOutput {
            genes,
            links: merge_edges_and_average_score(&observations),
            average_clustering_coefficient: rows::decode_clustering_coefficient(&coefficient_rows),
        })
    }

    /// Community detection over the resolved projection.
    pub async fn community_detection(
        &self,
        spec: &ProjectionSpec,
        params: CommunityParams,
        session: &SessionId,
    ) -> Result<CommunityOutput, ServiceError> {
        let (id, _) = self.prepare(spec).await?;
        self.lifecycle.bind(session, &id).await?;

        let mut conn = self.pool.acquire(AccessMode::Read).await?;
        let query = queries::community_detection_query(params.min_community_size, params.weighted);
        let result_rows = conn
            .run(
                &query,
                params_from(json!({
                    "graphName": id.as_str(),
                    "resolution": params.resolution,
                })),
            )
            .await?;
        Ok(rows::decode_community_rows(&result_rows))
    }

    /// Validates the request, widens two-hop gene sets, and guarantees
    /// the projection is materialized before anyone binds to it.
    async fn prepare(
        &self,
        spec: &ProjectionSpec,
    ) -> Result<(ProjectionId, ProjectionSpec), ServiceError> {
        spec.validate()?;
        let id = spec.identity();
        let effective = self.widen_second_order(spec).await?;
        self.ensure_projection(&id, &effective).await?;
        Ok((id, effective))
    }

    /// Two-hop requests are widened to their first-order neighborhood
    /// and re-issued as zero-order over the widened gene set.
    async fn widen_second_order(
        &self,
        spec: &ProjectionSpec,
    ) -> Result<ProjectionSpec, ServiceError> {
        if spec.order != TraversalOrder::Second {
            return Ok(spec.clone());
        }
        let mut conn = self.pool.acquire(AccessMode::Read).await?;
        let query = queries::first_order_expansion_query(&spec.interaction_types)?;
        let result_rows = conn
            .run(
                &query,
                params_from(json!({
                    "geneIDs": spec.gene_ids,
                    "minScore": spec.min_score,
                })),
            )
            .await?;
        let widened = rows::decode_expanded_gene_ids(&result_rows).ok_or_else(|| {
            ServiceError::Connection(EngineError::query(
                "first-order expansion returned no gene id list",
            ))
        })?;
        debug!(
            seeds = spec.gene_ids.len(),
            widened = widened.len(),
            "second-order gene set widened"
        );
        Ok(ProjectionSpec {
            gene_ids: widened,
            order: TraversalOrder::Zero,
            ..spec.clone()
        })
    }

    /// Build-once guard: a set-if-absent lock key admits one builder
    /// per identity; losers poll the existence check instead of
    /// issuing a duplicate build.
    async fn ensure_projection(
        &self,
        id: &ProjectionId,
        effective: &ProjectionSpec,
    ) -> Result<(), ServiceError> {
        let lock_key = build_lock_key(id);
        for attempt in 0..self.cfg.build_wait_attempts {
            if self.lifecycle.exists(id).await? {
                if attempt > 0 {
                    debug!(projection = %id, attempt, "projection appeared while waiting");
                }
                return Ok(());
            }
            if self
                .store
                .set_if_absent(&lock_key, "1", self.cfg.build_lock_ttl_secs)
                .await?
            {
                let result = self.build_projection(id, effective).await;
                if let Err(err) = self.store.delete(&lock_key).await {
                    warn!(projection = %id, "build lock release failed: {err}");
                }
                return result;
            }
            tokio::time::sleep(self.cfg.build_poll_interval).await;
        }
        Err(ServiceError::BuildConflict(format!(
            "projection {id} was being built elsewhere and did not appear within the poll budget"
        )))
    }

    /// Runs the build query on a write session. Nothing is registered
    /// unless the build succeeded.
    async fn build_projection(
        &self,
        id: &ProjectionId,
        effective: &ProjectionSpec,
    ) -> Result<(), ServiceError> {
        let query = queries::projection_build_query(effective.order, &effective.interaction_types)
            .map_err(|e| ServiceError::BuildFailed(e.message))?;
        let mut conn = self.pool.acquire(AccessMode::Write).await?;
        let outcome = conn
            .run(
                &query,
                params_from(json!({
                    "graphName": id.as_str(),
                    "geneIDs": effective.gene_ids,
                    "minScore": effective.min_score,
                })),
            )
            .await;
        match outcome {
            Ok(_) => {
                self.lifecycle
                    .register_built(id, self.cfg.projection_ttl_secs)
                    .await?;
                info!(projection = %id, "projection built");
                Ok(())
            }
            Err(err) if matches!(err.kind, EngineErrorKind::Connection) => {
                Err(ServiceError::Connection(err))
            }
            Err(err) => Err(ServiceError::BuildFailed(err.message)),
        }
    }
}
