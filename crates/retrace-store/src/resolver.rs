// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Endpoint resolution: weighted primary selection, pinned lookups, and
//! per-endpoint client caching.
//!
//! Selection weight is `priority + 1`, so a priority-0 endpoint still
//! receives traffic and higher-priority endpoints receive proportionally
//! more. Secrets are stored by reference and resolved through the
//! [`SecretResolver`] seam at client-construction time only.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use retrace_core::RetraceError;
use retrace_storage::{Database, StorageEndpoint, queries::endpoints};
use tracing::debug;

use crate::client::EndpointClient;
use crate::sign::Credentials;

/// Resolves a stored secret reference to the secret material.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, secret_ref: &str) -> Result<String, RetraceError>;
}

/// Resolves secret references as environment variable names.
#[derive(Debug, Default)]
pub struct EnvSecretResolver;

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, secret_ref: &str) -> Result<String, RetraceError> {
        std::env::var(secret_ref).map_err(|_| {
            RetraceError::Config(format!("secret reference {secret_ref} is not set"))
        })
    }
}

/// Caches one [`EndpointClient`] per endpoint id and picks endpoints for
/// reads and writes.
pub struct EndpointResolver {
    db: Database,
    secrets: Arc<dyn SecretResolver>,
    http: reqwest::Client,
    clients: DashMap<String, EndpointClient>,
}

impl EndpointResolver {
    pub fn new(db: Database, secrets: Arc<dyn SecretResolver>) -> Self {
        Self {
            db,
            secrets,
            http: reqwest::Client::new(),
            clients: DashMap::new(),
        }
    }

    /// Pick the primary write target for a project by weighted random
    /// selection over its active non-shadow endpoints.
    pub async fn pick_primary(
        &self,
        project_id: &str,
    ) -> Result<(StorageEndpoint, EndpointClient), RetraceError> {
        let candidates = endpoints::primary_candidates(&self.db, project_id).await?;
        if candidates.is_empty() {
            return Err(RetraceError::Config(format!(
                "no active storage endpoint for project {project_id}"
            )));
        }
        let endpoint = weighted_pick(&candidates, &mut rand::thread_rng()).clone();
        debug!(endpoint_id = %endpoint.id, project_id, "selected primary endpoint");
        let client = self.client_for(&endpoint).await?;
        Ok((endpoint, client))
    }

    /// Resolve a pinned endpoint id to its client. Inactive endpoints are
    /// still resolvable: pinned reads must keep working after an endpoint
    /// is drained from the write pool.
    pub async fn by_id(
        &self,
        endpoint_id: &str,
    ) -> Result<(StorageEndpoint, EndpointClient), RetraceError> {
        let endpoint = endpoints::get_endpoint(&self.db, endpoint_id)
            .await?
            .ok_or_else(|| RetraceError::MissingDependency {
                entity: "storage endpoint",
                id: endpoint_id.to_string(),
            })?;
        let client = self.client_for(&endpoint).await?;
        Ok((endpoint, client))
    }

    /// All shadow replication targets visible to a project.
    pub async fn shadows(
        &self,
        project_id: &str,
    ) -> Result<Vec<(StorageEndpoint, EndpointClient)>, RetraceError> {
        let mut targets = Vec::new();
        for endpoint in endpoints::shadow_endpoints(&self.db, project_id).await? {
            let client = self.client_for(&endpoint).await?;
            targets.push((endpoint, client));
        }
        Ok(targets)
    }

    async fn client_for(&self, endpoint: &StorageEndpoint) -> Result<EndpointClient, RetraceError> {
        if let Some(cached) = self.clients.get(&endpoint.id) {
            return Ok(cached.clone());
        }
        let secret = self.secrets.resolve(&endpoint.secret_ref).await?;
        let client = EndpointClient::new(
            self.http.clone(),
            &endpoint.endpoint_url,
            &endpoint.bucket,
            &endpoint.region,
            Credentials {
                access_key_id: endpoint.access_key_id.clone(),
                secret_access_key: secret,
            },
        )?;
        self.clients.insert(endpoint.id.clone(), client.clone());
        Ok(client)
    }

    /// Every endpoint that may hold objects for a project: the primary
    /// write pool plus all shadow targets. Used by prefix purges, which
    /// must erase replicas too.
    pub async fn all_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<(StorageEndpoint, EndpointClient)>, RetraceError> {
        let mut targets = Vec::new();
        for endpoint in endpoints::primary_candidates(&self.db, project_id).await? {
            let client = self.client_for(&endpoint).await?;
            targets.push((endpoint, client));
        }
        targets.extend(self.shadows(project_id).await?);
        Ok(targets)
    }

    /// Resolve an endpoint's secret material (presigning needs it raw).
    pub async fn secret_for(&self, endpoint: &StorageEndpoint) -> Result<String, RetraceError> {
        self.secrets.resolve(&endpoint.secret_ref).await
    }

    /// Drop a cached client (credential rotation).
    pub fn evict(&self, endpoint_id: &str) {
        self.clients.remove(endpoint_id);
    }
}

/// Weighted random pick over endpoints; weight is `priority + 1`.
fn weighted_pick<'a, R: Rng>(
    candidates: &'a [StorageEndpoint],
    rng: &mut R,
) -> &'a StorageEndpoint {
    let total: i64 = candidates.iter().map(|e| e.priority.max(0) + 1).sum();
    let mut roll = rng.gen_range(0..total);
    for endpoint in candidates {
        roll -= endpoint.priority.max(0) + 1;
        if roll < 0 {
            return endpoint;
        }
    }
    // Unreachable while total covers every candidate.
    &candidates[candidates.len() - 1]
}
