// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The [`ObjectStore`] implementation over the endpoint catalog.
//!
//! Writes go to one weighted-selected primary and are replicated to shadow
//! endpoints in the background; a shadow failure is logged and never fails
//! the upload. Reads are pinned to the endpoint recorded on the artifact.
//! In single-tenant mode the catalog is bypassed entirely and one
//! configured endpoint serves everything.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use retrace_config::ObjectStoreConfig;
use retrace_core::traits::{ObjectStore, UploadReceipt};
use retrace_core::types::ArtifactKind;
use retrace_core::RetraceError;
use retrace_storage::StorageEndpoint;
use tracing::{debug, warn};

use crate::client::EndpointClient;
use crate::keys;
use crate::resolver::EndpointResolver;
use crate::sign::{self, Credentials};

/// How long presigned download links stay valid.
const PRESIGN_TTL_SECS: u64 = 3600;

pub struct ArtifactStore {
    resolver: Arc<EndpointResolver>,
    /// Set in single-tenant mode; bypasses the catalog.
    fixed: Option<FixedEndpoint>,
}

struct FixedEndpoint {
    endpoint: StorageEndpoint,
    client: EndpointClient,
    secret_access_key: String,
}

impl ArtifactStore {
    pub fn new(resolver: Arc<EndpointResolver>) -> Self {
        Self {
            resolver,
            fixed: None,
        }
    }

    /// Build a store in single-tenant mode from the service configuration.
    pub fn single_tenant(
        resolver: Arc<EndpointResolver>,
        config: &ObjectStoreConfig,
    ) -> Result<Self, RetraceError> {
        let endpoint_url = config
            .endpoint_url
            .as_deref()
            .ok_or_else(|| RetraceError::Config("single_tenant requires endpoint_url".into()))?;
        let bucket = config
            .bucket
            .as_deref()
            .ok_or_else(|| RetraceError::Config("single_tenant requires bucket".into()))?;
        let access_key_id = config
            .access_key_id
            .clone()
            .ok_or_else(|| RetraceError::Config("single_tenant requires access_key_id".into()))?;
        let secret = config
            .secret_access_key
            .clone()
            .ok_or_else(|| RetraceError::Config("single_tenant requires secret_access_key".into()))?;

        let client = EndpointClient::new(
            reqwest::Client::new(),
            endpoint_url,
            bucket,
            &config.region,
            Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret.clone(),
            },
        )?;
        let endpoint = StorageEndpoint {
            id: "config".to_string(),
            project_id: None,
            endpoint_url: endpoint_url.to_string(),
            bucket: bucket.to_string(),
            region: config.region.clone(),
            access_key_id,
            secret_ref: String::new(),
            public_url: config.public_endpoint_url.clone(),
            priority: 0,
            active: true,
            shadow: false,
        };
        Ok(Self {
            resolver,
            fixed: Some(FixedEndpoint {
                endpoint,
                client,
                secret_access_key: secret,
            }),
        })
    }

    async fn primary_for(
        &self,
        project_id: &str,
    ) -> Result<(StorageEndpoint, EndpointClient), RetraceError> {
        if let Some(fixed) = &self.fixed {
            return Ok((fixed.endpoint.clone(), fixed.client.clone()));
        }
        self.resolver.pick_primary(project_id).await
    }

    /// Replicate `key` to the project's shadow endpoints. Runs detached;
    /// failures are logged and swallowed.
    fn replicate_to_shadows(&self, project_id: &str, key: &str, body: Vec<u8>) {
        if self.fixed.is_some() {
            return;
        }
        let resolver = Arc::clone(&self.resolver);
        let project_id = project_id.to_string();
        let key = key.to_string();
        tokio::spawn(async move {
            let shadows = match resolver.shadows(&project_id).await {
                Ok(shadows) => shadows,
                Err(e) => {
                    warn!(project_id, error = %e, "shadow lookup failed, skipping replication");
                    return;
                }
            };
            for (endpoint, client) in shadows {
                if let Err(e) = client.put_object(&key, body.clone()).await {
                    warn!(
                        endpoint_id = %endpoint.id,
                        key,
                        error = %e,
                        "shadow replication failed"
                    );
                } else {
                    counter!("retrace_artifacts_replicated").increment(1);
                    debug!(endpoint_id = %endpoint.id, key, "shadow replica written");
                }
            }
        });
    }
}

#[async_trait]
impl ObjectStore for ArtifactStore {
    async fn upload(
        &self,
        project_id: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<UploadReceipt, RetraceError> {
        let (endpoint, client) = self.primary_for(project_id).await?;
        let size_bytes = body.len() as u64;
        client.put_object(key, body.clone()).await?;
        self.replicate_to_shadows(project_id, key, body);
        Ok(UploadReceipt {
            endpoint_id: endpoint.id,
            size_bytes,
        })
    }

    async fn download(
        &self,
        project_id: &str,
        endpoint_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<u8>, RetraceError> {
        if let Some(fixed) = &self.fixed {
            return fixed.client.get_object(key).await;
        }
        match endpoint_id {
            Some(id) => {
                let (_, client) = self.resolver.by_id(id).await?;
                client.get_object(key).await
            }
            // Legacy artifacts predate endpoint pinning: walk the current
            // candidates in priority order until one has the object.
            None => {
                let (_, client) = self.resolver.pick_primary(project_id).await?;
                client.get_object(key).await
            }
        }
    }

    async fn purge_prefix(
        &self,
        project_id: &str,
        prefix: &str,
        kind_guard: Option<ArtifactKind>,
    ) -> Result<u64, RetraceError> {
        let mut targets: Vec<(StorageEndpoint, EndpointClient)> = Vec::new();
        if let Some(fixed) = &self.fixed {
            targets.push((fixed.endpoint.clone(), fixed.client.clone()));
        } else {
            targets.extend(self.resolver.all_for_project(project_id).await?);
        }

        let mut deleted = 0u64;
        for (endpoint, client) in targets {
            let keys = client.list_prefix(prefix).await?;
            let keys: Vec<String> = match kind_guard {
                Some(kind) => keys
                    .into_iter()
                    .filter(|k| keys::matches_kind(k, kind))
                    .collect(),
                None => keys,
            };
            if keys.is_empty() {
                continue;
            }
            let n = client.delete_keys(&keys).await?;
            debug!(endpoint_id = %endpoint.id, prefix, count = n, "purged prefix");
            deleted += n;
        }
        Ok(deleted)
    }
}

impl ArtifactStore {
    /// Presigned GET link for sharing an artifact outside the service.
    /// Uses the endpoint's public URL when one is configured.
    pub async fn presign_download(
        &self,
        endpoint_id: Option<&str>,
        project_id: &str,
        key: &str,
    ) -> Result<String, RetraceError> {
        let (endpoint, secret) = match (&self.fixed, endpoint_id) {
            (Some(fixed), _) => (fixed.endpoint.clone(), fixed.secret_access_key.clone()),
            (None, Some(id)) => {
                let (endpoint, _) = self.resolver.by_id(id).await?;
                let secret = self.resolver.secret_for(&endpoint).await?;
                (endpoint, secret)
            }
            (None, None) => {
                let (endpoint, _) = self.resolver.pick_primary(project_id).await?;
                let secret = self.resolver.secret_for(&endpoint).await?;
                (endpoint, secret)
            }
        };
        let base = endpoint
            .public_url
            .clone()
            .unwrap_or_else(|| endpoint.endpoint_url.clone());
        let base = base.trim_end_matches('/');
        let host = base
            .strip_prefix("https://")
            .or_else(|| base.strip_prefix("http://"))
            .ok_or_else(|| RetraceError::Config(format!("bad public url: {base}")))?;
        Ok(sign::presign_get(
            base,
            host,
            &format!("/{}/{key}", endpoint.bucket),
            &endpoint.region,
            &Credentials {
                access_key_id: endpoint.access_key_id.clone(),
                secret_access_key: secret,
            },
            PRESIGN_TTL_SECS,
            Utc::now(),
        ))
    }
}
