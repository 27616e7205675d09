// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for one S3-compatible endpoint.
//!
//! Covers exactly the operations the pipeline needs: PutObject, GetObject,
//! ListObjectsV2 with continuation, and batched DeleteObjects. Responses
//! are parsed with a minimal tag scanner since the handful of fields we
//! read never nest ambiguously.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use reqwest::StatusCode;
use retrace_core::RetraceError;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::sign::{self, Credentials, UNSIGNED_PAYLOAD};

/// Hard S3 limit on keys per DeleteObjects request.
pub const DELETE_BATCH_MAX: usize = 1000;

/// Client for a single endpoint + bucket pair.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    http: reqwest::Client,
    /// Scheme + host (+ optional port), no trailing slash.
    base_url: String,
    host: String,
    bucket: String,
    region: String,
    credentials: Credentials,
}

impl EndpointClient {
    pub fn new(
        http: reqwest::Client,
        endpoint_url: &str,
        bucket: &str,
        region: &str,
        credentials: Credentials,
    ) -> Result<Self, RetraceError> {
        let base_url = endpoint_url.trim_end_matches('/').to_string();
        let host = base_url
            .strip_prefix("https://")
            .or_else(|| base_url.strip_prefix("http://"))
            .ok_or_else(|| {
                RetraceError::Config(format!("endpoint url must be http(s): {endpoint_url}"))
            })?
            .to_string();
        Ok(Self {
            http,
            base_url,
            host,
            bucket: bucket.to_string(),
            region: region.to_string(),
            credentials,
        })
    }

    fn object_path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    fn bucket_path(&self) -> String {
        format!("/{}", self.bucket)
    }

    pub async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), RetraceError> {
        let path = self.object_path(key);
        let payload_hash = sign::sha256_hex(&body);
        let signed = sign::sign_request(
            "PUT",
            &self.host,
            &path,
            &[],
            &payload_hash,
            &self.region,
            &self.credentials,
            Utc::now(),
        );

        let response = self
            .http
            .put(format!("{}{path}", self.base_url))
            .header("authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .body(body)
            .send()
            .await
            .map_err(|e| RetraceError::object_store_with("put request failed", e))?;

        self.expect_success(response, "PutObject").await?;
        Ok(())
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, RetraceError> {
        let path = self.object_path(key);
        let signed = sign::sign_request(
            "GET",
            &self.host,
            &path,
            &[],
            UNSIGNED_PAYLOAD,
            &self.region,
            &self.credentials,
            Utc::now(),
        );

        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .send()
            .await
            .map_err(|e| RetraceError::object_store_with("get request failed", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RetraceError::NotFound {
                key: key.to_string(),
            });
        }
        let response = self.expect_success(response, "GetObject").await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetraceError::object_store_with("get body read failed", e))?;
        Ok(bytes.to_vec())
    }

    /// List every key under `prefix`, following continuation tokens.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, RetraceError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query: Vec<(String, String)> = vec![
                ("list-type".to_string(), "2".to_string()),
                ("prefix".to_string(), prefix.to_string()),
            ];
            if let Some(token) = &continuation {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let path = self.bucket_path();
            let signed = sign::sign_request(
                "GET",
                &self.host,
                &path,
                &query,
                UNSIGNED_PAYLOAD,
                &self.region,
                &self.credentials,
                Utc::now(),
            );

            let response = self
                .http
                .get(format!("{}{path}", self.base_url))
                .query(&query)
                .header("authorization", &signed.authorization)
                .header("x-amz-date", &signed.amz_date)
                .header("x-amz-content-sha256", &signed.content_sha256)
                .send()
                .await
                .map_err(|e| RetraceError::object_store_with("list request failed", e))?;

            let response = self.expect_success(response, "ListObjectsV2").await?;
            let body = response
                .text()
                .await
                .map_err(|e| RetraceError::object_store_with("list body read failed", e))?;

            keys.extend(extract_all(&body, "Key").into_iter().map(xml_unescape));

            let truncated = extract_first(&body, "IsTruncated")
                .map(|v| v == "true")
                .unwrap_or(false);
            if !truncated {
                break;
            }
            continuation = extract_first(&body, "NextContinuationToken").map(xml_unescape);
            if continuation.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    /// Delete the given keys, chunked at the S3 batch limit. Returns the
    /// number of keys submitted for deletion.
    pub async fn delete_keys(&self, keys: &[String]) -> Result<u64, RetraceError> {
        let mut deleted = 0u64;
        for chunk in keys.chunks(DELETE_BATCH_MAX) {
            self.delete_batch(chunk).await?;
            deleted += chunk.len() as u64;
        }
        Ok(deleted)
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<(), RetraceError> {
        let mut body = String::from("<Delete><Quiet>true</Quiet>");
        for key in keys {
            body.push_str("<Object><Key>");
            body.push_str(&xml_escape(key));
            body.push_str("</Key></Object>");
        }
        body.push_str("</Delete>");
        let body = body.into_bytes();

        let path = self.bucket_path();
        let query = vec![("delete".to_string(), String::new())];
        let payload_hash = sign::sha256_hex(&body);
        let checksum = BASE64.encode(Sha256::digest(&body));
        let signed = sign::sign_request(
            "POST",
            &self.host,
            &path,
            &query,
            &payload_hash,
            &self.region,
            &self.credentials,
            Utc::now(),
        );

        debug!(count = keys.len(), bucket = %self.bucket, "submitting delete batch");
        let response = self
            .http
            .post(format!("{}{path}?delete", self.base_url))
            .header("authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("x-amz-checksum-sha256", checksum)
            .header("content-type", "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| RetraceError::object_store_with("delete request failed", e))?;

        let response = self.expect_success(response, "DeleteObjects").await?;
        let text = response
            .text()
            .await
            .map_err(|e| RetraceError::object_store_with("delete body read failed", e))?;
        // Quiet mode only reports per-key failures.
        if let Some(code) = extract_first(&text, "Code") {
            return Err(RetraceError::ObjectStore {
                message: format!("delete batch had failures: {code}"),
                source: None,
            });
        }
        Ok(())
    }

    async fn expect_success(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, RetraceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let code = extract_first(&body, "Code").unwrap_or_else(|| status.to_string());
        Err(RetraceError::ObjectStore {
            message: format!("{operation} failed with {status}: {code}"),
            source: None,
        })
    }
}

/// First text content of `<tag>...</tag>`, if present.
fn extract_first(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].to_string())
}

/// Every text content of `<tag>...</tag>`, in document order.
fn extract_all(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else { break };
        values.push(after[..end].to_string());
        rest = &after[end + close.len()..];
    }
    values
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn xml_unescape(raw: String) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
