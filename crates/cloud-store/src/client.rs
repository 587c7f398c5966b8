//! Cloud document store client.
//!
//! Documents are keyed by bill id inside a per-user collection; the API is
//! a passive document database, so every endpoint here is plain CRUD plus
//! one filtered collection query.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use billfolio_core::errors::Result as CoreResult;
use billfolio_core::sync::{
    IdentityStore, RemoteBillDocument, RemoteBillStore, RemoteWriteOp, REMOTE_MAX_BATCH_WRITE,
};

use crate::error::{CloudStoreError, Result};
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for the billfolio cloud document store.
#[derive(Debug, Clone)]
pub struct CloudStoreClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl CloudStoreClient {
    /// Create a new cloud store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the cloud API (e.g., "https://api.billfolio.app")
    /// * `access_token` - Bearer token for the signed-in user
    pub fn new(base_url: &str, access_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| CloudStoreError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(CloudStoreError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(CloudStoreError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            CloudStoreError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    fn bills_url(&self, user_id: &str) -> String {
        format!("{}/v1/users/{}/bills", self.base_url, user_id)
    }

    /// Write up to [`REMOTE_MAX_BATCH_WRITE`] documents in one atomic batch.
    /// Oversized batches are rejected locally before any network call.
    ///
    /// POST /v1/users/{userId}/bills:batchWrite
    pub async fn push_batch(
        &self,
        user_id: &str,
        ops: &[RemoteWriteOp],
    ) -> Result<BatchWriteResponse> {
        if ops.len() > REMOTE_MAX_BATCH_WRITE {
            return Err(CloudStoreError::invalid_request(format!(
                "Batch of {} ops exceeds the {} limit",
                ops.len(),
                REMOTE_MAX_BATCH_WRITE
            )));
        }

        let url = format!("{}:batchWrite", self.bills_url(user_id));
        debug!("Pushing batch of {} ops", ops.len());

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&BatchWriteRequest { ops: ops.to_vec() })
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Query documents with `lastModified` strictly greater than `since`;
    /// the whole collection when `since` is `None`.
    ///
    /// GET /v1/users/{userId}/bills?modifiedSince={rfc3339}
    pub async fn pull_modified_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteBillDocument>> {
        let url = self.bills_url(user_id);
        let mut request = self.client.get(&url).headers(self.headers()?);
        if let Some(checkpoint) = since {
            request = request.query(&[("modifiedSince", checkpoint.to_rfc3339())]);
        }

        let response = request.send().await?;
        let parsed: QueryResponse = Self::parse_response(response).await?;
        Ok(parsed.documents)
    }

    /// Fetch one document by id. 404 maps to `None`.
    ///
    /// GET /v1/users/{userId}/bills/{billId}
    pub async fn fetch_bill(
        &self,
        user_id: &str,
        bill_id: &str,
    ) -> Result<Option<RemoteBillDocument>> {
        let url = format!("{}/{}", self.bills_url(user_id), bill_id);
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::parse_response(response).await?))
    }

    /// Delete every document for the user with chunked batch deletes under
    /// the same per-batch cap as uploads. Returns the number of documents
    /// removed.
    pub async fn delete_user_documents(&self, user_id: &str) -> Result<usize> {
        let documents = self.pull_modified_since(user_id, None).await?;
        let mut deleted = 0;
        for chunk in documents.chunks(REMOTE_MAX_BATCH_WRITE) {
            let ops: Vec<RemoteWriteOp> = chunk
                .iter()
                .map(|doc| RemoteWriteOp::Delete { id: doc.id.clone() })
                .collect();
            let response = self.push_batch(user_id, &ops).await?;
            deleted += response.written;
        }
        debug!("Deleted {deleted} remote documents for teardown");
        Ok(deleted)
    }

    /// Delete the user's identity record.
    ///
    /// DELETE /v1/users/{userId}/account
    pub async fn delete_account_record(&self, user_id: &str) -> Result<SuccessResponse> {
        let url = format!("{}/v1/users/{}/account", self.base_url, user_id);
        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[async_trait]
impl RemoteBillStore for CloudStoreClient {
    async fn batch_write(&self, user_id: &str, ops: &[RemoteWriteOp]) -> CoreResult<()> {
        self.push_batch(user_id, ops).await?;
        Ok(())
    }

    async fn query_modified_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<RemoteBillDocument>> {
        Ok(self.pull_modified_since(user_id, since).await?)
    }

    async fn get(&self, user_id: &str, bill_id: &str) -> CoreResult<Option<RemoteBillDocument>> {
        Ok(self.fetch_bill(user_id, bill_id).await?)
    }

    async fn delete_all(&self, user_id: &str) -> CoreResult<()> {
        self.delete_user_documents(user_id).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for CloudStoreClient {
    async fn delete_account(&self, user_id: &str) -> CoreResult<()> {
        self.delete_account_record(user_id).await?;
        Ok(())
    }
}
