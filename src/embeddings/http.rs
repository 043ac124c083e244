use crate::error::{EesError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingProvider, EmbeddingRequest, EmbeddingUpsert};

/// Request body for the embedding service
#[derive(Serialize)]
struct UpsertRequest<'a> {
    uri: &'a str,
    text: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    task_types: &'a [String],
}

/// Response body from the embedding service
#[derive(Deserialize)]
struct UpsertResponse {
    id: String,
    uri: String,
    model: String,
}

/// HTTP embedding client.
///
/// Upserts by uri + model: the service answers 201 for a newly created
/// embedding and 200 for an update of an existing one. Calls are made
/// exactly once; a failure is reported to the caller, which records it as a
/// per-file failure.
pub struct HttpEmbeddingProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpEmbeddingProvider {
    /// Create a new embedding client
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the embedding service
    /// * `api_key` - Bearer token for the service
    ///
    /// # Panics
    ///
    /// Panics if HTTP client cannot be created (should not happen in normal operation)
    pub fn new(api_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.api_url)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn create_embedding(&self, request: EmbeddingRequest<'_>) -> Result<EmbeddingUpsert> {
        let body = UpsertRequest {
            uri: request.uri,
            text: request.text,
            model: request.model_name,
            task_types: request.task_types,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EesError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(EesError::Embedding(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let created = status == StatusCode::CREATED;

        let result: UpsertResponse = response
            .json()
            .await
            .map_err(|e| EesError::Embedding(format!("Failed to parse response: {}", e)))?;

        Ok(EmbeddingUpsert {
            id: result.id,
            uri: result.uri,
            model_name: result.model,
            created,
        })
    }
}
