pub mod http;

pub use http::HttpEmbeddingProvider;

use crate::error::Result;
use async_trait::async_trait;

/// One embedding upsert request
#[derive(Debug, Clone)]
pub struct EmbeddingRequest<'a> {
    /// Stable identifier for the content, unique together with the model
    pub uri: &'a str,
    pub text: &'a str,
    pub model_name: &'a str,
    pub task_types: &'a [String],
}

/// Provider acknowledgement of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingUpsert {
    pub id: String,
    pub uri: String,
    pub model_name: String,
    /// True when the embedding was newly created, false when an existing
    /// uri+model entry was updated
    pub created: bool,
}

/// Text-to-vector provider, upserting by uri + model.
///
/// A failed call is a per-file failure from the sync engine's point of view;
/// no retries happen at this layer.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn create_embedding(&self, request: EmbeddingRequest<'_>) -> Result<EmbeddingUpsert>;
}
