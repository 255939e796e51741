use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::ProviderError;

/// Body of one chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    pub conversation_id: String,
}

/// Raw response body: UTF-8 text split at arbitrary byte boundaries.
pub type ByteStream = Pin<Box<dyn futures_core::Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// The model endpoint. Implementations bound the wait for the first byte and
/// never retry; any failure is terminal for the request.
#[async_trait]
pub trait InferenceProxy: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, ProviderError>;

    fn name(&self) -> &str;
}
