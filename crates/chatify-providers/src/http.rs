use async_trait::async_trait;
use chatify_core::error::ProviderError;
use chatify_core::inference::*;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::StreamExt;

/// Client for the app's chat endpoint. The response body is the model's
/// plain-text answer, streamed as it is produced.
pub struct HttpChatProxy {
    client: Client,
    base_url: String,
    first_byte_timeout: Duration,
}

impl HttpChatProxy {
    pub fn new(base_url: String, first_byte_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            first_byte_timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl InferenceProxy for HttpChatProxy {
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, ProviderError> {
        if request.message.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("missing message".into()));
        }

        // One deadline covers both the response head and the first body chunk
        let deadline = Instant::now() + self.first_byte_timeout;
        let timeout_secs = self.first_byte_timeout.as_secs();

        let pending = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(request)
            .send();

        let resp = match tokio::time::timeout_at(deadline, pending).await {
            Err(_) => return Err(ProviderError::Timeout(timeout_secs)),
            Ok(Err(e)) => return Err(ProviderError::Http(e.to_string())),
            Ok(Ok(r)) => r,
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        tracing::debug!(conversation = %request.conversation_id, "chat stream opened");

        let byte_stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ProviderError::Stream(e.to_string())));

        let stream = async_stream::stream! {
            let mut byte_stream = Box::pin(byte_stream);

            let first = match tokio::time::timeout_at(deadline, byte_stream.next()).await {
                Ok(first) => first,
                Err(_) => {
                    tracing::warn!(timeout_secs, "no response body before deadline");
                    Some(Err(ProviderError::Timeout(timeout_secs)))
                }
            };

            let mut next = first;
            while let Some(chunk) = next {
                let failed = chunk.is_err();
                yield chunk;
                if failed {
                    break;
                }
                next = byte_stream.next().await;
            }
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Error bodies are `{"error": "..."}`; anything else is passed through.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
