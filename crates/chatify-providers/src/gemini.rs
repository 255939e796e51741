use async_trait::async_trait;
use bytes::Bytes;
use chatify_core::error::ProviderError;
use chatify_core::inference::*;
use reqwest::Client;
use std::time::Duration;

use crate::http::error_message;

/// Direct client for the hosted model's `generateContent` API.
///
/// The answer arrives in one piece and is handed back as a single-chunk
/// stream, so callers treat it exactly like a streamed body.
pub struct GeminiProxy {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    timeout: Duration,
}

impl GeminiProxy {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_output_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
            max_output_tokens,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl InferenceProxy for GeminiProxy {
    async fn send(&self, request: &ChatRequest) -> Result<ByteStream, ProviderError> {
        if request.message.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("missing message".into()));
        }

        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.message }] }],
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
                "candidateCount": 1,
            },
        });

        let pending = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send();

        let resp = match tokio::time::timeout(self.timeout, pending).await {
            Err(_) => {
                tracing::error!(model = %self.model, "model request timed out");
                return Err(ProviderError::Timeout(self.timeout.as_secs()));
            }
            Ok(Err(e)) => return Err(ProviderError::Http(e.to_string())),
            Ok(Ok(r)) => r,
        };

        let status = resp.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "model responded with error status");
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let answer = candidate_text(&json);

        let chunks: Vec<Result<Bytes, ProviderError>> = if answer.is_empty() {
            Vec::new()
        } else {
            vec![Ok(Bytes::from(answer))]
        };
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Text of the first candidate, parts joined in order. Missing fields read as
/// an empty answer.
fn candidate_text(json: &serde_json::Value) -> String {
    json["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}
