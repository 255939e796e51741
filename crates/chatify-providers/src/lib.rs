mod gemini;
mod http;

#[cfg(test)]
mod tests;

pub use gemini::GeminiProxy;
pub use http::HttpChatProxy;

use chatify_core::config::{AppConfig, ProxyKind};
use chatify_core::error::ProviderError;
use chatify_core::inference::InferenceProxy;
use std::sync::Arc;

/// Build the inference backend selected in config.
pub fn create_proxy(config: &AppConfig) -> Result<Arc<dyn InferenceProxy>, ProviderError> {
    let proxy = &config.proxy;
    match proxy.kind {
        ProxyKind::Http => Ok(Arc::new(HttpChatProxy::new(
            proxy.base_url.clone(),
            proxy.first_byte_timeout(),
        ))),
        ProxyKind::Gemini => {
            let api_key = proxy.gemini_api_key.clone().ok_or_else(|| {
                ProviderError::MissingApiKey(
                    "GEMINI_API_KEY not set. Set via env var or config file.".into(),
                )
            })?;
            Ok(Arc::new(GeminiProxy::new(
                api_key,
                proxy.gemini_base_url.clone(),
                proxy.gemini_model.clone(),
                proxy.max_output_tokens,
                proxy.first_byte_timeout(),
            )))
        }
    }
}
