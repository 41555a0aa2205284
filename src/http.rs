//! Shared JSON-over-HTTP plumbing for the Ollama and OpenAI providers.
//!
//! Every request carries the provider's timeout. Transport failures map to the
//! capability's `*Unavailable` error, and an elapsed deadline maps to
//! [`Error::Timeout`]. Nothing is retried.

use plu_extract_core::{Capability, Error, Result};
use std::time::Duration;

pub(crate) const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub(crate) const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

pub(crate) fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub(crate) fn openai_api_key() -> anyhow::Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
}

pub(crate) fn unavailable(capability: Capability, reason: String) -> Error {
    match capability {
        Capability::Embedding => Error::EmbeddingUnavailable(reason),
        Capability::Generation => Error::GenerationUnavailable(reason),
    }
}

fn transport_error(e: reqwest::Error, capability: Capability, secs: u64, url: &str) -> Error {
    if e.is_timeout() {
        Error::Timeout { capability, secs }
    } else {
        unavailable(capability, format!("request to {} failed: {}", url, e))
    }
}

/// POST `body` to `url` and decode the JSON reply.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    capability: Capability,
    timeout_secs: u64,
) -> Result<serde_json::Value> {
    let mut request = client.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| transport_error(e, capability, timeout_secs, url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(unavailable(
            capability,
            format!("{} returned {}: {}", url, status, body_text.trim()),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| transport_error(e, capability, timeout_secs, url))
}
