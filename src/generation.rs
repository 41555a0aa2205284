//! Text generation providers.
//!
//! Implementations of the core [`Generator`] trait:
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate` with `stream: false`
//!   and the decoding parameters passed as Ollama `options`.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions` with the prompt as
//!   a single user message.
//! - **[`DisabledGenerator`]**: always fails; lets `plu ask` and retrieval
//!   diagnostics run without a language model.

use async_trait::async_trait;
use plu_extract_core::prompt::{DecodingParams, Generator};
use plu_extract_core::{Capability, Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::http;

pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &DecodingParams) -> Result<String> {
        Err(Error::GenerationUnavailable(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| http::DEFAULT_OLLAMA_URL.to_string()),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

fn ollama_request(model: &str, prompt: &str, params: &DecodingParams) -> serde_json::Value {
    let mut options = json!({
        "temperature": params.temperature,
        "top_k": params.top_k,
        "top_p": params.top_p,
    });
    if let Some(seed) = params.seed {
        options["seed"] = json!(seed);
    }
    json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": options,
    })
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &DecodingParams) -> Result<String> {
        let json = http::post_json(
            &self.client,
            &format!("{}/api/generate", self.url.trim_end_matches('/')),
            None,
            &ollama_request(&self.model, prompt, params),
            Capability::Generation,
            self.timeout_secs,
        )
        .await?;

        let reply: OllamaGenerateResponse = serde_json::from_value(json).map_err(|e| {
            Error::GenerationUnavailable(format!("invalid Ollama response: {}", e))
        })?;
        Ok(reply.response)
    }
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| http::DEFAULT_OPENAI_URL.to_string()),
            api_key: http::openai_api_key()?,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

fn openai_request(model: &str, prompt: &str, params: &DecodingParams) -> serde_json::Value {
    let mut body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": params.temperature,
        "top_p": params.top_p,
    });
    if let Some(seed) = params.seed {
        body["seed"] = json!(seed);
    }
    body
}

fn parse_openai_reply(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::GenerationUnavailable(
                "invalid OpenAI response: missing choices[0].message.content".to_string(),
            )
        })
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &DecodingParams) -> Result<String> {
        let json = http::post_json(
            &self.client,
            &format!("{}/v1/chat/completions", self.url.trim_end_matches('/')),
            Some(&self.api_key),
            &openai_request(&self.model, prompt, params),
            Capability::Generation,
            self.timeout_secs,
        )
        .await?;
        parse_openai_reply(&json)
    }
}
