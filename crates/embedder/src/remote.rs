//! OpenAI-compatible HTTP backend (vLLM, OpenAI, text-embeddings-inference).

use crate::EmbeddingProvider;
use core_types::{BuildError, BuildResult};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Placeholder sent when no key is configured; local servers ignore it.
pub const UNSET_API_KEY: &str = "not-set";

const API_KEY_VARS: [&str; 2] = ["VLLM_API_KEY", "OPENAI_API_KEY"];

/// First non-empty API key from the environment, or [`UNSET_API_KEY`].
pub fn api_key_from_env() -> String {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| UNSET_API_KEY.to_string())
}

/// Normalize a user-supplied URL to the API root ending in `/v1`.
///
/// Accepts the root itself, the full `/v1/embeddings` endpoint, a bare
/// `/embeddings` endpoint, or a host without a version segment.
pub fn resolve_base_url(raw: &str) -> BuildResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(BuildError::InvalidConfiguration(
            "embedding base URL is empty".to_string(),
        ));
    }
    let root = trimmed.strip_suffix("/embeddings").unwrap_or(trimmed);
    if root.ends_with("/v1") {
        Ok(root.to_string())
    } else {
        Ok(format!("{root}/v1"))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ModelPage {
    #[serde(default)]
    data: Vec<ModelEntry>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

pub struct RemoteProvider {
    client: Client,
    base_url: String,
}

impl RemoteProvider {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> BuildResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())).map_err(|e| {
            BuildError::InvalidConfiguration(format!("API key is not a valid header value: {e}"))
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| BuildError::ProviderUnavailable {
                endpoint: base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn unavailable(&self, reason: impl Into<String>) -> BuildError {
        BuildError::ProviderUnavailable {
            endpoint: self.base_url.clone(),
            reason: reason.into(),
        }
    }

    fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> BuildResult<T> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| self.unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(self.unavailable(format!("GET {url} returned {status}: {body}")));
        }
        resp.json()
            .map_err(|e| self.unavailable(format!("malformed response from {url}: {e}")))
    }
}

impl EmbeddingProvider for RemoteProvider {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn list_models(&self) -> BuildResult<Vec<String>> {
        let mut models = Vec::new();
        let url = format!("{}/models", self.base_url);
        let mut after: Option<String> = None;
        loop {
            let query = after_query(after.as_deref());
            let page: ModelPage = self.get_json(&url, &query)?;
            let last = page.data.last().map(|m| m.id.clone());
            models.extend(page.data.into_iter().map(|m| m.id));
            match (page.has_more, last) {
                (true, Some(cursor)) if after.as_deref() != Some(cursor.as_str()) => {
                    after = Some(cursor);
                }
                _ => break,
            }
        }
        debug!(endpoint = %self.base_url, count = models.len(), "listed models");
        Ok(models)
    }

    fn embed(&self, model: &str, batch: &[String]) -> BuildResult<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model,
            input: batch,
        };
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| self.unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(self.unavailable(format!("embeddings request returned {status}: {body}")));
        }
        let body = resp
            .text()
            .map_err(|e| self.unavailable(format!("failed to read embeddings response: {e}")))?;
        parse_embeddings(&body, batch.len())
    }
}

/// Pagination cursor for `GET /models`; empty on the first page.
fn after_query(cursor: Option<&str>) -> Vec<(&'static str, &str)> {
    cursor.map(|c| ("after", c)).into_iter().collect()
}

/// Decode an embeddings response, reordering entries by their `index`.
fn parse_embeddings(body: &str, expected: usize) -> BuildResult<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)?;
    parsed.data.sort_by_key(|entry| entry.index);
    if parsed.data.len() != expected {
        return Err(BuildError::EmbeddingBatchFailed {
            start: 0,
            reason: format!(
                "provider returned {} embeddings for {expected} inputs",
                parsed.data.len()
            ),
        });
    }
    Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
}
