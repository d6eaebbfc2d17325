//! Model catalog client.
//!
//! The catalog is a remote JSON array of model descriptors. Only entries
//! tagged as LLMs are kept; each is mapped to display metadata with a
//! vendor icon inferred from the model name.

use serde::{Deserialize, Serialize};

use crate::api::{classify_reqwest_error, ApiError, ApiResult};

/// Raw catalog entry as served by the endpoint.
#[derive(Debug, Clone, Deserialize)]
struct RawCatalogEntry {
    name: String,
    #[serde(rename = "type", default)]
    kinds: Vec<String>,
}

/// Vendor icon assigned to a model by name matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelIcon {
    OpenAi,
    Anthropic,
    Gemini,
    Meta,
    Mistral,
    DeepSeek,
}

/// Display metadata for one available model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// None when no vendor prefix matched.
    pub icon: Option<ModelIcon>,
}

/// Assigns a vendor icon by matching name substrings.
///
/// Unmatched models get no icon.
pub fn icon_for(name: &str) -> Option<ModelIcon> {
    let lower = name.to_lowercase();
    const PREFIXES: &[(&str, ModelIcon)] = &[
        ("gpt", ModelIcon::OpenAi),
        ("o1", ModelIcon::OpenAi),
        ("claude", ModelIcon::Anthropic),
        ("gemini", ModelIcon::Gemini),
        ("llama", ModelIcon::Meta),
        ("mistral", ModelIcon::Mistral),
        ("mixtral", ModelIcon::Mistral),
        ("deepseek", ModelIcon::DeepSeek),
    ];
    PREFIXES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, icon)| *icon)
}

/// Filters raw entries down to LLMs and maps them to display metadata.
fn to_entries(raw: Vec<RawCatalogEntry>) -> Vec<ModelEntry> {
    raw.into_iter()
        .filter(|entry| entry.kinds.iter().any(|k| k == "llm"))
        .map(|entry| ModelEntry {
            icon: icon_for(&entry.name),
            name: entry.name,
        })
        .collect()
}

/// Client for the model catalog resource.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    url: String,
    http: reqwest::Client,
}

impl CatalogClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetches the catalog and returns the retained LLM entries.
    pub async fn fetch(&self) -> ApiResult<Vec<ModelEntry>> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }

        let raw: Vec<RawCatalogEntry> = response
            .json()
            .await
            .map_err(|e| ApiError::parse(format!("Failed to parse model catalog: {e}")))?;

        Ok(to_entries(raw))
    }
}
