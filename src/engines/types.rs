use crate::chat::Button;

/// Static description of one search engine integration.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub name: &'static str,
    pub provider_url: &'static str,
    pub description: &'static str,
    /// What the engine is particularly good at
    pub recommendation: &'static [&'static str],
    /// Content kinds the engine indexes
    pub types: &'static [&'static str],
    /// Can answer a deep best-match lookup
    pub supports_best_match: bool,
    /// Needs a network round trip before a usable link exists
    pub pre_work: bool,
}

/// Ordered display fields of one best-match result.
///
/// Values starting with `#` are rendered as tag text, everything else as
/// code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRecord {
    fields: Vec<(String, String)>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Throw away the fields and leave a single marker entry.
    pub fn replace_with_marker(&mut self, marker: &str) {
        self.fields.clear();
        self.push(marker, "");
    }
}

/// Attribution and dedup metadata for one best-match result.
#[derive(Debug, Clone, Default)]
pub struct ResultMeta {
    pub provider: String,
    pub provider_url: String,
    /// Secondary attribution, e.g. the database the provider consulted
    pub provided_via: Option<String>,
    pub provided_via_url: Option<String>,
    /// Similarity score 0-100
    pub similarity: Option<u8>,
    pub thumbnail: Option<String>,
    /// Extra action buttons supplied by the engine
    pub buttons: Vec<Button>,
    /// Key identifying the matched content across engines
    pub identifier: Option<String>,
    /// Key identifying the thumbnail across engines
    pub thumbnail_identifier: Option<String>,
    pub errors: Vec<String>,
    pub disable_preview: bool,
}

impl ResultMeta {
    pub fn new(provider: &str, provider_url: &str) -> Self {
        Self {
            provider: provider.to_string(),
            provider_url: provider_url.to_string(),
            ..Self::default()
        }
    }
}

/// One successful deep lookup.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub record: ResultRecord,
    pub meta: ResultMeta,
}

/// Per-engine lookup failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("{0}")]
    Provider(String),
}
