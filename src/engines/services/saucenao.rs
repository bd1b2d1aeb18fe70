use super::{http_client, site_label};
use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::{EngineError, EngineInfo, ResultMeta, ResultRecord, SearchMatch};
use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

const MIN_SIMILARITY: f32 = 60.0;

pub struct SauceNaoEngine {
    client: reqwest::Client,
    api_key: Option<String>,
    info: EngineInfo,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    results: Option<Vec<ApiResult>>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    header: ApiHeader,
    data: ApiData,
}

#[derive(Debug, Deserialize)]
struct ApiHeader {
    similarity: String,
    thumbnail: Option<String>,
    index_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ApiData {
    ext_urls: Option<Vec<String>>,
    title: Option<String>,
    member_name: Option<String>,
    creator: Option<serde_json::Value>,
    source: Option<String>,
    part: Option<String>,
    est_time: Option<String>,
}

impl SauceNaoEngine {
    /// Without an API key the engine still serves its search link, but the
    /// JSON endpoint is off limits, so best match is flagged off.
    pub fn new(timeout_secs: u64, api_key: Option<String>) -> Result<Self> {
        let info = EngineInfo {
            name: "SauceNAO",
            provider_url: "https://saucenao.com",
            description: "Finds the source of anime and fan artwork across dozens of databases.",
            recommendation: &["Anime artwork", "Fan art", "Anime screenshots"],
            types: &["Anime / artwork"],
            supports_best_match: api_key.is_some(),
            pre_work: false,
        };
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            info,
        })
    }

    fn creator_name(data: &ApiData) -> Option<String> {
        if let Some(member) = &data.member_name {
            return Some(member.clone());
        }
        match &data.creator {
            Some(serde_json::Value::String(name)) => Some(name.clone()),
            Some(serde_json::Value::Array(names)) => Some(
                names
                    .iter()
                    .filter_map(|value| value.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl SearchEngine for SauceNaoEngine {
    fn info(&self) -> &EngineInfo {
        &self.info
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(self.info.name),
            format!(
                "https://saucenao.com/search.php?url={}",
                urlencoding::encode(image_url)
            ),
        ))
    }

    async fn best_match(&self, image_url: &str) -> Result<Option<SearchMatch>, EngineError> {
        let Some(api_key) = &self.api_key else {
            debug!("SauceNAO best match skipped: no API key");
            return Ok(None);
        };

        let response: ApiResponse = self
            .client
            .get("https://saucenao.com/search.php")
            .query(&[
                ("output_type", "2"),
                ("numres", "1"),
                ("api_key", api_key.as_str()),
                ("url", image_url),
            ])
            .send()
            .await?
            .json()
            .await?;

        let Some(result) = response.results.and_then(|mut r| {
            if r.is_empty() {
                None
            } else {
                Some(r.remove(0))
            }
        }) else {
            return Ok(None);
        };

        let similarity: f32 = result
            .header
            .similarity
            .parse()
            .map_err(|_| {
                EngineError::UnexpectedResponse(format!(
                    "similarity is not a number: {}",
                    result.header.similarity
                ))
            })?;
        if similarity < MIN_SIMILARITY {
            return Ok(None);
        }

        let mut record = ResultRecord::new();
        if let Some(title) = &result.data.title {
            record.push("Title", title);
        }
        if let Some(creator) = Self::creator_name(&result.data) {
            record.push("Creator", creator);
        }
        if let Some(source) = &result.data.source {
            record.push("Source", source);
        }
        if let Some(part) = &result.data.part {
            record.push("Part", part);
        }
        if let Some(est_time) = &result.data.est_time {
            record.push("At", est_time);
        }

        let ext_urls = result.data.ext_urls.unwrap_or_default();

        let mut meta = ResultMeta::new(self.info.name, self.info.provider_url);
        meta.provided_via = result.header.index_name.clone();
        meta.similarity = Some(similarity.round() as u8);
        meta.thumbnail = result.header.thumbnail.clone();
        meta.identifier = ext_urls.first().cloned().or_else(|| result.data.title.clone());
        meta.thumbnail_identifier = result.header.thumbnail.clone();
        meta.buttons = ext_urls
            .iter()
            .map(|url| Button::link(site_label(url), url))
            .collect();

        Ok(Some(SearchMatch { record, meta }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_match_flag_follows_api_key() {
        let without = SauceNaoEngine::new(30, None).unwrap();
        assert!(!without.info().supports_best_match);

        let with = SauceNaoEngine::new(30, Some("key".to_string())).unwrap();
        assert!(with.info().supports_best_match);
    }

    #[test]
    fn test_api_response_parsing() {
        let raw = r#"{
            "results": [{
                "header": {"similarity": "93.21", "thumbnail": "https://img.saucenao.com/t.jpg", "index_name": "Index #5: Pixiv"},
                "data": {"ext_urls": ["https://www.pixiv.net/artworks/1"], "title": "Example", "member_name": "artist"}
            }]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let result = &parsed.results.unwrap()[0];
        assert_eq!(result.header.similarity, "93.21");
        assert_eq!(result.data.title.as_deref(), Some("Example"));
    }

    #[test]
    fn test_creator_name_variants() {
        let data = ApiData {
            creator: Some(serde_json::json!(["a", "b"])),
            ..ApiData::default()
        };
        assert_eq!(SauceNaoEngine::creator_name(&data).as_deref(), Some("a, b"));
    }
}
