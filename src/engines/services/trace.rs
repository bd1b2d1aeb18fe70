use super::http_client;
use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::{EngineError, EngineInfo, ResultMeta, ResultRecord, SearchMatch};
use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

/// Below this the scene is almost certainly wrong.
const MIN_SIMILARITY: f64 = 0.87;

const INFO: EngineInfo = EngineInfo {
    name: "Trace",
    provider_url: "https://trace.moe",
    description: "Identifies the exact anime scene a screenshot was taken from.",
    recommendation: &["Anime screenshots", "Anime gifs and clips"],
    types: &["Anime"],
    supports_best_match: true,
    pre_work: true,
};

pub struct TraceEngine {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    error: Option<String>,
    result: Option<Vec<ApiResult>>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    anilist: Option<AniList>,
    episode: Option<serde_json::Value>,
    from: Option<f64>,
    similarity: f64,
    image: Option<String>,
    video: Option<String>,
}

/// `anilist` is a bare id unless `anilistInfo` was requested.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AniList {
    Id(u64),
    Info(AniListInfo),
}

#[derive(Debug, Deserialize)]
struct AniListInfo {
    id: u64,
    title: Option<AniListTitle>,
}

#[derive(Debug, Deserialize)]
struct AniListTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

impl TraceEngine {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
        })
    }

    async fn query(&self, image_url: &str) -> Result<Option<ApiResult>, EngineError> {
        let response: ApiResponse = self
            .client
            .get("https://api.trace.moe/search?anilistInfo")
            .query(&[("url", image_url)])
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error.filter(|error| !error.is_empty()) {
            return Err(EngineError::Provider(error));
        }

        let best = response
            .result
            .unwrap_or_default()
            .into_iter()
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
            .filter(|result| result.similarity >= MIN_SIMILARITY);
        Ok(best)
    }
}

#[async_trait::async_trait]
impl SearchEngine for TraceEngine {
    fn info(&self) -> &EngineInfo {
        &INFO
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(INFO.name),
            format!("https://trace.moe/?url={}", urlencoding::encode(image_url)),
        ))
    }

    async fn resolve_link(&self, image_url: &str) -> Option<Button> {
        match self.query(image_url).await {
            Ok(Some(_)) => self.search_link(image_url, None),
            Ok(None) => None,
            Err(error) => {
                debug!("Trace resolve failed: {}", error);
                None
            }
        }
    }

    async fn best_match(&self, image_url: &str) -> Result<Option<SearchMatch>, EngineError> {
        let Some(result) = self.query(image_url).await? else {
            return Ok(None);
        };

        let (anilist_id, title) = match result.anilist {
            Some(AniList::Info(info)) => {
                let title = info.title.as_ref().and_then(|title| {
                    title
                        .romaji
                        .clone()
                        .or_else(|| title.english.clone())
                        .or_else(|| title.native.clone())
                });
                (Some(info.id), title)
            }
            Some(AniList::Id(id)) => (Some(id), None),
            None => (None, None),
        };

        let episode = result
            .episode
            .as_ref()
            .map(format_json_scalar)
            .filter(|episode| !episode.is_empty());

        let mut record = ResultRecord::new();
        if let Some(title) = &title {
            record.push("Title", title);
        }
        if let Some(episode) = &episode {
            record.push("Episode", episode);
        }
        if let Some(from) = result.from {
            record.push("At", format_timestamp(from));
        }

        let mut meta = ResultMeta::new(INFO.name, INFO.provider_url);
        meta.similarity = Some((result.similarity * 100.0).round() as u8);
        meta.thumbnail = result.image.clone();
        meta.identifier = anilist_id.map(|id| {
            format!(
                "anilist:{}/{}",
                id,
                episode.as_deref().unwrap_or("?")
            )
        });
        meta.thumbnail_identifier = result.image.clone();

        let mut buttons = vec![];
        if let Some(id) = anilist_id {
            buttons.push(Button::link(
                "AniList",
                format!("https://anilist.co/anime/{}", id),
            ));
        }
        if let Some(video) = &result.video {
            buttons.push(Button::link("Scene preview", video));
        }
        meta.buttons = buttons;

        Ok(Some(SearchMatch { record, meta }))
    }
}

/// `episode` arrives as a number, a string, or a list of either.
fn format_json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(format_json_scalar)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join("-"),
        _ => String::new(),
    }
}

fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(83.4), "01:23");
        assert_eq!(format_timestamp(600.0), "10:00");
    }

    #[test]
    fn test_format_json_scalar() {
        assert_eq!(format_json_scalar(&serde_json::json!(5)), "5");
        assert_eq!(format_json_scalar(&serde_json::json!("5-6")), "5-6");
        assert_eq!(format_json_scalar(&serde_json::json!([5, 6])), "5-6");
        assert_eq!(format_json_scalar(&serde_json::json!(null)), "");
    }

    #[test]
    fn test_api_response_with_anilist_info() {
        let raw = r#"{
            "error": "",
            "result": [{
                "anilist": {"id": 21, "title": {"romaji": "One Piece"}},
                "episode": 3,
                "from": 83.4,
                "similarity": 0.95,
                "image": "https://media.trace.moe/image/x",
                "video": "https://media.trace.moe/video/x"
            }]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let result = &parsed.result.unwrap()[0];
        assert_eq!(result.similarity, 0.95);
        match result.anilist.as_ref().unwrap() {
            AniList::Info(info) => assert_eq!(info.id, 21),
            other => panic!("unexpected anilist field: {:?}", other),
        }
    }

    #[test]
    fn test_api_response_with_bare_id() {
        let raw = r#"{"result": [{"anilist": 21, "similarity": 0.5}]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        match parsed.result.unwrap()[0].anilist.as_ref().unwrap() {
            AniList::Id(21) => {}
            other => panic!("unexpected anilist field: {:?}", other),
        }
    }
}
