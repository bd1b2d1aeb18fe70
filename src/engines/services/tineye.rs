use super::http_client;
use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::EngineInfo;
use anyhow::Result;
use scraper::{Html, Selector};
use tracing::debug;

const INFO: EngineInfo = EngineInfo {
    name: "TinEye",
    provider_url: "https://tineye.com",
    description: "Exact-copy search; finds where an unmodified image appears.",
    recommendation: &["Finding the original source", "Tracking reposts"],
    types: &["All-purpose"],
    supports_best_match: false,
    pre_work: true,
};

/// TinEye only knows exact copies, so the link is withheld until a quick
/// page fetch confirms there is at least one match.
pub struct TinEyeEngine {
    client: reqwest::Client,
}

impl TinEyeEngine {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
        })
    }

    fn result_url(image_url: &str) -> String {
        format!(
            "https://tineye.com/search?url={}",
            urlencoding::encode(image_url)
        )
    }
}

#[async_trait::async_trait]
impl SearchEngine for TinEyeEngine {
    fn info(&self) -> &EngineInfo {
        &INFO
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(INFO.name),
            Self::result_url(image_url),
        ))
    }

    async fn resolve_link(&self, image_url: &str) -> Option<Button> {
        let url = Self::result_url(image_url);
        let html = match self.client.get(&url).send().await {
            Ok(response) => match response.text().await {
                Ok(html) => html,
                Err(error) => {
                    debug!("TinEye response read failed: {}", error);
                    return None;
                }
            },
            Err(error) => {
                debug!("TinEye request failed: {}", error);
                return None;
            }
        };

        let matches = extract_match_count(&Html::parse_document(&html));
        if matches == 0 {
            return None;
        }
        self.search_link(image_url, Some(&format!("{} ({})", INFO.name, matches)))
    }
}

fn extract_match_count(document: &Html) -> usize {
    let selectors = vec![
        ".matches-count",
        ".result-count",
        "h2.search-results-message",
    ];

    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(elem) = document.select(&selector).next() {
                let text = elem.text().collect::<String>();

                for word in text.split_whitespace() {
                    let cleaned = word.replace(',', "").replace('.', "");
                    if let Ok(num) = cleaned.parse::<usize>() {
                        return num;
                    }
                }
            }
        }
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_match_count() {
        let html = r#"<h2 class="search-results-message">Found 12 results</h2>"#;
        assert_eq!(extract_match_count(&Html::parse_document(html)), 12);
    }

    #[test]
    fn test_extract_match_count_no_results() {
        let html = r#"<div class="empty">Your search returned no results</div>"#;
        assert_eq!(extract_match_count(&Html::parse_document(html)), 0);
    }

    #[test]
    fn test_placeholder_is_wait_for_callback() {
        let engine = TinEyeEngine::new(30).unwrap();
        let button = engine.placeholder_button().unwrap();
        assert_eq!(button.label, "⏳ TinEye");
    }
}
