use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::EngineInfo;

const INFO: EngineInfo = EngineInfo {
    name: "Google",
    provider_url: "https://www.google.com",
    description: "General purpose reverse image search across the public web.",
    recommendation: &["Photos", "Memes", "Screenshots"],
    types: &["All-purpose"],
    supports_best_match: false,
    pre_work: false,
};

pub struct GoogleEngine;

impl GoogleEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SearchEngine for GoogleEngine {
    fn info(&self) -> &EngineInfo {
        &INFO
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(INFO.name),
            format!(
                "https://www.google.com/searchbyimage?safe=off&image_url={}",
                urlencoding::encode(image_url)
            ),
        ))
    }
}
