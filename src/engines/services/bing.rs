use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::EngineInfo;

const INFO: EngineInfo = EngineInfo {
    name: "Bing",
    provider_url: "https://www.bing.com",
    description: "Microsoft's visual search; decent at products and faces.",
    recommendation: &["Photos", "Products"],
    types: &["All-purpose"],
    supports_best_match: false,
    pre_work: false,
};

pub struct BingEngine;

impl BingEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SearchEngine for BingEngine {
    fn info(&self) -> &EngineInfo {
        &INFO
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(INFO.name),
            format!(
                "https://www.bing.com/images/search?view=detailv2&iss=sbi&q=imgurl:{}",
                urlencoding::encode(image_url)
            ),
        ))
    }
}
