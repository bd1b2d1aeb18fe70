use crate::chat::Button;
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::EngineInfo;

const INFO: EngineInfo = EngineInfo {
    name: "Yandex",
    provider_url: "https://yandex.com",
    description: "Strong at faces, locations and cropped or edited images.",
    recommendation: &["Faces", "Locations", "Edited images"],
    types: &["All-purpose"],
    supports_best_match: false,
    pre_work: false,
};

pub struct YandexEngine;

impl YandexEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SearchEngine for YandexEngine {
    fn info(&self) -> &EngineInfo {
        &INFO
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(INFO.name),
            format!(
                "https://yandex.com/images/search?rpt=imageview&url={}",
                urlencoding::encode(image_url)
            ),
        ))
    }
}
