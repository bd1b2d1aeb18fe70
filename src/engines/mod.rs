pub mod types;
pub mod trait_def;
pub mod services;

pub use types::{EngineError, EngineInfo, ResultMeta, ResultRecord, SearchMatch};
pub use trait_def::SearchEngine;

use crate::config::BotConfig;
use anyhow::Result;
use std::sync::Arc;

/// Fixed, ordered set of search engines.
///
/// Built once at startup and shared read-only by both search passes. The
/// order here is the order of help text and button layout.
pub struct EngineRegistry {
    engines: Vec<Arc<dyn SearchEngine>>,
}

impl EngineRegistry {
    pub fn new(engines: Vec<Arc<dyn SearchEngine>>) -> Self {
        Self { engines }
    }

    /// The standard engine set, in display order.
    pub fn standard(config: &BotConfig) -> Result<Self> {
        let timeout = config.timeout_secs;
        Ok(Self::new(vec![
            Arc::new(services::google::GoogleEngine::new()),
            Arc::new(services::bing::BingEngine::new()),
            Arc::new(services::yandex::YandexEngine::new()),
            Arc::new(services::iqdb::IqdbEngine::new(timeout)?),
            Arc::new(services::saucenao::SauceNaoEngine::new(
                timeout,
                config.saucenao_api_key.clone(),
            )?),
            Arc::new(services::tineye::TinEyeEngine::new(timeout)?),
            Arc::new(services::trace::TraceEngine::new(timeout)?),
        ]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SearchEngine>> {
        self.engines.iter()
    }

    /// Engines that can answer a deep best-match lookup.
    pub fn best_match_engines(&self) -> impl Iterator<Item = &Arc<dyn SearchEngine>> {
        self.engines
            .iter()
            .filter(|engine| engine.info().supports_best_match)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SearchEngine>> {
        self.engines.iter().find(|engine| engine.name() == name)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
