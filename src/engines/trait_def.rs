use super::types::{EngineInfo, EngineError, SearchMatch};
use crate::chat::{Button, CallbackCommand};

/// One reverse-image-search provider integration.
///
/// Engines hold no per-request state; a single instance serves concurrent
/// searches.
#[async_trait::async_trait]
pub trait SearchEngine: Send + Sync {
    fn info(&self) -> &EngineInfo;

    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Templated search link for a hosted image. Pure string work, never
    /// network I/O. `None` when the engine cannot link this image directly.
    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button>;

    /// Immediate stand-in button shown while [`resolve_link`] runs.
    /// `None` for engines that produce their link synchronously.
    ///
    /// [`resolve_link`]: SearchEngine::resolve_link
    fn placeholder_button(&self) -> Option<Button> {
        if !self.info().pre_work {
            return None;
        }
        Some(Button::callback(
            format!("⏳ {}", self.name()),
            &CallbackCommand::WaitFor(self.name().to_string()),
        ))
    }

    /// Network round trip producing the final button for pre-work engines.
    /// Ordinary failures (timeout, no match) resolve to `None`.
    async fn resolve_link(&self, image_url: &str) -> Option<Button> {
        self.search_link(image_url, None)
    }

    /// Deep lookup returning an actual matched image with metadata, for
    /// engines flagged `supports_best_match`. `Ok(None)` means the engine
    /// answered but found nothing.
    async fn best_match(&self, image_url: &str) -> Result<Option<SearchMatch>, EngineError> {
        let _ = image_url;
        Ok(None)
    }
}
