//! User-facing command surface.
//!
//! Wires the capability traits together: an inbound attachment is resolved
//! and hosted, then the fan-out pass is spawned in the background while the
//! gated best-match pass runs, both writing to the chat sink.

use crate::chat::{
    Attachment, CallbackCommand, CallbackQuery, ChatSink, MessageHandle, OperatorChannel,
    SendOptions,
};
use crate::config::BotConfig;
use crate::engines::EngineRegistry;
use crate::hosting::{attachment_to_url, AttachmentResolver, ImageHost, ResolveError};
use crate::search::{best_match_pass, fan_out, gate, GateRelease};
use crate::text::field_title;
use anyhow::Result;
use std::sync::Arc;
use tracing::error;

/// Start / help message.
pub const START_TEXT: &str = "Send me an image, sticker, gif or video and I will \
look for it on several reverse image search engines.\n\n\
Use /engines to see what each engine is good at.";

/// Everything one user request needs, built once at startup.
pub struct SearchHandler {
    registry: Arc<EngineRegistry>,
    sink: Arc<dyn ChatSink>,
    resolver: Arc<dyn AttachmentResolver>,
    host: Arc<dyn ImageHost>,
    operator: Arc<dyn OperatorChannel>,
    config: BotConfig,
}

impl SearchHandler {
    pub fn new(
        registry: Arc<EngineRegistry>,
        sink: Arc<dyn ChatSink>,
        resolver: Arc<dyn AttachmentResolver>,
        host: Arc<dyn ImageHost>,
        operator: Arc<dyn OperatorChannel>,
        config: BotConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            resolver,
            host,
            operator,
            config,
        }
    }

    /// `/engines` listing; `more` adds the long descriptions.
    pub fn engines_overview(&self, more: bool) -> String {
        engines_overview(&self.registry, more)
    }

    /// Full search flow for one inbound attachment.
    pub async fn handle_attachment(
        &self,
        attachment: &Attachment,
        message: MessageHandle,
    ) -> Result<()> {
        let mut options = SendOptions::default();
        options.reply_to = Some(message);
        let notice = self.sink.send_message("⌛ Give me a sec...", options).await?;

        let image_url = match attachment_to_url(
            self.resolver.as_ref(),
            self.host.as_ref(),
            attachment,
            self.config.max_video_bytes,
        )
        .await
        {
            Ok(url) => url,
            Err(ResolveError::Unsupported(reason)) => {
                // known-unsupported input, tell the user exactly why
                self.sink.edit_message_text(notice, &reason).await?;
                return Ok(());
            }
            Err(ResolveError::Other(error)) => {
                return self.fail(notice, None, error).await;
            }
        };

        let (release, waiter) = gate();
        self.spawn_fan_out(image_url.clone(), message, release);

        if let Err(error) = best_match_pass(
            &self.registry,
            self.sink.as_ref(),
            self.operator.as_ref(),
            &image_url,
            Some(message),
            Some(waiter),
        )
        .await
        {
            return self.fail(notice, Some(&image_url), error).await;
        }

        self.sink.delete_message(notice).await.ok();
        Ok(())
    }

    /// Pressed inline buttons.
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<()> {
        match CallbackCommand::parse(&query.payload) {
            Some(CallbackCommand::BestMatch(url)) => {
                self.sink.answer_callback(&query.id, None).await.ok();
                best_match_pass(
                    &self.registry,
                    self.sink.as_ref(),
                    self.operator.as_ref(),
                    &url,
                    Some(query.message),
                    None,
                )
                .await
            }
            Some(CallbackCommand::WaitFor(engine_name)) => {
                self.sink
                    .answer_callback(
                        &query.id,
                        Some(&format!("Creating {} search url...", engine_name)),
                    )
                    .await
            }
            None => {
                self.sink
                    .answer_callback(&query.id, Some("Something went wrong"))
                    .await
            }
        }
    }

    fn spawn_fan_out(&self, image_url: String, reply_to: MessageHandle, release: GateRelease) {
        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);
        let operator = Arc::clone(&self.operator);
        let config = self.config.clone();
        tokio::spawn(async move {
            if let Err(error) = fan_out(
                &registry,
                sink.as_ref(),
                &config,
                &image_url,
                Some(reply_to),
                release,
            )
            .await
            {
                error!("fan-out failed: {:#}", error);
                operator
                    .notify(&format!("Fan-out error: {:#}", error), Some(&image_url))
                    .await;
            }
        });
    }

    /// Generic failure path: user gets a short apology, the operator the
    /// whole story.
    async fn fail(
        &self,
        notice: MessageHandle,
        image_url: Option<&str>,
        error: anyhow::Error,
    ) -> Result<()> {
        error!("image search failed: {:#}", error);
        self.sink
            .edit_message_text(notice, "An error occurred, please contact the operator for help.")
            .await
            .ok();
        self.operator
            .notify(&format!("Image search error: {:#}", error), image_url)
            .await;
        Err(error)
    }
}

/// `/engines` listing over any registry.
pub fn engines_overview(registry: &EngineRegistry, more: bool) -> String {
    let mut reply = String::new();
    if !more {
        reply += "To get even more info use /engines more.\n\n";
    }

    for engine in registry.iter() {
        let info = engine.info();
        let mut parts = vec![format!("{}{}", field_title(info.name), info.provider_url)];
        if more {
            parts.push(format!("{}{}", field_title("Description"), info.description));
        }
        if !info.recommendation.is_empty() {
            parts.push(format!(
                "{}\n- {}",
                field_title("Recommended for"),
                info.recommendation.join("\n- ")
            ));
        }
        if !info.types.is_empty() {
            parts.push(format!("{}{}", field_title("Used for"), info.types.join(", ")));
        }
        parts.push(format!(
            "{}{}",
            field_title("Supports best match"),
            if info.supports_best_match { "✅" } else { "❌" }
        ));

        reply += &parts.join("\n");
        reply += "\n\n";
    }

    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::FileRef;
    use crate::testkit::{FakeEngine, NullOperator, RecordingSink};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MemoryHost {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryHost {
        fn new() -> Self {
            Self {
                files: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl ImageHost for MemoryHost {
        async fn file_exists(&self, name: &str) -> Result<bool> {
            Ok(self.files.lock().unwrap().contains_key(name))
        }

        async fn get_url(&self, name: &str) -> Result<String> {
            Ok(format!("https://img.example/{}", name))
        }

        async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
            self.files.lock().unwrap().insert(name.to_string(), bytes);
            self.get_url(name).await
        }
    }

    struct StaticResolver;

    #[async_trait]
    impl AttachmentResolver for StaticResolver {
        async fn fetch_image(&self, _attachment: &Attachment) -> Result<Vec<u8>, ResolveError> {
            Ok(vec![0xff, 0xd8])
        }
    }

    struct BrokenResolver;

    #[async_trait]
    impl AttachmentResolver for BrokenResolver {
        async fn fetch_image(&self, _attachment: &Attachment) -> Result<Vec<u8>, ResolveError> {
            Err(ResolveError::Other(anyhow!("transport download failed")))
        }
    }

    fn handler(
        engines: Vec<FakeEngine>,
        sink: Arc<RecordingSink>,
        operator: Arc<NullOperator>,
        resolver: Arc<dyn AttachmentResolver>,
    ) -> SearchHandler {
        let registry = EngineRegistry::new(
            engines
                .into_iter()
                .map(|engine| Arc::new(engine) as Arc<dyn crate::engines::SearchEngine>)
                .collect(),
        );
        SearchHandler::new(
            Arc::new(registry),
            sink,
            resolver,
            Arc::new(MemoryHost::new()),
            operator,
            BotConfig::default().with_edit_rate(100),
        )
    }

    fn standard_fakes() -> Vec<FakeEngine> {
        vec![
            FakeEngine::sync_link("A"),
            FakeEngine::pre_work("D", Some("https://d.example/r"), 5),
            FakeEngine::with_match("Deep", "id-1", "thumb-1"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_search_flow_orders_messages() {
        let sink = Arc::new(RecordingSink::new());
        let handler = handler(
            standard_fakes(),
            Arc::clone(&sink),
            Arc::new(NullOperator::new()),
            Arc::new(StaticResolver),
        );

        handler
            .handle_attachment(&Attachment::Photo(FileRef::new("ph1")), MessageHandle(900))
            .await
            .unwrap();
        // let the detached fan-out workers drain
        tokio::time::sleep(Duration::from_millis(200)).await;

        // 1 = notice, 2 = fan-out reply, 3 = status, 4 = best-match result
        assert!(sink.message(MessageHandle(1)).deleted);
        let fanout_reply = sink.message(MessageHandle(2));
        assert!(fanout_reply.text.contains("/engines"));
        let labels: Vec<String> = fanout_reply
            .keyboard
            .iter()
            .flatten()
            .map(|button| button.label.clone())
            .collect();
        assert!(labels.contains(&"🔍 Best Match".to_string()));
        assert!(labels.contains(&"D".to_string()));

        assert!(sink.message(MessageHandle(3)).text.starts_with("🔵"));
        assert!(sink
            .message(MessageHandle(4))
            .text
            .contains("<b>Deep</b>"));
    }

    #[tokio::test]
    async fn test_animated_sticker_is_rejected_before_search() {
        let sink = Arc::new(RecordingSink::new());
        let handler = handler(
            standard_fakes(),
            Arc::clone(&sink),
            Arc::new(NullOperator::new()),
            Arc::new(StaticResolver),
        );

        let sticker = Attachment::Sticker {
            file: FileRef::new("st1"),
            animated: true,
        };
        handler
            .handle_attachment(&sticker, MessageHandle(900))
            .await
            .unwrap();

        assert_eq!(sink.sent_count(), 1);
        assert_eq!(
            sink.message(MessageHandle(1)).text,
            "Animated stickers are not supported."
        );
    }

    #[tokio::test]
    async fn test_resolver_failure_reports_to_operator() {
        let sink = Arc::new(RecordingSink::new());
        let operator = Arc::new(NullOperator::new());
        let handler = handler(
            standard_fakes(),
            Arc::clone(&sink),
            Arc::clone(&operator),
            Arc::new(BrokenResolver),
        );

        let result = handler
            .handle_attachment(&Attachment::Photo(FileRef::new("ph1")), MessageHandle(900))
            .await;
        assert!(result.is_err());
        assert_eq!(operator.notifications(), 1);
        assert!(sink
            .message(MessageHandle(1))
            .text
            .contains("An error occurred"));
    }

    #[tokio::test]
    async fn test_best_match_callback_runs_ungated() {
        let sink = Arc::new(RecordingSink::new());
        let handler = handler(
            standard_fakes(),
            Arc::clone(&sink),
            Arc::new(NullOperator::new()),
            Arc::new(StaticResolver),
        );

        handler
            .handle_callback(&CallbackQuery {
                id: "cb1".to_string(),
                payload: "best_match https://img.example/ph1.jpg".to_string(),
                message: MessageHandle(900),
            })
            .await
            .unwrap();

        assert!(sink.message(MessageHandle(1)).text.starts_with("🔵"));
        assert_eq!(sink.answered_callbacks().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_callback_answers_with_notice() {
        let sink = Arc::new(RecordingSink::new());
        let handler = handler(
            standard_fakes(),
            Arc::clone(&sink),
            Arc::new(NullOperator::new()),
            Arc::new(StaticResolver),
        );

        handler
            .handle_callback(&CallbackQuery {
                id: "cb2".to_string(),
                payload: "wait_for TinEye".to_string(),
                message: MessageHandle(900),
            })
            .await
            .unwrap();

        let answers = sink.answered_callbacks();
        assert_eq!(answers, vec!["cb2: Creating TinEye search url...".to_string()]);
    }

    #[tokio::test]
    async fn test_engines_overview_modes() {
        let sink = Arc::new(RecordingSink::new());
        let handler = handler(
            standard_fakes(),
            Arc::clone(&sink),
            Arc::new(NullOperator::new()),
            Arc::new(StaticResolver),
        );

        let short = handler.engines_overview(false);
        assert!(short.contains("To get even more info"));
        assert!(short.contains("<b>A</b>: https://fake.example"));

        let long = handler.engines_overview(true);
        assert!(!long.contains("To get even more info"));
        assert!(long.contains("<b>Description</b>: test engine"));
    }

    #[test]
    fn test_start_text_mentions_engines_command() {
        assert!(START_TEXT.contains("/engines"));
    }
}
