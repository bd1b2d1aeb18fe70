//! In-memory fakes shared by the unit tests.

use crate::chat::{Button, ChatSink, Keyboard, MessageHandle, OperatorChannel, SendOptions};
use crate::engines::trait_def::SearchEngine;
use crate::engines::types::{EngineError, EngineInfo, ResultMeta, ResultRecord, SearchMatch};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Snapshot of one message held by the [`RecordingSink`].
#[derive(Debug, Clone, Default)]
pub struct FakeMessage {
    pub text: String,
    pub keyboard: Keyboard,
    pub deleted: bool,
}

#[derive(Default)]
struct SinkState {
    next_id: u64,
    messages: HashMap<u64, FakeMessage>,
    first_keyboards: HashMap<u64, Keyboard>,
    keyboard_edits: HashMap<u64, usize>,
    sent: usize,
    answered_callbacks: Vec<String>,
}

/// Chat sink that records everything and supports edits like a real
/// transport would.
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self, handle: MessageHandle) -> FakeMessage {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(&handle.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Keyboard as first published, before any edit.
    pub fn first_keyboard(&self, handle: MessageHandle) -> Option<Keyboard> {
        self.state
            .lock()
            .unwrap()
            .first_keyboards
            .get(&handle.0)
            .cloned()
    }

    pub fn edit_count(&self, handle: MessageHandle) -> usize {
        self.state
            .lock()
            .unwrap()
            .keyboard_edits
            .get(&handle.0)
            .copied()
            .unwrap_or(0)
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent
    }

    pub fn answered_callbacks(&self) -> Vec<String> {
        self.state.lock().unwrap().answered_callbacks.clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send_message(&self, text: &str, options: SendOptions) -> Result<MessageHandle> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.sent += 1;
        let id = state.next_id;
        let keyboard = options.keyboard.unwrap_or_default();
        state.first_keyboards.insert(id, keyboard.clone());
        state.messages.insert(
            id,
            FakeMessage {
                text: text.to_string(),
                keyboard,
                deleted: false,
            },
        );
        Ok(MessageHandle(id))
    }

    async fn edit_message_text(&self, handle: MessageHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&handle.0)
            .ok_or_else(|| anyhow!("no such message: {:?}", handle))?;
        message.text = text.to_string();
        Ok(())
    }

    async fn edit_message_buttons(&self, handle: MessageHandle, keyboard: &Keyboard) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&handle.0)
            .ok_or_else(|| anyhow!("no such message: {:?}", handle))?;
        message.keyboard = keyboard.clone();
        *state.keyboard_edits.entry(handle.0).or_insert(0) += 1;
        Ok(())
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&handle.0)
            .ok_or_else(|| anyhow!("no such message: {:?}", handle))?;
        message.deleted = true;
        Ok(())
    }

    async fn send_photo(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle> {
        self.send_message(
            &format!("[photo {}] {}", url, caption.unwrap_or("")),
            SendOptions::default(),
        )
        .await
    }

    async fn send_animation(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle> {
        self.send_message(
            &format!("[animation {}] {}", url, caption.unwrap_or("")),
            SendOptions::default(),
        )
        .await
    }

    async fn send_document(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle> {
        self.send_message(
            &format!("[document {}] {}", url, caption.unwrap_or("")),
            SendOptions::default(),
        )
        .await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .answered_callbacks
            .push(format!("{}: {}", callback_id, text.unwrap_or("")));
        Ok(())
    }
}

/// Operator channel that only counts notifications.
#[derive(Default)]
pub struct NullOperator {
    count: AtomicUsize,
}

impl NullOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorChannel for NullOperator {
    async fn notify(&self, _message: &str, _image_url: Option<&str>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

enum BestMatchBehavior {
    Unsupported,
    NoMatch,
    Match { identifier: String, thumbnail: String },
    Fail,
}

/// Scriptable engine for orchestration tests.
pub struct FakeEngine {
    info: EngineInfo,
    resolve_to: Option<String>,
    resolve_delay_ms: u64,
    panic_on_resolve: bool,
    behavior: BestMatchBehavior,
    calls: Arc<AtomicUsize>,
}

impl FakeEngine {
    fn base(name: &str, supports_best_match: bool, pre_work: bool) -> Self {
        let name: &'static str = Box::leak(name.to_string().into_boxed_str());
        Self {
            info: EngineInfo {
                name,
                provider_url: "https://fake.example",
                description: "test engine",
                recommendation: &[],
                types: &[],
                supports_best_match,
                pre_work,
            },
            resolve_to: None,
            resolve_delay_ms: 0,
            panic_on_resolve: false,
            behavior: BestMatchBehavior::Unsupported,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Plain synchronous-link engine.
    pub fn sync_link(name: &str) -> Self {
        Self::base(name, false, false)
    }

    /// Pre-work engine resolving to `resolve_to` after `delay_ms`.
    pub fn pre_work(name: &str, resolve_to: Option<&str>, delay_ms: u64) -> Self {
        let mut engine = Self::base(name, false, true);
        engine.resolve_to = resolve_to.map(|url| url.to_string());
        engine.resolve_delay_ms = delay_ms;
        engine
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_resolve = true;
        self
    }

    /// Best-match engine always returning the same match.
    pub fn with_match(name: &str, identifier: &str, thumbnail: &str) -> Self {
        let mut engine = Self::base(name, true, false);
        engine.behavior = BestMatchBehavior::Match {
            identifier: identifier.to_string(),
            thumbnail: thumbnail.to_string(),
        };
        engine
    }

    /// Best-match engine that answers but finds nothing.
    pub fn with_no_match(name: &str) -> Self {
        let mut engine = Self::base(name, true, false);
        engine.behavior = BestMatchBehavior::NoMatch;
        engine
    }

    /// Best-match engine whose lookup always errors.
    pub fn failing(name: &str) -> Self {
        let mut engine = Self::base(name, true, false);
        engine.behavior = BestMatchBehavior::Fail;
        engine
    }

    pub fn best_match_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SearchEngine for FakeEngine {
    fn info(&self) -> &EngineInfo {
        &self.info
    }

    fn search_link(&self, image_url: &str, label: Option<&str>) -> Option<Button> {
        Some(Button::link(
            label.unwrap_or(self.info.name),
            format!(
                "https://fake.example/{}?url={}",
                self.info.name,
                urlencoding::encode(image_url)
            ),
        ))
    }

    async fn resolve_link(&self, _image_url: &str) -> Option<Button> {
        if self.panic_on_resolve {
            panic!("engine bug");
        }
        if self.resolve_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.resolve_delay_ms)).await;
        }
        self.resolve_to
            .as_ref()
            .map(|url| Button::link(self.info.name, url))
    }

    async fn best_match(&self, _image_url: &str) -> Result<Option<SearchMatch>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            BestMatchBehavior::Unsupported | BestMatchBehavior::NoMatch => Ok(None),
            BestMatchBehavior::Fail => Err(EngineError::Provider("synthetic failure".to_string())),
            BestMatchBehavior::Match {
                identifier,
                thumbnail,
            } => {
                let mut record = ResultRecord::new();
                record.push("Title", format!("{} result", self.info.name));

                let mut meta = ResultMeta::new(self.info.name, self.info.provider_url);
                meta.similarity = Some(90);
                meta.thumbnail = Some(format!("https://t.example/{}.jpg", thumbnail));
                meta.identifier = Some(identifier.clone());
                meta.thumbnail_identifier = Some(thumbnail.clone());

                Ok(Some(SearchMatch { record, meta }))
            }
        }
    }
}
