//! Chat transport capabilities.
//!
//! The search core never talks to a concrete chat protocol. Everything it
//! needs from the transport is expressed here as traits and plain data types,
//! implemented elsewhere (console transport, tests, a real bot front-end).

use anyhow::Result;
use async_trait::async_trait;

/// Opaque handle to an outbound message, used for later edits and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub u64);

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Open an external URL
    Link(String),
    /// Send a structured callback payload back to the bot
    Callback(String),
}

/// One clickable option in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Link(url.into()),
        }
    }

    pub fn callback(label: impl Into<String>, command: &CallbackCommand) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(command.to_payload()),
        }
    }
}

/// Button rows as laid out in the reply.
pub type Keyboard = Vec<Vec<Button>>;

/// Split buttons into rows of at most `size`.
pub fn chunks(buttons: Vec<Button>, size: usize) -> Keyboard {
    let mut rows = Vec::new();
    let mut iter = buttons.into_iter().peekable();
    while iter.peek().is_some() {
        rows.push(iter.by_ref().take(size).collect());
    }
    rows
}

/// Per-message send settings.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub keyboard: Option<Keyboard>,
    pub reply_to: Option<MessageHandle>,
    pub html: bool,
    pub disable_preview: bool,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            html: true,
            ..Self::default()
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_reply_to(mut self, handle: MessageHandle) -> Self {
        self.reply_to = Some(handle);
        self
    }

    pub fn without_preview(mut self) -> Self {
        self.disable_preview = true;
        self
    }
}

/// Outbound side of the chat transport.
///
/// Edits must be idempotent and failures must surface as `Err`, never as a
/// silently dropped message.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, text: &str, options: SendOptions) -> Result<MessageHandle>;

    async fn edit_message_text(&self, handle: MessageHandle, text: &str) -> Result<()>;

    async fn edit_message_buttons(&self, handle: MessageHandle, keyboard: &Keyboard) -> Result<()>;

    async fn delete_message(&self, handle: MessageHandle) -> Result<()>;

    async fn send_photo(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle>;

    async fn send_animation(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle>;

    async fn send_document(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle>;

    /// Acknowledge a pressed button, optionally with a short notice.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

/// Best-effort error reporting to a human operator.
///
/// Implementations swallow their own failures; a broken operator channel must
/// never take a user request down with it.
#[async_trait]
pub trait OperatorChannel: Send + Sync {
    async fn notify(&self, message: &str, image_url: Option<&str>);
}

/// Reference to a transport-side file, stable across re-submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Transport-assigned identifier, stable for the same content
    pub unique_id: String,
    /// Size in bytes when the transport reports one
    pub size: Option<u64>,
}

impl FileRef {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Inbound attachment kinds the bot reacts to.
///
/// This is a closed set; anything the transport delivers outside of it never
/// reaches the search flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Photo(FileRef),
    Sticker { file: FileRef, animated: bool },
    Video { file: FileRef, thumbnail: Option<FileRef> },
    Animation(FileRef),
    DocumentVideo { file: FileRef, thumbnail: Option<FileRef> },
}

impl Attachment {
    /// The file the search would start from.
    pub fn file(&self) -> &FileRef {
        match self {
            Attachment::Photo(file) => file,
            Attachment::Sticker { file, .. } => file,
            Attachment::Video { file, .. } => file,
            Attachment::Animation(file) => file,
            Attachment::DocumentVideo { file, .. } => file,
        }
    }
}

/// Parsed inline-button callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCommand {
    /// `best_match <url>` — run the best-match pass for a hosted image
    BestMatch(String),
    /// `wait_for <engineName>` — a pre-work placeholder was pressed
    WaitFor(String),
}

impl CallbackCommand {
    /// Parse a `"<action> <argument>"` payload.
    pub fn parse(payload: &str) -> Option<Self> {
        let (command, argument) = match payload.split_once(' ') {
            Some((command, argument)) => (command, argument.trim()),
            None => (payload, ""),
        };
        match command {
            "best_match" if !argument.is_empty() => Some(Self::BestMatch(argument.to_string())),
            "wait_for" if !argument.is_empty() => Some(Self::WaitFor(argument.to_string())),
            _ => None,
        }
    }

    pub fn to_payload(&self) -> String {
        match self {
            Self::BestMatch(url) => format!("best_match {}", url),
            Self::WaitFor(engine) => format!("wait_for {}", engine),
        }
    }
}

/// A pressed inline button as delivered by the transport.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub payload: String,
    /// Message the pressed keyboard was attached to
    pub message: MessageHandle,
}
