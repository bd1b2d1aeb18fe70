//! Console chat transport for local runs and smoke testing.
//!
//! Messages are printed to stdout with their handle so edits and deletes are
//! visible as they happen.

use crate::chat::{ButtonAction, ChatSink, Keyboard, MessageHandle, OperatorChannel, SendOptions};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Drop HTML tags and unescape entities for terminal display.
pub fn strip_html(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for character in text.chars() {
        match character {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => plain.push(c),
            _ => {}
        }
    }
    plain
        .replace("&#8203;", "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub struct ConsoleSink {
    next_id: AtomicU64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
        }
    }

    fn print_keyboard(keyboard: &Keyboard) {
        for row in keyboard {
            let rendered: Vec<String> = row
                .iter()
                .map(|button| match &button.action {
                    ButtonAction::Link(url) => format!("[{} -> {}]", button.label, url),
                    ButtonAction::Callback(payload) => format!("[{} ({})]", button.label, payload),
                })
                .collect();
            println!("    {}", rendered.join(" "));
        }
    }
}

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn send_message(&self, text: &str, options: SendOptions) -> Result<MessageHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        println!("💬 #{}: {}", id, strip_html(text));
        if let Some(keyboard) = &options.keyboard {
            Self::print_keyboard(keyboard);
        }
        Ok(MessageHandle(id))
    }

    async fn edit_message_text(&self, handle: MessageHandle, text: &str) -> Result<()> {
        println!("✏️  #{}: {}", handle.0, strip_html(text));
        Ok(())
    }

    async fn edit_message_buttons(&self, handle: MessageHandle, keyboard: &Keyboard) -> Result<()> {
        println!("✏️  #{} keyboard:", handle.0);
        Self::print_keyboard(keyboard);
        Ok(())
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<()> {
        println!("🗑  #{}", handle.0);
        Ok(())
    }

    async fn send_photo(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        println!("🖼  #{}: {} {}", id, url, caption.unwrap_or(""));
        Ok(MessageHandle(id))
    }

    async fn send_animation(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle> {
        self.send_photo(url, caption).await
    }

    async fn send_document(&self, url: &str, caption: Option<&str>) -> Result<MessageHandle> {
        self.send_photo(url, caption).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        println!("🔔 {}: {}", callback_id, text.unwrap_or(""));
        Ok(())
    }
}

/// Operator channel that lands in the process log.
pub struct TracingOperatorChannel;

#[async_trait]
impl OperatorChannel for TracingOperatorChannel {
    async fn notify(&self, message: &str, image_url: Option<&str>) {
        match image_url {
            Some(url) => warn!("operator notice: {} (image: {})", message, url),
            None => warn!("operator notice: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<b>IQDB</b>: <code>92%</code> &amp; more"),
            "IQDB: 92% & more"
        );
        assert_eq!(strip_html("<a href=\"u\">&#8203;</a>text"), "text");
    }

    #[tokio::test]
    async fn test_handles_increment() {
        let sink = ConsoleSink::new();
        let first = sink
            .send_message("one", SendOptions::default())
            .await
            .unwrap();
        let second = sink
            .send_message("two", SendOptions::default())
            .await
            .unwrap();
        assert_eq!(first, MessageHandle(1));
        assert_eq!(second, MessageHandle(2));
    }
}
