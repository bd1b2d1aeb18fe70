//! Sequential best-match pass.
//!
//! Engines capable of deep lookups are consulted one at a time, in registry
//! order, so result messages arrive in a deterministic order and the chat
//! transport is never hammered. Results that two engines agree on are posted
//! once; repeats are either skipped or annotated.

use super::gate::GateWaiter;
use super::render::build_reply;
use crate::chat::{chunks, ChatSink, MessageHandle, OperatorChannel, SendOptions};
use crate::engines::{EngineRegistry, SearchMatch};
use crate::text::bold;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, error, warn};

/// Run the best-match pass for one hosted image.
///
/// When `gate` is given, the pass first waits for the fan-out reply to be
/// published.
pub async fn best_match_pass(
    registry: &EngineRegistry,
    sink: &dyn ChatSink,
    operator: &dyn OperatorChannel,
    image_url: &str,
    reply_to: Option<MessageHandle>,
    gate: Option<GateWaiter>,
) -> Result<()> {
    if let Some(mut waiter) = gate {
        waiter.wait().await;
    }

    let mut options = SendOptions::html();
    options.reply_to = reply_to;
    let status = sink
        .send_message("⏳ Searching...", options)
        .await
        .context("cannot post search status")?;

    // dedup state, scoped to this pass only
    let mut seen_identifiers: HashSet<String> = HashSet::new();
    let mut seen_thumbnails: HashSet<String> = HashSet::new();
    let mut consulted: Vec<&'static str> = vec![];
    let mut match_found = false;

    for engine in registry.best_match_engines() {
        debug!("{} searching for {}", engine.name(), image_url);
        if let Err(e) = sink
            .edit_message_text(status, &format!("⏳ {}", bold(engine.name())))
            .await
        {
            warn!("status edit failed: {}", e);
        }

        let lookup = match engine.best_match(image_url).await {
            Ok(lookup) => {
                consulted.push(engine.name());
                lookup
            }
            Err(err) => {
                error!("engine failure: {}: {}", engine.name(), err);
                operator
                    .notify(
                        &format!("Best match error from {}: {}", engine.name(), err),
                        Some(image_url),
                    )
                    .await;
                continue;
            }
        };

        let Some(SearchMatch {
            mut record,
            mut meta,
        }) = lookup
        else {
            continue;
        };
        debug!("{} found something", engine.name());

        let id_seen = meta
            .identifier
            .as_ref()
            .is_some_and(|id| seen_identifiers.contains(id));
        let thumb_seen = meta
            .thumbnail_identifier
            .as_ref()
            .is_some_and(|id| seen_thumbnails.contains(id));

        if id_seen && thumb_seen {
            // nothing new at all, not worth a message
            continue;
        } else if id_seen {
            record.replace_with_marker("Duplicate result omitted");
            meta.thumbnail = None;
        } else if thumb_seen {
            record.push("Duplicate thumbnail omitted", "");
            meta.thumbnail = None;
        }

        let mut buttons = vec![];
        if let Some(more) = engine.search_link(image_url, Some("More")) {
            buttons.push(more);
        }
        buttons.extend(meta.buttons.clone());

        let mut options = SendOptions::html().with_keyboard(chunks(buttons, 3));
        options.reply_to = reply_to;
        options.disable_preview = meta.disable_preview || !meta.errors.is_empty();
        if let Err(err) = sink.send_message(&build_reply(&record, &meta), options).await {
            warn!("result message failed: {}", err);
        }

        if meta.errors.is_empty() && !record.is_empty() && !id_seen && !thumb_seen {
            match_found = true;
        }
        if let Some(id) = &meta.identifier {
            seen_identifiers.insert(id.clone());
        }
        if let Some(id) = &meta.thumbnail_identifier {
            seen_thumbnails.insert(id.clone());
        }
    }

    let names = consulted
        .iter()
        .map(|name| bold(name))
        .collect::<Vec<_>>()
        .join(", ");
    let summary = if match_found {
        format!(
            "🔵 I searched for you on {}. You can try the others above for more results.",
            names
        )
    } else {
        format!(
            "🔴 I searched for you on {} but didn't find anything. Please try another engine above.",
            names
        )
    };
    sink.edit_message_text(status, &summary)
        .await
        .context("cannot post search summary")?;

    Ok(())
}
