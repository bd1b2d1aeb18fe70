//! Concurrent fan-out pass.
//!
//! Every engine is asked for a quick clickable action against one hosted
//! image. Synchronous engines answer inline; pre-work engines run on a
//! bounded worker pool while a placeholder button holds their spot. The
//! reply goes out immediately and its keyboard is re-edited as each worker
//! finishes, in arrival order.

use super::gate::GateRelease;
use crate::chat::{chunks, Button, CallbackCommand, ChatSink, Keyboard, MessageHandle, SendOptions};
use crate::config::BotConfig;
use crate::engines::EngineRegistry;
use anyhow::{Context, Result};
use futures::FutureExt;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Run the fan-out pass for one hosted image.
///
/// The gate is released right after the first publish; if anything fails
/// before that, dropping `release` unblocks the best-match pass anyway.
pub async fn fan_out(
    registry: &EngineRegistry,
    sink: &dyn ChatSink,
    config: &BotConfig,
    image_url: &str,
    reply_to: Option<MessageHandle>,
    release: GateRelease,
) -> Result<()> {
    let default_rows: Keyboard = vec![
        vec![Button::callback(
            "🔍 Best Match",
            &CallbackCommand::BestMatch(image_url.to_string()),
        )],
        vec![Button::link("🖼 Go To Image", image_url)],
    ];

    // One slot per engine, in registry order. Completions address their slot
    // by index, so the final layout is the same no matter who finishes first.
    let mut slots: Vec<Option<Button>> = Vec::with_capacity(registry.len());
    let mut workers: JoinSet<(usize, Option<Button>)> = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(config.fan_out_concurrency));

    for engine in registry.iter() {
        if engine.info().pre_work {
            if let Some(placeholder) = engine.placeholder_button() {
                let slot = slots.len();
                slots.push(Some(placeholder));

                let engine = Arc::clone(engine);
                let semaphore = Arc::clone(&semaphore);
                let url = image_url.to_string();
                workers.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return (slot, None),
                    };
                    // a panicking engine counts as "declines", nothing more
                    let button = AssertUnwindSafe(engine.resolve_link(&url))
                        .catch_unwind()
                        .await
                        .unwrap_or(None);
                    (slot, button)
                });
                continue;
            }
        }
        slots.push(engine.search_link(image_url, None));
    }

    let mut options = SendOptions::html().with_keyboard(compose(&default_rows, &slots));
    options.reply_to = reply_to;
    let handle = sink
        .send_message(
            "Use /engines for an overview of the supported engines and what they are good at.",
            options,
        )
        .await
        .context("fan-out initial reply failed")?;

    // First publish is done, the best-match pass may start.
    release.release();

    let edit_limiter = RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(config.edits_per_sec).unwrap_or(NonZeroU32::MIN),
    ));

    while let Some(joined) = workers.join_next().await {
        let (slot, button) = match joined {
            Ok(result) => result,
            Err(error) => {
                // join errors carry no slot; the placeholder stays, which
                // the user can still press for a status notice
                warn!("fan-out worker vanished: {}", error);
                continue;
            }
        };

        debug!(slot, resolved = button.is_some(), "fan-out completion");
        slots[slot] = button;

        edit_limiter.until_ready().await;
        if let Err(error) = sink
            .edit_message_buttons(handle, &compose(&default_rows, &slots))
            .await
        {
            warn!("keyboard edit failed: {}", error);
        }
    }

    Ok(())
}

/// Leading action rows plus the engine buttons, two per row.
fn compose(default_rows: &Keyboard, slots: &[Option<Button>]) -> Keyboard {
    let buttons: Vec<Button> = slots.iter().flatten().cloned().collect();
    let mut keyboard = default_rows.clone();
    keyboard.extend(chunks(buttons, 2));
    keyboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::gate::gate;
    use crate::testkit::{FakeEngine, RecordingSink};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn registry(engines: Vec<FakeEngine>) -> EngineRegistry {
        EngineRegistry::new(
            engines
                .into_iter()
                .map(|engine| Arc::new(engine) as Arc<dyn crate::engines::SearchEngine>)
                .collect(),
        )
    }

    fn labels(keyboard: &Keyboard) -> Vec<String> {
        keyboard
            .iter()
            .flatten()
            .map(|button| button.label.clone())
            .collect()
    }

    fn config() -> BotConfig {
        // high edit rate so the limiter never sleeps in tests
        BotConfig::default().with_edit_rate(100)
    }

    async fn run(registry: &EngineRegistry, sink: &RecordingSink) {
        let (release, _waiter) = gate();
        fan_out(registry, sink, &config(), "https://host/x.jpg", None, release)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_and_final_button_counts() {
        // 3 sync engines, 2 pre-work: one resolves, one declines
        let registry = registry(vec![
            FakeEngine::sync_link("A"),
            FakeEngine::sync_link("B"),
            FakeEngine::sync_link("C"),
            FakeEngine::pre_work("D", Some("https://d.example/r"), 10),
            FakeEngine::pre_work("E", None, 30),
        ]);
        let sink = RecordingSink::new();
        run(&registry, &sink).await;

        let message = sink.message(MessageHandle(1));
        // initial: 2 default rows + 5 engine buttons; final: E dropped out
        let initial = labels(sink.first_keyboard(MessageHandle(1)).as_ref().unwrap());
        assert_eq!(initial.len(), 2 + 5);
        assert!(initial.contains(&"⏳ D".to_string()));
        assert!(initial.contains(&"⏳ E".to_string()));

        let final_labels = labels(&message.keyboard);
        assert_eq!(final_labels.len(), 2 + 4);
        assert!(final_labels.contains(&"D".to_string()));
        assert!(!final_labels.iter().any(|label| label.contains('E')));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_does_not_change_final_keyboard() {
        let sink_fast_first = RecordingSink::new();
        run(
            &registry(vec![
                FakeEngine::sync_link("A"),
                FakeEngine::pre_work("D", Some("https://d.example/r"), 5),
                FakeEngine::pre_work("E", Some("https://e.example/r"), 50),
            ]),
            &sink_fast_first,
        )
        .await;

        let sink_slow_first = RecordingSink::new();
        run(
            &registry(vec![
                FakeEngine::sync_link("A"),
                FakeEngine::pre_work("D", Some("https://d.example/r"), 50),
                FakeEngine::pre_work("E", Some("https://e.example/r"), 5),
            ]),
            &sink_slow_first,
        )
        .await;

        assert_eq!(
            sink_fast_first.message(MessageHandle(1)).keyboard,
            sink_slow_first.message(MessageHandle(1)).keyboard,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_released_after_first_publish() {
        let registry = registry(vec![
            FakeEngine::sync_link("A"),
            FakeEngine::pre_work("D", Some("https://d.example/r"), 1_000),
        ]);
        let sink = RecordingSink::new();
        let (release, mut waiter) = gate();

        let cfg = config();
        let fanout = fan_out(
            &registry,
            &sink,
            &cfg,
            "https://host/x.jpg",
            None,
            release,
        );
        // the gate must open even while the slow worker is still pending
        let (fanout_result, wait_result) = tokio::join!(fanout, async {
            timeout(Duration::from_millis(500), waiter.wait()).await
        });
        fanout_result.unwrap();
        wait_result.expect("gate should release on first publish");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_engine_counts_as_decline() {
        let registry = registry(vec![
            FakeEngine::sync_link("A"),
            FakeEngine::pre_work("D", Some("https://d.example/r"), 5).panicking(),
        ]);
        let sink = RecordingSink::new();
        run(&registry, &sink).await;

        let final_labels = labels(&sink.message(MessageHandle(1)).keyboard);
        assert_eq!(final_labels.len(), 2 + 1);
        assert!(!final_labels.iter().any(|label| label.contains('D')));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_only_registry_sends_once_and_never_edits() {
        let registry = registry(vec![
            FakeEngine::sync_link("A"),
            FakeEngine::sync_link("B"),
        ]);
        let sink = RecordingSink::new();
        run(&registry, &sink).await;
        assert_eq!(sink.edit_count(MessageHandle(1)), 0);
    }
}
