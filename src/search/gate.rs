//! One-shot start signal between the two search passes.
//!
//! The fan-out pass must get its reply on screen before the best-match pass
//! posts anything, so the user always sees the messages in the same order.
//! This is purely an ordering primitive; it protects no data.

use tokio::sync::watch;

/// Create a linked release/wait pair.
pub fn gate() -> (GateRelease, GateWaiter) {
    let (tx, rx) = watch::channel(false);
    (GateRelease { tx }, GateWaiter { rx })
}

/// Releasing side. Firing twice is fine; dropping without firing releases
/// too, so an early error in the holder can never strand the waiter.
pub struct GateRelease {
    tx: watch::Sender<bool>,
}

impl GateRelease {
    pub fn release(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for GateRelease {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// Waiting side. Returns immediately when the gate was already released.
#[derive(Clone)]
pub struct GateWaiter {
    rx: watch::Receiver<bool>,
}

impl GateWaiter {
    pub async fn wait(&mut self) {
        // send_replace fires before the sender can disappear, so the stored
        // value is always observable even after a drop-release.
        let _ = self.rx.wait_for(|released| *released).await;
    }
}
