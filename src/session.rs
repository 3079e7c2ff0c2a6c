use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// A connected client. One `Session` is shared between the broker's
/// client map and every channel the client is subscribed to — there is
/// no single owner, so liveness is arbitrated by the broker: once
/// `Broker::unregister` drops its entry, the connection task tears down
/// and stale references left in a channel's subscriber set fail their
/// next `try_send` and get lazily reaped.
pub struct Session {
    pub id: u64,
    pub remote_addr: String,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    last_seen: Mutex<HashMap<String, u64>>,
    backlog_overflowed: AtomicBool,
    close: Notify,
}

impl Session {
    pub fn new(id: u64, remote_addr: String, outbound_tx: mpsc::Sender<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            id,
            remote_addr,
            outbound_tx,
            last_seen: Mutex::new(HashMap::new()),
            backlog_overflowed: AtomicBool::new(false),
            close: Notify::new(),
        })
    }

    /// Non-blocking write attempt into this session's outbound queue.
    /// `Full` means the backlog limit has been exceeded; `Closed` means
    /// the connection task already tore down.
    pub fn try_send(&self, data: &[u8]) -> Result<(), TrySendError<Vec<u8>>> {
        self.outbound_tx.try_send(data.to_vec())
    }

    pub fn last_seen_for(&self, channel: &str) -> u64 {
        *self.last_seen.lock().unwrap().get(channel).unwrap_or(&0)
    }

    pub fn set_last_seen(&self, channel: &str, id: u64) {
        self.last_seen.lock().unwrap().insert(channel.to_string(), id);
    }

    pub fn clear_last_seen(&self, channel: &str) {
        self.last_seen.lock().unwrap().remove(channel);
    }

    pub fn mark_backlog_overflowed(&self) {
        self.backlog_overflowed.store(true, Ordering::Relaxed);
    }

    pub fn backlog_overflowed(&self) -> bool {
        self.backlog_overflowed.load(Ordering::Relaxed)
    }

    /// Forces the owning connection task to tear down, closing the
    /// socket. Safe to call more than once and safe to call after the
    /// connection task has already exited.
    pub fn close(&self) {
        self.close.notify_one();
    }

    pub async fn closed(&self) {
        self.close.notified().await;
    }
}
