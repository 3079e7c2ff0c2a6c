use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;

use crate::log_store::ChannelLog;
use crate::message::{Message, MessageRef};
use crate::session::Session;

struct ChannelState {
    history: Vec<MessageRef>,
    subscribers: HashMap<u64, Arc<Session>>,
}

/// A single named topic: its subscriber set, its in-memory history, and
/// its durable log. `history` and `subscribers` share one lock so that
/// publish and subscribe are each one atomic step — see `publish` and
/// `subscribe` for why that matters.
pub struct Channel {
    name: String,
    state: RwLock<ChannelState>,
    log: ChannelLog,
}

impl Channel {
    pub fn new(name: String, log_dir: &Path) -> Self {
        let log = ChannelLog::new(log_dir, &name);
        Self {
            name,
            state: RwLock::new(ChannelState {
                history: Vec::new(),
                subscribers: HashMap::new(),
            }),
            log,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seeds in-memory history from a replayed log at startup. Not used
    /// once the server is accepting connections.
    pub fn replay(&self, messages: Vec<Message>) {
        let mut state = self.state.write().unwrap();
        state.history = messages.into_iter().map(Arc::new).collect();
    }

    /// Registers `session` as a subscriber, replays every history message
    /// newer than its last-seen id for this channel, advances that
    /// last-seen id, and builds the `OK SUBSCRIBED` reply — all under one
    /// write lock. Doing it in one step is what prevents a concurrent
    /// publish from landing between the backfill and the subscription
    /// taking effect (it would otherwise risk the new subscriber seeing
    /// the message twice, or not at all).
    ///
    /// Returns the backfill-plus-ack bytes instead of writing them
    /// itself: these can run well past `max_backlog` lines, and the
    /// session's outbound queue is sized for broadcast backpressure, not
    /// for a synchronous reply that must never be truncated. The caller
    /// writes the buffer directly to the socket.
    pub fn subscribe(&self, session: &Arc<Session>) -> Vec<u8> {
        let mut state = self.state.write().unwrap();
        let last_seen = session.last_seen_for(&self.name);

        let mut out = Vec::new();
        let mut delivered_through = last_seen;
        for msg in state.history.iter().filter(|m| m.id > last_seen) {
            out.extend_from_slice(msg.format_msg_line().as_bytes());
            delivered_through = msg.id;
        }
        session.set_last_seen(&self.name, delivered_through);

        state.subscribers.insert(session.id, Arc::clone(session));
        out.extend_from_slice(format!("OK SUBSCRIBED to {}\n", self.name).as_bytes());
        out
    }

    /// Returns true if `id` was actually subscribed.
    pub fn remove_subscriber(&self, id: u64) -> bool {
        self.state.write().unwrap().subscribers.remove(&id).is_some()
    }

    pub fn list_subscriber_ids(&self) -> Vec<u64> {
        self.state.read().unwrap().subscribers.keys().copied().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.read().unwrap().subscribers.len()
    }

    pub fn message_count(&self) -> usize {
        self.state.read().unwrap().history.len()
    }

    pub fn history_snapshot(&self) -> Vec<MessageRef> {
        self.state.read().unwrap().history.clone()
    }

    /// Appends `content` as a new message and fans it out to every
    /// current subscriber, then persists it to the log — all under one
    /// write lock, so the id a message gets and the subscriber set it is
    /// broadcast to are always consistent with each other. Returns the
    /// new message and the subscribers whose outbound queue was full or
    /// already closed; the caller evicts those outside this lock to
    /// avoid acquiring the broker lock while holding this one.
    pub fn publish(&self, content: String) -> (MessageRef, Vec<Arc<Session>>) {
        let mut state = self.state.write().unwrap();

        let id = state.history.len() as u64 + 1;
        let msg = Arc::new(Message {
            id,
            channel: self.name.clone(),
            content,
            timestamp: Utc::now(),
        });
        state.history.push(Arc::clone(&msg));

        let line = msg.format_msg_line();
        let mut offenders = Vec::new();
        for sub in state.subscribers.values() {
            match sub.try_send(line.as_bytes()) {
                Ok(()) => sub.set_last_seen(&self.name, id),
                Err(TrySendError::Full(_)) => {
                    sub.mark_backlog_overflowed();
                    offenders.push(Arc::clone(sub));
                }
                Err(TrySendError::Closed(_)) => offenders.push(Arc::clone(sub)),
            }
        }

        if let Err(e) = self.log.append(&msg) {
            eprintln!(
                "nimbus: failed to persist message {} on channel {}: {e}",
                msg.id, self.name
            );
        }

        drop(state);
        (msg, offenders)
    }

    /// Keeps only the most recent `keep` messages in memory and rewrites
    /// the log to match. Returns the number actually kept (clamped to
    /// however much history exists).
    ///
    /// The rewrite happens with the state write lock still held, the
    /// same as `publish` holds it across `log.append`: releasing the
    /// lock first would let a concurrent publish append a message to
    /// both history and the log in the gap between taking the snapshot
    /// and rewriting the file, and the rewrite would then truncate that
    /// message back out of the log while it stayed in memory.
    pub fn retention(&self, keep: usize) -> io::Result<usize> {
        let mut state = self.state.write().unwrap();
        if keep < state.history.len() {
            let drop_count = state.history.len() - keep;
            state.history.drain(0..drop_count);
        }
        let snapshot = state.history.clone();
        let kept = snapshot.len();
        self.log.rewrite(&snapshot)?;
        Ok(kept)
    }

    pub fn delete_log(&self) -> io::Result<()> {
        self.log.delete()
    }
}
