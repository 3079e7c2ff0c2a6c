use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::session::Session;

/// The top-level registry: channels by name, connected clients by
/// session id, and each client's last-heartbeat timestamp. Mirrors the
/// registry pattern used for collections elsewhere in this codebase,
/// generalized to three maps instead of one.
///
/// Locking rule: the broker's locks are never held while acquiring a
/// channel's lock. Operations that touch both (like `unregister`) take
/// a snapshot of the channel list under the broker lock, release it,
/// then operate on each channel individually.
pub struct Broker {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    clients: RwLock<HashMap<u64, Arc<Session>>>,
    heartbeats: RwLock<HashMap<u64, Arc<AtomicI64>>>,
    next_id: AtomicU64,
    log_dir: PathBuf,
    max_backlog: usize,
}

impl Broker {
    pub fn new(log_dir: PathBuf, max_backlog: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
            heartbeats: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            log_dir,
            max_backlog,
        }
    }

    pub fn max_backlog(&self) -> usize {
        self.max_backlog
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get_or_create_channel(&self, name: &str) -> Arc<Channel> {
        if let Some(ch) = self.channels.read().unwrap().get(name) {
            return Arc::clone(ch);
        }
        let mut channels = self.channels.write().unwrap();
        Arc::clone(
            channels
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Channel::new(name.to_string(), &self.log_dir))),
        )
    }

    pub fn find_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().unwrap().get(name).cloned()
    }

    pub fn remove_channel(&self, name: &str) -> Result<Arc<Channel>> {
        self.channels
            .write()
            .unwrap()
            .remove(name)
            .ok_or(Error::ChannelNotFound)
    }

    pub fn list_channel_names(&self) -> Vec<String> {
        self.channels.read().unwrap().keys().cloned().collect()
    }

    pub fn register(&self, session: Arc<Session>) {
        let id = session.id;
        self.clients.write().unwrap().insert(id, session);
        self.heartbeats
            .write()
            .unwrap()
            .insert(id, Arc::new(AtomicI64::new(now_millis())));
    }

    /// Removes a client from every map, including every channel's
    /// subscriber set. Safe to call more than once for the same id.
    pub fn unregister(&self, id: u64) {
        self.clients.write().unwrap().remove(&id);
        self.heartbeats.write().unwrap().remove(&id);

        let channels: Vec<Arc<Channel>> = self.channels.read().unwrap().values().cloned().collect();
        for ch in channels {
            ch.remove_subscriber(id);
        }
    }

    pub fn touch(&self, id: u64) {
        if let Some(hb) = self.heartbeats.read().unwrap().get(&id) {
            hb.store(now_millis(), Ordering::Relaxed);
        }
    }

    /// Milliseconds-since-epoch of the last touch, or `None` if the
    /// session has already been unregistered.
    pub fn last_heartbeat(&self, id: u64) -> Option<i64> {
        self.heartbeats
            .read()
            .unwrap()
            .get(&id)
            .map(|hb| hb.load(Ordering::Relaxed))
    }

    /// Closes and unregisters every offending session. Called outside
    /// any channel lock, per the locking rule above.
    pub fn evict(&self, offenders: &[Arc<Session>]) {
        for session in offenders {
            eprintln!(
                "nimbus: evicting session {} ({}): backlog exceeded",
                session.id, session.remote_addr
            );
            session.close();
            self.unregister(session.id);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
