use std::sync::Arc;
use std::time::Duration;

use crate::broker::Broker;
use crate::session::Session;

/// One of these is spawned per accepted connection. It wakes on a fixed
/// tick, checks the broker's last-heartbeat entry for this session, and
/// either exits quietly (the session is already gone) or evicts the
/// connection for having gone idle too long.
pub async fn supervise(broker: Arc<Broker>, session: Arc<Session>, interval: Duration, timeout: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately; skip so the first real check is one interval out

    loop {
        ticker.tick().await;

        let Some(last) = broker.last_heartbeat(session.id) else {
            return;
        };

        let elapsed_ms = chrono::Utc::now().timestamp_millis() - last;
        if elapsed_ms >= timeout.as_millis() as i64 {
            eprintln!(
                "nimbus: heartbeat timeout for session {} ({}), disconnecting",
                session.id, session.remote_addr
            );
            session.close();
            broker.unregister(session.id);
            return;
        }
    }
}
