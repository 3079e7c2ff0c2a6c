use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::broker::Broker;
use crate::command::Command;
use crate::session::Session;

/// Dispatches one already-tokenized line of input, writing its reply (if
/// any) directly to `writer`. Replies are written here rather than
/// queued onto the session's outbound `mpsc` channel: that channel is
/// sized to `max_backlog` and exists purely as a broadcast backpressure
/// signal for slow subscribers, and a FETCH/GET/SUBSCRIBE reply can
/// legitimately be longer than that — routing it through the same
/// bounded queue would silently truncate it (and the eviction it would
/// trigger has nothing to do with this client being slow). `writer` is
/// owned by the same connection task that reads commands, so these
/// writes and any backlog-queue drains the task does afterward stay in
/// the order they were produced.
pub async fn dispatch<W: AsyncWrite + Unpin>(
    broker: &Arc<Broker>,
    session: &Arc<Session>,
    line: &str,
    writer: &mut W,
) {
    let command = match Command::parse(line) {
        Ok(c) => c,
        Err(msg) => {
            reply(writer, &format!("ERR {msg}\n")).await;
            return;
        }
    };

    match command {
        Command::Subscribe { channel } => {
            let ch = broker.get_or_create_channel(&channel);
            let out = ch.subscribe(session);
            let _ = writer.write_all(&out).await;
        }

        Command::Unsubscribe { channel } => match broker.find_channel(&channel) {
            Some(ch) if ch.remove_subscriber(session.id) => {
                session.clear_last_seen(&channel);
                reply(writer, &format!("OK UNSUBSCRIBED TO {channel}\n")).await;
            }
            _ => reply(writer, &format!("ERR not subscribed to {channel}\n")).await,
        },

        Command::Publish { channel, content } => {
            let broker = Arc::clone(broker);
            let _ = tokio::task::spawn_blocking(move || {
                let ch = broker.get_or_create_channel(&channel);
                let (_, offenders) = ch.publish(content);
                broker.evict(&offenders);
            })
            .await;
        }

        Command::Fetch { channel } => {
            let ch = broker.get_or_create_channel(&channel);
            let history = ch.history_snapshot();
            let mut out = String::new();
            for msg in &history {
                out.push_str(&msg.format_fetch_line());
            }
            out.push_str(&format!("OK FETCHED {} messages\n", history.len()));
            reply(writer, &out).await;
        }

        Command::Get { channel, last_id_raw } => {
            let Some(ch) = broker.find_channel(&channel) else {
                reply(writer, "ERR channel doesn't exist\n").await;
                return;
            };
            let last_id: u64 = match last_id_raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    reply(writer, "ERR GET invalid last id\n").await;
                    return;
                }
            };
            let matching: Vec<_> = ch
                .history_snapshot()
                .into_iter()
                .filter(|m| m.id > last_id)
                .collect();
            let mut out = String::new();
            for msg in &matching {
                out.push_str(&msg.format_msg_line());
            }
            out.push_str(&format!("OK GOT {} messages\n", matching.len()));
            reply(writer, &out).await;
        }

        Command::List => {
            let names = broker.list_channel_names();
            let mut out = String::new();
            for name in &names {
                out.push_str(&format!("CH {name}\n"));
            }
            out.push_str(&format!("OK LISTED {} channels\n", names.len()));
            reply(writer, &out).await;
        }

        Command::Info { channel } => {
            let ch = broker.get_or_create_channel(&channel);
            let out = format!(
                "SUBSCRIBERS {}\nMESSAGES {}\n",
                ch.subscriber_count(),
                ch.message_count()
            );
            reply(writer, &out).await;
        }

        Command::Delete { channel } => match broker.remove_channel(&channel) {
            Ok(ch) => {
                let subscribers = ch.list_subscriber_ids().len();
                if subscribers > 0 {
                    eprintln!(
                        "nimbus: deleting channel {channel} drops {subscribers} subscriber(s)"
                    );
                }
                if let Err(e) = ch.delete_log() {
                    eprintln!("nimbus: failed to delete log for {channel}: {e}");
                }
                reply(writer, &format!("OK DELETED {channel}\n")).await;
            }
            Err(_) => reply(writer, "ERR channel doesn't exist\n").await,
        },

        Command::Retention { channel, count_raw } => {
            let Some(ch) = broker.find_channel(&channel) else {
                reply(writer, "ERR channel doesn't exist\n").await;
                return;
            };
            let count: i64 = match count_raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    reply(writer, "ERR RETENTION invalid messages count\n").await;
                    return;
                }
            };
            if count <= 0 {
                reply(writer, "ERR RETENTION messages count has to be positive number\n").await;
                return;
            }
            let keep = count as usize;
            let channel_for_reply = channel.clone();
            let result = tokio::task::spawn_blocking(move || ch.retention(keep)).await;
            match result {
                Ok(Ok(kept)) => reply(writer, &format!("OK RETENTION {channel_for_reply} {kept}\n")).await,
                _ => reply(writer, "ERR RETENTION server error\n").await,
            }
        }

        Command::Ping => reply(writer, "PONG\n").await,

        Command::Whoami => reply(writer, &format!("YOU ARE {}\n", session.remote_addr)).await,
    }
}

async fn reply<W: AsyncWrite + Unpin>(writer: &mut W, s: &str) {
    let _ = writer.write_all(s.as_bytes()).await;
}
