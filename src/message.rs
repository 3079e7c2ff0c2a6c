use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

/// An immutable, durably-numbered event on a channel. Once constructed a
/// `Message` never changes — `Channel::publish` is the only place new ones
/// come into existence, and its id assignment is what gives callers
/// dense, monotonic ids per channel.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub channel: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Wire format used by SUBSCRIBE backfill and live broadcast:
    /// `MSG #<id> <channel> <YYYY-MM-DD HH:MM:SS.ffffff> <content>\n`
    pub fn format_msg_line(&self) -> String {
        format!(
            "MSG #{} {} {} {}\n",
            self.id,
            self.channel,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.content
        )
    }

    /// Wire format used by FETCH and GET, which render the timestamp as
    /// RFC3339Nano instead of the custom SUBSCRIBE format.
    pub fn format_fetch_line(&self) -> String {
        format!(
            "MSG #{} {} {} {}\n",
            self.id,
            self.channel,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.content
        )
    }

    /// On-disk log line: `id|timestamp|channel|content\n`, timestamp as
    /// RFC3339Nano so it round-trips through `DateTime::parse_from_rfc3339`.
    pub fn to_log_line(&self) -> String {
        format!(
            "{}|{}|{}|{}\n",
            self.id,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.channel,
            self.content
        )
    }
}

pub type MessageRef = Arc<Message>;
