use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::message::Message;

/// Parses one `id|timestamp|channel|content` log line. Returns `None`
/// (rather than an error) on anything malformed — replay skips bad lines
/// instead of aborting the whole file.
fn parse_log_line(line: &str) -> Option<Message> {
    let mut parts = line.splitn(4, '|');
    let id = parts.next()?.parse::<u64>().ok()?;
    let timestamp = DateTime::parse_from_rfc3339(parts.next()?)
        .ok()?
        .with_timezone(&Utc);
    let channel = parts.next()?.to_string();
    let content = parts.next()?.to_string();
    Some(Message {
        id,
        channel,
        content,
        timestamp,
    })
}

/// Scans `dir` for `<channel>.log` files and parses each into its
/// in-order message history. Missing `dir` yields an empty map rather
/// than an error — a first run has no logs yet.
pub fn replay_all(dir: &Path) -> Result<HashMap<String, Vec<Message>>> {
    let mut out = HashMap::new();
    if !dir.exists() {
        return Ok(out);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        let channel = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let raw = fs::read_to_string(&path)?;
        let mut messages = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match parse_log_line(line) {
                Some(msg) => messages.push(msg),
                None => eprintln!(
                    "nimbus: skipping malformed log line {}:{}",
                    path.display(),
                    lineno + 1
                ),
            }
        }
        out.insert(channel, messages);
    }

    Ok(out)
}

/// The durable append-only log backing a single channel. Opens its file
/// lazily on first append so channels that never publish never create
/// an empty log on disk.
pub struct ChannelLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ChannelLog {
    pub fn new(dir: &Path, channel: &str) -> Self {
        Self {
            path: dir.join(format!("{channel}.log")),
            file: Mutex::new(None),
        }
    }

    pub fn append(&self, msg: &Message) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap();
        if guard.is_none() {
            *guard = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        let file = guard.as_mut().unwrap();
        file.write_all(msg.to_log_line().as_bytes())?;
        file.sync_data()
    }

    /// Truncates the log and rewrites it to contain exactly `messages`,
    /// in order. Used by RETENTION to drop everything but the tail.
    pub fn rewrite(&self, messages: &[Arc<Message>]) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        for msg in messages {
            file.write_all(msg.to_log_line().as_bytes())?;
        }
        file.sync_data()?;
        // Drop the handle so the next append() reopens in append mode.
        *guard = None;
        Ok(())
    }

    pub fn delete(&self) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap();
        *guard = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn msg(id: u64, channel: &str, content: &str) -> Message {
        Message {
            id,
            channel: channel.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn parses_well_formed_line() {
        let line = "3|2024-01-02T03:04:05.123456789Z|general|hello world";
        let parsed = parse_log_line(line).unwrap();
        assert_eq!(parsed.id, 3);
        assert_eq!(parsed.channel, "general");
        assert_eq!(parsed.content, "hello world");
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(parse_log_line("not-a-valid-line").is_none());
        assert!(parse_log_line("abc|2024-01-02T03:04:05Z|general|hi").is_none());
    }

    #[test]
    fn append_and_replay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChannelLog::new(dir.path(), "general");
        log.append(&msg(1, "general", "one")).unwrap();
        log.append(&msg(2, "general", "two")).unwrap();

        let replayed = replay_all(dir.path()).unwrap();
        let messages = &replayed["general"];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "one");
        assert_eq!(messages[1].content, "two");
    }

    #[test]
    fn rewrite_truncates_to_given_messages() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChannelLog::new(dir.path(), "general");
        log.append(&msg(1, "general", "one")).unwrap();
        log.append(&msg(2, "general", "two")).unwrap();
        log.append(&msg(3, "general", "three")).unwrap();

        let keep = vec![Arc::new(msg(2, "general", "two")), Arc::new(msg(3, "general", "three"))];
        log.rewrite(&keep).unwrap();

        let replayed = replay_all(dir.path()).unwrap();
        let messages = &replayed["general"];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "two");
        assert_eq!(messages[1].content, "three");
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChannelLog::new(dir.path(), "general");
        log.append(&msg(1, "general", "one")).unwrap();
        log.delete().unwrap();
        assert!(!dir.path().join("general.log").exists());
        // Deleting again is a no-op, not an error.
        log.delete().unwrap();
    }
}
