//! Append-only JSONL event logs, one file per session.

use chrono::{DateTime, Utc};
use parley_common::ParleyError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::index::write_atomic;
use crate::Role;

/// One persisted conversation event (a single JSONL line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Size caps applied after each append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimLimits {
    pub max_messages: usize,
    pub max_file_bytes: u64,
}

/// Message count and byte size of a log after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    pub message_count: u64,
    pub bytes: u64,
}

/// Append encoded lines in a single write and flush them to disk.
pub async fn append_lines(path: &Path, lines: &[String]) -> Result<(), ParleyError> {
    let fail = |e: std::io::Error| ParleyError::persistence(path, e.to_string());

    let mut payload = String::new();
    for line in lines {
        payload.push_str(line);
        payload.push('\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(fail)?;
    file.write_all(payload.as_bytes()).await.map_err(fail)?;
    file.flush().await.map_err(fail)?;
    file.sync_data().await.map_err(fail)?;
    Ok(())
}

/// Current on-disk size, zero when the file is missing.
pub async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .unwrap_or(0)
}

/// Keep the newest records that fit both limits; returns the kept lines.
///
/// The count cap is applied first, then the oldest records are dropped one
/// at a time while the newline-joined content exceeds the byte cap. A single
/// record larger than the byte cap is dropped too.
pub fn trim_lines<'a>(lines: &[&'a str], limits: TrimLimits) -> Vec<&'a str> {
    let start = lines.len().saturating_sub(limits.max_messages);
    let mut kept = &lines[start..];

    let mut joined: u64 = kept.iter().map(|l| l.len() as u64).sum::<u64>()
        + kept.len().saturating_sub(1) as u64;
    while !kept.is_empty() && joined > limits.max_file_bytes {
        joined -= kept[0].len() as u64;
        if kept.len() > 1 {
            joined -= 1;
        }
        kept = &kept[1..];
    }
    kept.to_vec()
}

/// Enforce `limits` on the log at `path`, rewriting it atomically when any
/// record has to go.
pub async fn trim(path: &Path, limits: TrimLimits) -> Result<LogStats, ParleyError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ParleyError::persistence(path, e.to_string()))?;
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let kept = trim_lines(&lines, limits);

    let mut content = kept.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    if kept.len() != lines.len() {
        debug!(
            path = %path.display(),
            dropped = lines.len() - kept.len(),
            "trimmed session log"
        );
        write_atomic(path, content.as_bytes()).await?;
    }

    Ok(LogStats {
        message_count: kept.len() as u64,
        bytes: content.len() as u64,
    })
}

/// The last `limit` lines of the log, decoded. Lines that do not parse are
/// skipped after the window is taken. Missing or unreadable logs yield
/// nothing.
pub async fn read_recent(path: &Path, limit: usize) -> Vec<Event> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %path.display(), "cannot read session log: {e}");
            }
            return Vec::new();
        }
    };
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..]
        .iter()
        .filter_map(|line| match serde_json::from_str::<Event>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(path = %path.display(), "skipping unparseable log line: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_messages: usize, max_file_bytes: u64) -> TrimLimits {
        TrimLimits {
            max_messages,
            max_file_bytes,
        }
    }

    #[test]
    fn count_cap_keeps_newest() {
        let lines = ["a", "b", "c", "d"];
        assert_eq!(trim_lines(&lines, limits(2, 1000)), vec!["c", "d"]);
    }

    #[test]
    fn byte_cap_counts_separators() {
        // "aaaa\nbbbb\ncccc" is 14 bytes; dropping "aaaa" leaves 9.
        let lines = ["aaaa", "bbbb", "cccc"];
        assert_eq!(trim_lines(&lines, limits(10, 13)), vec!["bbbb", "cccc"]);
        assert_eq!(trim_lines(&lines, limits(10, 14)), lines.to_vec());
        assert_eq!(trim_lines(&lines, limits(10, 9)), vec!["bbbb", "cccc"]);
        assert_eq!(trim_lines(&lines, limits(10, 8)), vec!["cccc"]);
    }

    #[test]
    fn oversized_single_record_is_dropped() {
        let lines = ["x".repeat(20)];
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        assert!(trim_lines(&lines, limits(10, 5)).is_empty());
    }

    #[test]
    fn event_defaults_missing_fields() {
        let event: Event = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(event.role, Role::User);
        assert_eq!(event.content, "hi");
    }

    #[tokio::test]
    async fn trim_rewrites_and_reports_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let lines: Vec<String> = (0..5).map(|i| format!("line{i}")).collect();
        append_lines(&path, &lines).await.unwrap();

        let stats = trim(&path, limits(2, 1000)).await.unwrap();
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.bytes, "line3\nline4\n".len() as u64);
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "line3\nline4\n"
        );
        assert_eq!(file_size(&path).await, stats.bytes);
    }

    #[tokio::test]
    async fn read_recent_windows_then_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let good = |c: &str| serde_json::to_string(&Event::now(Role::User, c)).unwrap();
        append_lines(
            &path,
            &[good("one"), good("two"), "{not json".to_string(), good("three")],
        )
        .await
        .unwrap();

        let events = read_recent(&path, 2).await;
        let contents: Vec<&str> = events.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["three"]);

        let events = read_recent(&path, 10).await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn read_recent_of_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_recent(&dir.path().join("nope.jsonl"), 5).await.is_empty());
    }
}
