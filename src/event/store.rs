//! Append-only event log access
//!
//! The reader never mutates the log. It takes the last `max_history`
//! non-empty raw lines, reading backwards from the end of the file in fixed
//! blocks so memory stays proportional to the window, then parses each line
//! independently. A line that is mid-write or corrupt is simply dropped.

use super::EventRecord;
use crate::errors::{KdError, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Block size for the backwards scan
const TAIL_BLOCK: usize = 8 * 1024;

/// Read the parsed tail of the event log
///
/// - Missing file: empty list (the file is not created)
/// - Only the last `max_history` non-empty lines are considered
/// - Lines that are not JSON objects are skipped without error
/// - Any other I/O failure propagates as [`KdError::EventLog`]
pub fn read_tail(path: &Path, max_history: usize) -> Result<Vec<EventRecord>> {
    let lines = match tail_lines(path, max_history) {
        Ok(lines) => lines,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::trace!(path = %path.display(), "Event log not found, treating as empty");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(KdError::EventLog {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let total = lines.len();
    let events: Vec<EventRecord> = lines
        .iter()
        .filter_map(|line| {
            let parsed = EventRecord::parse_line(line);
            if parsed.is_none() {
                tracing::trace!(line_len = line.len(), "Skipping malformed event line");
            }
            parsed
        })
        .collect();

    if events.len() < total {
        tracing::debug!(
            skipped = total - events.len(),
            window = total,
            "Dropped malformed lines from event log tail"
        );
    }

    Ok(events)
}

/// Return the last `limit` non-empty lines of the file, oldest first
fn tail_lines(path: &Path, limit: usize) -> std::io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    if file.metadata()?.is_dir() {
        return Err(std::io::Error::other("event log path is a directory"));
    }
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut pos = file.seek(SeekFrom::End(0))?;
    // Bytes of a line whose start has not been reached yet
    let mut carry: Vec<u8> = Vec::new();
    // Collected newest first
    let mut lines: Vec<String> = Vec::new();
    let mut block = vec![0u8; TAIL_BLOCK];

    while pos > 0 && lines.len() < limit {
        let step = TAIL_BLOCK.min(usize::try_from(pos).unwrap_or(TAIL_BLOCK));
        pos -= step as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut block[..step])?;

        let mut chunk = block[..step].to_vec();
        chunk.extend_from_slice(&carry);

        // Everything before the first newline may continue in an earlier block
        let (head, complete): (Vec<u8>, &[u8]) = if pos == 0 {
            (Vec::new(), &chunk[..])
        } else {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(idx) => (chunk[..idx].to_vec(), &chunk[idx + 1..]),
                None => (chunk.clone(), &[]),
            }
        };

        for raw in complete.rsplit(|&b| b == b'\n') {
            if let Some(line) = decode_line(raw) {
                lines.push(line);
                if lines.len() == limit {
                    break;
                }
            }
        }

        carry = head;
    }

    lines.reverse();
    Ok(lines)
}

/// Decode one raw line; `None` for blank lines
fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Append one event as a JSON line, creating parent directories as needed
pub fn append(path: &Path, event: &EventRecord) -> Result<()> {
    let json = serde_json::to_string(event)?;
    let to_err = |source| KdError::Append {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_err)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    file.write_all(format!("{json}\n").as_bytes())
        .map_err(to_err)?;
    Ok(())
}

/// Create an empty log if none exists (dashboard convenience, never the reader)
pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let to_err = |source| KdError::Append {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn line(id: &str, n: usize) -> String {
        format!(r#"{{"ts":"2024-01-01T00:00:{n:02}Z","agent_id":"{id}","action":"typing"}}"#)
    }

    fn write_log(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("events.jsonl");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_empty_and_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("events.jsonl");

        let events = read_tail(&path, 250).unwrap();

        assert!(events.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, "");
        assert!(read_tail(&path, 250).unwrap().is_empty());

        let path = write_log(&dir, "\n\n\r\n");
        assert!(read_tail(&path, 250).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped_in_order() {
        let dir = TempDir::new().unwrap();
        let content = [
            "garbage".to_string(),
            line("a", 1),
            "{\"half\":".to_string(),
            line("b", 2),
            "[1,2]".to_string(),
            "42".to_string(),
            line("c", 3),
            "~~~".to_string(),
        ]
        .join("\n");
        let path = write_log(&dir, &content);

        let events = read_tail(&path, 250).unwrap();
        let ids: Vec<&str> = events.iter().map(EventRecord::agent_id).collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_history_bound_windows_raw_lines() {
        let dir = TempDir::new().unwrap();
        let mut content: Vec<String> = (0..10).map(|n| line(&format!("a{n}"), n)).collect();
        // A garbage line inside the window costs a slot
        content.insert(9, "not json".to_string());
        let path = write_log(&dir, &(content.join("\n") + "\n"));

        let events = read_tail(&path, 3).unwrap();
        let ids: Vec<&str> = events.iter().map(EventRecord::agent_id).collect();

        assert_eq!(ids, vec!["a8", "a9"]);
    }

    #[test]
    fn test_history_bound_returns_last_records() {
        let dir = TempDir::new().unwrap();
        let content: Vec<String> = (0..50).map(|n| line(&format!("a{n}"), n)).collect();
        let path = write_log(&dir, &(content.join("\n") + "\n"));

        let events = read_tail(&path, 5).unwrap();
        let ids: Vec<&str> = events.iter().map(EventRecord::agent_id).collect();

        assert_eq!(ids, vec!["a45", "a46", "a47", "a48", "a49"]);
    }

    #[test]
    fn test_crlf_and_partial_trailing_line() {
        let dir = TempDir::new().unwrap();
        let content = format!("{}\r\n{}\r\n{{\"ts\":\"2024", line("a", 1), line("b", 2));
        let path = write_log(&dir, &content);

        let events = read_tail(&path, 250).unwrap();
        let ids: Vec<&str> = events.iter().map(EventRecord::agent_id).collect();

        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_lines_spanning_block_boundaries() {
        let dir = TempDir::new().unwrap();
        let padding = "x".repeat(TAIL_BLOCK / 3);
        let content: Vec<String> = (0..20)
            .map(|n| {
                format!(r#"{{"agent_id":"a{n}","message":"{padding}"}}"#)
            })
            .collect();
        let path = write_log(&dir, &content.join("\n"));

        let events = read_tail(&path, 1000).unwrap();

        assert_eq!(events.len(), 20);
        for (n, event) in events.iter().enumerate() {
            assert_eq!(event.agent_id(), format!("a{n}"));
            assert_eq!(event.message().map(str::len), Some(padding.len()));
        }
    }

    #[test]
    fn test_append_creates_dirs_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".kracked").join("runtime").join("events.jsonl");
        let mut event = EventRecord::now("qa-agent", "Qira", "QA", "reading", "cli");
        event.task = Some("kd-test".to_string());

        append(&path, &event).unwrap();
        append(&path, &event).unwrap();

        let events = read_tail(&path, 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], event);
    }

    #[test]
    fn test_ensure_exists_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, &line("a", 1));

        ensure_exists(&path).unwrap();
        assert_eq!(read_tail(&path, 10).unwrap().len(), 1);

        let fresh = dir.path().join("sub").join("events.jsonl");
        ensure_exists(&fresh).unwrap();
        assert!(fresh.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        // Reading a directory is an environmental failure, not "not found"
        let err = read_tail(dir.path(), 10);
        assert!(matches!(err, Err(KdError::EventLog { .. })));
    }
}
