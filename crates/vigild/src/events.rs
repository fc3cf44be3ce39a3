//! Motion event log.
//!
//! Events accumulate in memory for the lifetime of a detection session
//! and are persisted by rewriting the whole CSV, so the file on disk is
//! always a complete, self-consistent history of the session.

use chrono::Local;
use std::io::Write;
use std::path::PathBuf;
use vigil_core::Identity;

pub const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CSV_HEADER: &str = "Timestamp,Faces";

/// One motion occurrence and the identities seen during it.
#[derive(Debug, Clone)]
pub struct MotionEvent {
    pub timestamp: String,
    pub faces: Vec<Identity>,
}

impl MotionEvent {
    pub fn now(faces: Vec<Identity>) -> Self {
        Self {
            timestamp: Local::now().format(EVENT_TIMESTAMP_FORMAT).to_string(),
            faces,
        }
    }

    /// CSV field for the faces column: "None" when no faces were seen,
    /// otherwise a comma-separated name list.
    pub fn faces_field(&self) -> String {
        if self.faces.is_empty() {
            return "None".to_string();
        }
        self.faces
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// In-memory event history with periodic full rewrites to disk.
pub struct EventLog {
    path: PathBuf,
    events: Vec<MotionEvent>,
    flush_every: usize,
}

impl EventLog {
    pub fn new(path: PathBuf, flush_every: usize) -> Self {
        Self {
            path,
            events: Vec::new(),
            flush_every,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Append an event, persisting every `flush_every`-th one.
    pub fn record(&mut self, event: MotionEvent) {
        self.events.push(event);
        if self.flush_every > 0 && self.events.len() % self.flush_every == 0 {
            self.flush_logged();
        }
    }

    /// Persist once more at session end so the tail is never lost.
    pub fn finish(&self) {
        if !self.events.is_empty() {
            self.flush_logged();
        }
    }

    /// A failed write must not kill the detection loop.
    fn flush_logged(&self) {
        match self.flush() {
            Ok(()) => tracing::info!(path = %self.path.display(), events = self.events.len(), "motion log saved"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to save motion log"),
        }
    }

    /// Rewrite the full log file from the in-memory history.
    pub fn flush(&self) -> std::io::Result<()> {
        let mut out = Vec::with_capacity(64 + self.events.len() * 32);
        writeln!(out, "{CSV_HEADER}")?;
        for event in &self.events {
            writeln!(out, "{},{}", csv_field(&event.timestamp), csv_field(&event.faces_field()))?;
        }
        std::fs::write(&self.path, out)
    }
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_log_path(tag: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "vigil-events-{tag}-{}-{n}.csv",
            std::process::id()
        ))
    }

    fn event(ts: &str, faces: Vec<Identity>) -> MotionEvent {
        MotionEvent {
            timestamp: ts.to_string(),
            faces,
        }
    }

    #[test]
    fn test_faces_field_none_when_empty() {
        assert_eq!(event("t", vec![]).faces_field(), "None");
    }

    #[test]
    fn test_faces_field_joins_names_and_unknown() {
        let e = event(
            "t",
            vec![Identity::Known("alice".into()), Identity::Unknown],
        );
        assert_eq!(e.faces_field(), "alice, Unknown");
    }

    #[test]
    fn test_csv_field_quotes_delimiters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("he said \"hi\""), "\"he said \"\"hi\"\"\"");
    }

    #[test]
    fn test_flush_writes_header_and_rows() {
        let path = temp_log_path("rows");
        let mut log = EventLog::new(path.clone(), 0);
        log.record(event("2026-08-27 10:00:00", vec![]));
        log.record(event(
            "2026-08-27 10:00:01",
            vec![Identity::Known("alice".into()), Identity::Unknown],
        ));
        log.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Timestamp,Faces");
        assert_eq!(lines[1], "2026-08-27 10:00:00,None");
        // Multi-face field contains a comma and gets quoted
        assert_eq!(lines[2], "2026-08-27 10:00:01,\"alice, Unknown\"");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_periodic_flush_every_tenth_event() {
        let path = temp_log_path("periodic");
        let mut log = EventLog::new(path.clone(), 10);

        for i in 0..23 {
            log.record(event(&format!("ts-{i}"), vec![]));
            let rows_on_disk = std::fs::read_to_string(&path)
                .map(|c| c.lines().count().saturating_sub(1))
                .unwrap_or(0);
            match i + 1 {
                n if n < 10 => assert_eq!(rows_on_disk, 0, "after event {n}"),
                n if n < 20 => assert_eq!(rows_on_disk, 10, "after event {n}"),
                n => assert_eq!(rows_on_disk, 20, "after event {n}"),
            }
        }

        // Final save picks up the trailing partial batch.
        log.finish();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 24);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_finish_without_events_writes_nothing() {
        let path = temp_log_path("empty");
        let log = EventLog::new(path.clone(), 10);
        log.finish();
        assert!(!path.exists());
    }
}
