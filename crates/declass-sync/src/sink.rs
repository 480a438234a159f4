//! Destinations for committed change events

use declass_scene::ChangeEvent;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink errors. The engine logs them; they never fail a run.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Receives change events after the batch that produced them is committed
pub trait EventSink: Send + Sync {
    /// Publish one committed batch of events
    ///
    /// # Errors
    /// Returns error if the events could not be delivered
    fn publish(&self, events: &[ChangeEvent]) -> Result<(), SinkError>;
}

/// Appends events to a file, one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl EventSink for JsonLinesSink {
    fn publish(&self, events: &[ChangeEvent]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let mut out = BufWriter::new(file);
        for event in events {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n").map_err(|e| self.io_error(e))?;
        }
        out.flush().map_err(|e| self.io_error(e))?;
        out.get_ref().sync_data().map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use declass_scene::{CatalogScene, Dataset, RunId, SceneRecord, Transition};

    fn event(id: &str) -> ChangeEvent {
        let record = SceneRecord::observe(
            Dataset::DeclassIII,
            CatalogScene::new(id, format!("D-{id}")).with_available(true),
            None,
            Utc::now(),
        );
        ChangeEvent::for_record(RunId::new(), &record, Transition::NewAvailable)
    }

    #[test]
    fn appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("events.jsonl"));

        sink.publish(&[event("A"), event("B")]).unwrap();
        sink.publish(&[event("C")]).unwrap();
        sink.publish(&[]).unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<ChangeEvent> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].scene_id.as_str(), "C");
        assert!(text.contains("\"transition\":\"NEW_AVAILABLE\""));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing").join("events.jsonl"));
        assert!(matches!(sink.publish(&[event("A")]), Err(SinkError::Io { .. })));
    }
}
