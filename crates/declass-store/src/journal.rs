//! Durable scene store: snapshot plus append-only batch journal
//!
//! Layout of a store directory:
//!
//! - `snapshot.json`: full state as of journal sequence `last_seq`, replaced
//!   atomically (temp file in the same directory, fsync, rename)
//! - `journal.jsonl`: one line per committed batch,
//!   `<blake3 hex of payload> <payload json>\n`
//! - `store.lock`: advisory lock file; a writable handle holds it exclusively,
//!   read-only handles share it
//!
//! A batch is committed once its line is appended and fsynced. On open the
//! snapshot is loaded and newer journal lines are replayed. A damaged final
//! line is an interrupted commit and is truncated away; damage anywhere else
//! is reported as corruption. Read-only handles replay the same way but never
//! truncate or compact.

use crate::error::{StoreError, StoreResult};
use crate::state::{ScanFilter, SceneScan, StoreOp, StoreState};
use crate::{SceneStore, StoreStats, UpsertSummary};
use declass_scene::{Dataset, Fingerprint, SceneId, SceneRecord};
use fs4::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const SNAPSHOT_FILE: &str = "snapshot.json";
const JOURNAL_FILE: &str = "journal.jsonl";
const LOCK_FILE: &str = "store.lock";
const SNAPSHOT_VERSION: u32 = 1;

/// Tuning for [`JournalStore`]
#[derive(Debug, Clone, Copy)]
pub struct JournalOptions {
    /// Fold the journal into the snapshot on open once it holds more entries than this
    pub compact_after: usize,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self { compact_after: 64 }
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    version: u32,
    last_seq: u64,
    state: StoreState,
}

#[derive(Debug, Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    last_seq: u64,
    state: &'a StoreState,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    seq: u64,
    ops: Vec<StoreOp>,
}

#[derive(Debug)]
struct JournalWriter {
    file: File,
    /// Bytes of committed entries; a failed append is rolled back to here
    len: u64,
    next_seq: u64,
    entries: usize,
}

#[derive(Debug)]
struct Replay {
    last_seq: u64,
    entries: usize,
    valid_len: u64,
    torn_tail: bool,
}

/// Scene store persisted in a directory
///
/// At most one writable handle may be open on a directory at a time, and not
/// while read-only handles are open. Conflicting opens fail with
/// [`StoreError::Locked`].
#[derive(Debug)]
pub struct JournalStore {
    dir: PathBuf,
    snapshot_path: PathBuf,
    journal_path: PathBuf,
    state: Arc<RwLock<StoreState>>,
    /// `None` for read-only handles
    writer: Option<Mutex<JournalWriter>>,
    replayed_entries: usize,
    /// Held for the life of the handle; the lock is released on drop
    _lock: File,
}

impl JournalStore {
    /// Open (or create) a store with default options
    ///
    /// # Errors
    /// Returns error if the directory cannot be read or written, or if the
    /// snapshot or journal is corrupt
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(dir, JournalOptions::default())
    }

    /// Open (or create) a store
    ///
    /// # Errors
    /// Same as [`JournalStore::open`]
    pub fn open_with(dir: impl AsRef<Path>, options: JournalOptions) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io_error(&dir, e))?;
        let lock = lock_dir(&dir, Access::ReadWrite)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let journal_path = dir.join(JOURNAL_FILE);

        let (mut state, snapshot_seq) = load_snapshot(&snapshot_path)?;
        let replay = replay_journal(&journal_path, &mut state, snapshot_seq)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)
            .map_err(|e| StoreError::io_error(&journal_path, e))?;
        if replay.torn_tail {
            file.set_len(replay.valid_len)
                .and_then(|()| file.sync_data())
                .map_err(|e| StoreError::io_error(&journal_path, e))?;
        }

        let scenes = state.scenes.len();
        let store = Self {
            dir,
            snapshot_path,
            journal_path,
            state: Arc::new(RwLock::new(state)),
            writer: Some(Mutex::new(JournalWriter {
                file,
                len: replay.valid_len,
                next_seq: replay.last_seq + 1,
                entries: replay.entries,
            })),
            replayed_entries: replay.entries,
            _lock: lock,
        };
        info!(
            dir = %store.dir.display(),
            scenes,
            journal_entries = replay.entries,
            "opened scene store"
        );

        if replay.entries > options.compact_after {
            store.compact()?;
        }
        Ok(store)
    }

    /// Open a store for reading only
    ///
    /// Replays the journal into memory without touching any store file: an
    /// interrupted final entry is skipped but left on disk, and the journal is
    /// never compacted. Writes through the handle fail with
    /// [`StoreError::ReadOnly`].
    ///
    /// # Errors
    /// Same as [`JournalStore::open`], plus [`StoreError::Locked`] while a
    /// writable handle is open
    pub fn open_read_only(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io_error(&dir, e))?;
        let lock = lock_dir(&dir, Access::ReadOnly)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let journal_path = dir.join(JOURNAL_FILE);

        let (mut state, snapshot_seq) = load_snapshot(&snapshot_path)?;
        let replay = replay_journal(&journal_path, &mut state, snapshot_seq)?;
        info!(
            dir = %dir.display(),
            scenes = state.scenes.len(),
            journal_entries = replay.entries,
            "opened scene store read-only"
        );

        Ok(Self {
            dir,
            snapshot_path,
            journal_path,
            state: Arc::new(RwLock::new(state)),
            writer: None,
            replayed_entries: replay.entries,
            _lock: lock,
        })
    }

    /// Directory holding the snapshot and journal
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    /// Journal entries not yet folded into the snapshot
    #[must_use]
    pub fn journal_entries(&self) -> usize {
        self.writer
            .as_ref()
            .map_or(self.replayed_entries, |writer| writer.lock().entries)
    }

    fn writer(&self) -> StoreResult<&Mutex<JournalWriter>> {
        self.writer.as_ref().ok_or_else(|| StoreError::ReadOnly {
            path: self.dir.clone(),
        })
    }

    /// Fold the journal into a fresh snapshot and empty the journal
    ///
    /// A crash between the snapshot rename and the journal truncation is
    /// harmless: entries at or below the snapshot's sequence are skipped on
    /// replay.
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be written or the journal
    /// truncated, or [`StoreError::ReadOnly`] on a read-only handle
    pub fn compact(&self) -> StoreResult<()> {
        let writer = self.writer()?;
        let state = self.state.read();
        let mut guard = writer.lock();
        let writer = &mut *guard;
        let last_seq = writer.next_seq - 1;

        write_snapshot(&self.dir, &self.snapshot_path, &state, last_seq)?;
        writer
            .file
            .set_len(0)
            .and_then(|()| writer.file.sync_data())
            .map_err(|e| StoreError::io_error(&self.journal_path, e))?;
        writer.len = 0;
        writer.entries = 0;

        info!(last_seq, scenes = state.scenes.len(), "compacted scene store journal");
        Ok(())
    }

    fn commit(&self, state: &mut StoreState, ops: Vec<StoreOp>) -> StoreResult<()> {
        let writer = self.writer()?;
        if ops.is_empty() {
            return Ok(());
        }
        let mut guard = writer.lock();
        let writer = &mut *guard;

        let entry = JournalEntry {
            seq: writer.next_seq,
            ops,
        };
        let payload = serde_json::to_string(&entry)?;
        let checksum = Fingerprint::digest(payload.as_bytes());
        let line = format!("{checksum} {payload}\n");

        let appended = writer
            .file
            .write_all(line.as_bytes())
            .and_then(|()| writer.file.sync_data());
        if let Err(source) = appended {
            if let Err(rollback) = writer.file.set_len(writer.len) {
                warn!(error = %rollback, "failed to roll back partial journal append");
            }
            return Err(StoreError::io_error(&self.journal_path, source));
        }

        writer.len += line.len() as u64;
        writer.next_seq += 1;
        writer.entries += 1;
        debug!(
            seq = entry.seq,
            ops = entry.ops.len(),
            checksum = %checksum.short(),
            "committed journal entry"
        );

        state.apply(entry.ops);
        Ok(())
    }
}

impl SceneStore for JournalStore {
    fn get(&self, scene_id: &SceneId) -> StoreResult<Option<SceneRecord>> {
        Ok(self.state.read().scenes.get(scene_id).cloned())
    }

    fn upsert_batch(&self, records: Vec<SceneRecord>) -> StoreResult<UpsertSummary> {
        let mut state = self.state.write();
        let (ops, summary) = state.plan_upsert(records)?;
        self.commit(&mut state, ops)?;
        Ok(summary)
    }

    fn scan_available(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan> {
        Ok(SceneScan::new(
            Arc::clone(&self.state),
            dataset,
            ScanFilter::Available,
        ))
    }

    fn scan_all(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan> {
        Ok(SceneScan::new(Arc::clone(&self.state), dataset, ScanFilter::All))
    }

    fn available_ids(&self, dataset: Dataset) -> StoreResult<BTreeSet<SceneId>> {
        Ok(self.state.read().available_ids(dataset))
    }

    fn is_seeded(&self, dataset: Dataset) -> StoreResult<bool> {
        Ok(self.state.read().seeded.contains(&dataset))
    }

    fn mark_seeded(&self, dataset: Dataset) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.seeded.contains(&dataset) {
            return Ok(());
        }
        self.commit(&mut state, vec![StoreOp::MarkSeeded { dataset }])
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        Ok(self.state.read().stats())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadWrite,
    ReadOnly,
}

/// Take the directory's advisory lock without blocking
fn lock_dir(dir: &Path, access: Access) -> StoreResult<File> {
    let path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| StoreError::io_error(&path, e))?;
    let locked = match access {
        Access::ReadWrite => FileExt::try_lock_exclusive(&file),
        Access::ReadOnly => FileExt::try_lock_shared(&file),
    };
    match locked {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Err(StoreError::Locked {
            path: dir.to_path_buf(),
        }),
        Err(e) => Err(StoreError::io_error(&path, e)),
    }
}

fn load_snapshot(path: &Path) -> StoreResult<(StoreState, u64)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((StoreState::default(), 0)),
        Err(e) => return Err(StoreError::io_error(path, e)),
    };
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok((snapshot.state, snapshot.last_seq))
}

fn write_snapshot(
    dir: &Path,
    path: &Path,
    state: &StoreState,
    last_seq: u64,
) -> StoreResult<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io_error(dir, e))?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(
            &mut out,
            &SnapshotRef {
                version: SNAPSHOT_VERSION,
                last_seq,
                state,
            },
        )?;
        out.flush().map_err(|e| StoreError::io_error(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io_error(path, e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::io_error(path, e.error))?;
    sync_dir(dir);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "failed to fsync store directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn replay_journal(
    path: &Path,
    state: &mut StoreState,
    snapshot_seq: u64,
) -> StoreResult<Replay> {
    let mut replay = Replay {
        last_seq: snapshot_seq,
        entries: 0,
        valid_len: 0,
        torn_tail: false,
    };
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(replay),
        Err(e) => return Err(StoreError::io_error(path, e)),
    };

    let mut offset = 0usize;
    let mut line_no = 0usize;
    let mut prev_seq: Option<u64> = None;
    while offset < raw.len() {
        line_no += 1;
        let newline = raw[offset..].iter().position(|&b| b == b'\n');
        let (decoded, next) = match newline {
            Some(pos) => (decode_line(&raw[offset..offset + pos]), offset + pos + 1),
            // Every committed line ends in a newline; a bare tail was cut short.
            None => (Err("entry not newline-terminated".to_string()), raw.len()),
        };
        let is_last = next >= raw.len();

        let entry = match decoded {
            Ok(entry) => entry,
            Err(reason) if is_last => {
                warn!(
                    path = %path.display(),
                    line = line_no,
                    %reason,
                    "dropping interrupted journal entry"
                );
                replay.torn_tail = true;
                break;
            }
            Err(reason) => return Err(StoreError::corrupt(path, line_no, reason)),
        };

        if prev_seq.is_some_and(|prev| entry.seq <= prev) {
            return Err(StoreError::corrupt(
                path,
                line_no,
                format!("sequence {} does not follow {}", entry.seq, prev_seq.unwrap_or(0)),
            ));
        }
        prev_seq = Some(entry.seq);

        if entry.seq > snapshot_seq {
            state.apply(entry.ops);
            replay.last_seq = entry.seq;
        }
        replay.entries += 1;
        replay.valid_len = next as u64;
        offset = next;
    }
    Ok(replay)
}

fn decode_line(line: &[u8]) -> Result<JournalEntry, String> {
    let text = std::str::from_utf8(line).map_err(|e| e.to_string())?;
    let (checksum, payload) = text
        .split_once(' ')
        .ok_or_else(|| "missing checksum separator".to_string())?;
    let expected: Fingerprint = checksum.parse().map_err(|e| format!("bad checksum: {e}"))?;
    if Fingerprint::digest(payload.as_bytes()) != expected {
        return Err("checksum mismatch".to_string());
    }
    serde_json::from_str(payload).map_err(|e| e.to_string())
}
