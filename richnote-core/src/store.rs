//! Note persistence: the upsert contract, a JSON-file store, and the
//! background worker that writes snapshots off the editing thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::richnote_dir;

/// A stored note. `content` is a serialized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
}

impl Note {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            updated_at: Utc::now(),
            pinned: false,
        }
    }
}

/// Storage keyed by note id. Writes replace the whole note.
pub trait NoteStore {
    fn upsert(&mut self, note: &Note) -> Result<()>;
    fn get(&self, id: Uuid) -> Result<Option<Note>>;
    /// Pinned notes first, then most recently updated.
    fn list(&self) -> Result<Vec<Note>>;
}

/// Get the ~/.richnote/notes directory path
pub fn notes_dir() -> Result<PathBuf> {
    Ok(richnote_dir()?.join("notes"))
}

/// One `<id>.json` file per note.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Store under `~/.richnote/notes`.
    pub fn open_default() -> Result<Self> {
        Self::new(notes_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read(path: &Path) -> Result<Note> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read note {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse note {}", path.display()))
    }
}

impl NoteStore for JsonDirStore {
    fn upsert(&mut self, note: &Note) -> Result<()> {
        let path = self.path_for(note.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(note).context("Failed to serialize note")?;

        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!(id = %note.id, path = %path.display(), "saved note");
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<Note>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<Note>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut notes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read(&path) {
                    Ok(note) => notes.push(note),
                    Err(err) => warn!("{err:#}"),
                }
            }
        }
        notes.sort_by(|a, b| b.pinned.cmp(&a.pinned).then(b.updated_at.cmp(&a.updated_at)));
        Ok(notes)
    }
}

/// Background writer for note snapshots.
///
/// Snapshots queued while a write is in progress are coalesced per note, so
/// only the newest one for each id is written. Dropping the worker flushes
/// everything still queued.
pub struct SaveWorker<S: NoteStore + Send + 'static> {
    sender: Option<Sender<Note>>,
    handle: Option<JoinHandle<S>>,
}

impl<S: NoteStore + Send + 'static> SaveWorker<S> {
    pub fn spawn(store: S) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || run(store, receiver));
        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Queue a snapshot for writing.
    pub fn save(&self, note: Note) -> Result<()> {
        self.sender
            .as_ref()
            .context("save worker already stopped")?
            .send(note)
            .map_err(|_| anyhow!("save worker stopped unexpectedly"))
    }

    /// Write everything queued, stop the thread and hand back the store.
    pub fn finish(mut self) -> Result<S> {
        self.sender.take();
        self.handle
            .take()
            .context("save worker already stopped")?
            .join()
            .map_err(|_| anyhow!("save worker panicked"))
    }
}

impl<S: NoteStore + Send + 'static> Drop for SaveWorker<S> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("save worker panicked");
            }
        }
    }
}

fn run<S: NoteStore>(mut store: S, receiver: Receiver<Note>) -> S {
    while let Ok(first) = receiver.recv() {
        let mut batch = vec![first];
        while let Ok(next) = receiver.try_recv() {
            coalesce(&mut batch, next);
        }
        for note in &batch {
            if let Err(err) = store.upsert(note) {
                warn!(id = %note.id, "failed to save note: {err:#}");
            }
        }
    }
    store
}

/// Queue `note`, replacing an older snapshot of the same note in place.
fn coalesce(batch: &mut Vec<Note>, note: Note) {
    match batch.iter_mut().find(|queued| queued.id == note.id) {
        Some(queued) => *queued = note,
        None => batch.push(note),
    }
}
