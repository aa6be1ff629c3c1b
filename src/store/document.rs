//! Write-coalescing JSON documents over a pluggable snapshot sink

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::core::errors::StoreError;

/// Result type for persistence operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Where a document's serialized snapshot lives
pub trait SnapshotSink: Send + Sync {
    /// Current snapshot, `None` when nothing was ever written
    fn read(&self) -> StoreResult<Option<String>>;

    /// Last known good snapshot, if the medium keeps one
    fn read_backup(&self) -> StoreResult<Option<String>> {
        Ok(None)
    }

    /// Replace the snapshot; `keep_backup` copies the current one aside first
    fn write(&self, content: &str, keep_backup: bool) -> StoreResult<()>;

    /// Human readable location for logs
    fn location(&self) -> String;
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

/// File sink: backup, temp file, rename
///
/// The destination is always either the previous or the new complete
/// snapshot. `<file>.bak` holds the last snapshot that loaded cleanly.
#[derive(Debug, Clone)]
pub struct AtomicFileSink {
    path: PathBuf,
}

impl AtomicFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, ".bak")
    }

    fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, ".tmp")
    }

    fn replace_via_temp(&self, content: &str) -> std::io::Result<()> {
        let temp = self.temp_path();
        fs::write(&temp, content)?;
        fs::rename(&temp, &self.path)
    }
}

impl SnapshotSink for AtomicFileSink {
    fn read(&self) -> StoreResult<Option<String>> {
        read_optional(&self.path)
    }

    fn read_backup(&self) -> StoreResult<Option<String>> {
        read_optional(&self.backup_path())
    }

    fn write(&self, content: &str, keep_backup: bool) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        if keep_backup && self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()) {
                warn!("Backup of {} failed: {}", self.path.display(), e);
            }
        }

        if let Err(e) = self.replace_via_temp(content) {
            warn!(
                "Atomic write of {} failed ({}), writing in place",
                self.path.display(),
                e
            );
            let _ = fs::remove_file(self.temp_path());
            fs::write(&self.path, content).map_err(|e| io_error(&self.path, e))?;
        }

        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

struct DocumentState<T> {
    data: Option<T>,
    dirty: bool,
    last_flush: Option<Instant>,
    // false while the snapshot on the sink failed to load
    primary_sound: bool,
}

/// One JSON document cached in memory
///
/// Reads never touch disk after the first load. Writes mark the copy dirty and
/// flush when forced, on the first write of the process, or once the debounce
/// window since the previous flush has passed. Failures are logged and the
/// in-memory copy stays authoritative.
pub struct JsonDocument<T> {
    sink: Box<dyn SnapshotSink>,
    debounce: Duration,
    state: Mutex<DocumentState<T>>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(sink: Box<dyn SnapshotSink>, debounce: Duration) -> Self {
        Self {
            sink,
            debounce,
            state: Mutex::new(DocumentState {
                data: None,
                dirty: false,
                last_flush: None,
                primary_sound: true,
            }),
        }
    }

    pub fn location(&self) -> String {
        self.sink.location()
    }

    fn parse(&self, content: &str) -> Option<T> {
        match serde_json::from_str(content) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Corrupt snapshot at {}: {}", self.sink.location(), e);
                None
            }
        }
    }

    /// Loaded data and whether the primary snapshot was usable
    fn load(&self) -> (T, bool) {
        let primary = match self.sink.read() {
            Ok(Some(content)) => self.parse(&content),
            Ok(None) => {
                debug!("No snapshot at {}, starting empty", self.sink.location());
                return (T::default(), true);
            }
            Err(e) => {
                warn!("Reading {} failed: {}", self.sink.location(), e);
                None
            }
        };

        if let Some(data) = primary {
            return (data, true);
        }

        let data = match self.sink.read_backup() {
            Ok(Some(content)) => match serde_json::from_str(&content) {
                Ok(data) => {
                    warn!("Recovered {} from backup", self.sink.location());
                    data
                }
                Err(e) => {
                    warn!("Backup of {} unusable: {}", self.sink.location(), e);
                    T::default()
                }
            },
            _ => T::default(),
        };
        (data, false)
    }

    fn loaded<'a>(&self, state: &'a mut DocumentState<T>) -> &'a mut T {
        if state.data.is_none() {
            let (data, sound) = self.load();
            state.primary_sound = sound;
            state.data = Some(data);
        }
        state.data.get_or_insert_with(T::default)
    }

    /// Run `f` against the in-memory copy
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut state = self.state.lock();
        f(self.loaded(&mut state))
    }

    /// Apply `f`, mark dirty and flush when due
    pub fn write<R>(&self, force: bool, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.state.lock();
        let out = f(self.loaded(&mut state));
        state.dirty = true;

        let due = match state.last_flush {
            None => true,
            Some(at) => at.elapsed() >= self.debounce,
        };
        if force || due {
            self.flush_locked(&mut state);
        } else {
            debug!("Deferred write to {}", self.sink.location());
        }
        out
    }

    /// Write the snapshot if anything changed since the last flush
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if state.dirty {
            self.flush_locked(&mut state);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    // Sink I/O runs on the caller's thread while the lock is held. Flushes are
    // small and spaced by the debounce window except for forced writes.
    fn flush_locked(&self, state: &mut DocumentState<T>) {
        let Some(data) = state.data.as_ref() else {
            return;
        };

        let keep_backup = state.primary_sound;
        let result = serde_json::to_string_pretty(data)
            .map_err(StoreError::from)
            .and_then(|content| self.sink.write(&content, keep_backup));
        state.last_flush = Some(Instant::now());

        match result {
            Ok(()) => {
                state.dirty = false;
                state.primary_sound = true;
                debug!("Flushed {}", self.sink.location());
            }
            Err(e) => error!("Saving {} failed: {}", self.sink.location(), e),
        }
    }
}
