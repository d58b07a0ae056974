use crate::document::PersistedState;
use crate::error::{Result, StateError};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub struct StateStore {
    path: PathBuf,
    cooldown: Duration,
    state: Mutex<PersistedState>,
}

impl StateStore {
    /// Load the document at `path`, falling back to defaults when the file
    /// is absent or unreadable. Never fails: the agent must start even with
    /// a corrupt state file.
    pub fn load(path: impl Into<PathBuf>, cooldown_secs: u64) -> Self {
        let path = path.into();
        let state = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "State file corrupt, starting from defaults");
                    PersistedState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No state file, starting from defaults");
                PersistedState::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read state file, starting from defaults");
                PersistedState::default()
            }
        };

        Self {
            path,
            cooldown: Duration::seconds(cooldown_secs as i64),
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cooldown_secs(&self) -> i64 {
        self.cooldown.num_seconds()
    }

    fn lock(&self) -> MutexGuard<'_, PersistedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns `true` when `key` fired less than the cooldown window ago
    /// (the caller must suppress). Otherwise records now under `key` and
    /// returns `false`.
    pub fn cooldown(&self, key: &str) -> bool {
        self.cooldown_at(key, Utc::now())
    }

    pub fn cooldown_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        let suppressed = state
            .last_alert
            .get(key)
            .is_some_and(|last| now - *last < self.cooldown);
        if suppressed {
            tracing::debug!(key, "Alert suppressed (cooldown)");
            return true;
        }
        state.last_alert.insert(key.to_string(), now);
        self.persist_logged(&state);
        false
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> PersistedState {
        self.lock().clone()
    }

    /// Read-only access under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&PersistedState) -> R) -> R {
        let state = self.lock();
        f(&state)
    }

    /// Read-modify-write under the lock; the document is persisted before
    /// the lock is released.
    pub fn update<R>(&self, f: impl FnOnce(&mut PersistedState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.persist_logged(&state);
        result
    }

    /// Read a top-level field as JSON.
    pub fn get(&self, field: &str) -> Option<Value> {
        let state = self.lock();
        match serde_json::to_value(&*state) {
            Ok(Value::Object(mut map)) => map.remove(field).filter(|v| !v.is_null()),
            Ok(_) => None,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize state");
                None
            }
        }
    }

    /// Write a top-level field and persist. Known fields are validated
    /// against their schema; unknown fields are stored as-is.
    pub fn set(&self, field: &str, value: Value) -> Result<()> {
        let mut state = self.lock();
        let mut map = match serde_json::to_value(&*state)? {
            Value::Object(map) => map,
            _ => return Err(StateError::Other("state is not a JSON object".to_string())),
        };
        map.insert(field.to_string(), value);
        let updated: PersistedState =
            serde_json::from_value(Value::Object(map)).map_err(|source| {
                StateError::InvalidField {
                    field: field.to_string(),
                    source,
                }
            })?;
        *state = updated;
        self.persist_logged(&state);
        Ok(())
    }

    /// Persist the current document, returning any error to the caller.
    pub fn persist_now(&self) -> Result<()> {
        let state = self.lock();
        write_atomic(&self.path, &state)
    }

    fn persist_logged(&self, state: &PersistedState) {
        if let Err(e) = write_atomic(&self.path, state) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist state, keeping in-memory copy");
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write to `<path>.tmp`, fsync, then rename over `path`.
fn write_atomic(path: &Path, state: &PersistedState) -> Result<()> {
    let body = serde_json::to_vec_pretty(state)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
    file.write_all(&body).map_err(|e| io_err(&tmp, e))?;
    file.sync_all().map_err(|e| io_err(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
