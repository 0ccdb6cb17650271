//! Persistent session identifier.
//!
//! One id per install, stored at `~/.config/gridrelay/session.json` and
//! reused on every run. Created lazily on first use, never expired.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// On-disk form of the session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Reads and writes the session file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::at(Self::default_path())
    }
}

impl SessionStore {
    /// Store backed by an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridrelay")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved record, if the file exists and parses.
    pub fn load(&self) -> Option<SessionRecord> {
        fs::read_to_string(&self.path).ok()
            .and_then(|s| serde_json::from_str::<SessionRecord>(&s).ok())
            .filter(|r| !r.session_id.trim().is_empty())
    }

    /// The saved id, or a freshly generated one that is then persisted.
    ///
    /// A failed write is logged; the new id is still returned so the
    /// session can proceed (it just won't survive a restart).
    pub fn get_or_create(&self) -> String {
        if let Some(record) = self.load() {
            return record.session_id;
        }
        let record = SessionRecord {
            session_id: generate_session_id(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.save(&record) {
            log::warn!("Could not persist session id to {}: {}", self.path.display(), e);
        } else {
            log::info!("Created session {}", record.session_id);
        }
        record.session_id
    }

    /// Discard the saved id and create a new one.
    pub fn reset(&self) -> Result<String, String> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| e.to_string())?;
        }
        let record = SessionRecord {
            session_id: generate_session_id(),
            created_at: Utc::now(),
        };
        self.save(&record)?;
        Ok(record.session_id)
    }

    pub fn save(&self, record: &SessionRecord) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(record).map_err(|e| e.to_string())?;
        fs::write(&self.path, json).map_err(|e| e.to_string())
    }
}

/// 16 random bytes from the OS, hex encoded. Falls back to a time/pid
/// based id if the OS RNG is unavailable.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => to_hex(&bytes),
        Err(e) => {
            log::warn!("OS randomness unavailable ({}), using fallback session id", e);
            fallback_session_id()
        }
    }
}

fn fallback_session_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("sess-{:x}{:x}", nanos, std::process::id())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_fallback_session_id() {
        let id = fallback_session_id();
        assert!(id.starts_with("sess-"));
        assert!(id.len() > 5);
    }

    #[test]
    fn test_get_or_create_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let first = SessionStore::at(&path).get_or_create();
        assert!(path.exists());

        // A second store over the same file sees the same id.
        let second = SessionStore::at(&path).get_or_create();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::at(&path);
        let id = store.get_or_create();
        assert_eq!(store.load().unwrap().session_id, id);
    }

    #[test]
    fn test_blank_id_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"session_id":"  ","created_at":"2026-01-01T00:00:00Z"}"#).unwrap();

        let store = SessionStore::at(&path);
        assert!(store.load().is_none());
        assert_eq!(store.get_or_create().len(), 32);
    }

    #[test]
    fn test_reset_changes_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.json"));
        let before = store.get_or_create();
        let after = store.reset().unwrap();
        assert_ne!(before, after);
        assert_eq!(store.get_or_create(), after);
    }

    #[test]
    fn test_default_path() {
        let path = SessionStore::default_path();
        assert!(path.to_string_lossy().contains("gridrelay"));
        assert!(path.to_string_lossy().ends_with("session.json"));
    }
}
