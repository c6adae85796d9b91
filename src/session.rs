//! Session context carried between dashboard visits.
//!
//! Loaded explicitly when a page is constructed and saved when it is torn
//! down; nothing reads it implicitly.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{AutoGuardError, Result};

pub const SESSION_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analysis_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_claim_id: Option<String>,
}

impl SessionContext {
    /// Load the session stored at `path`. A missing file is an empty
    /// session; so is an unreadable or corrupt one, after a warning.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read session {:?}: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring corrupt session file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write the session atomically: temp file in the same directory, then
    /// rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let storage = |e: std::io::Error| AutoGuardError::Storage(e.to_string());

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AutoGuardError::Storage(e.to_string()))?;
        let parent = path.parent().ok_or_else(|| {
            AutoGuardError::Storage(format!("Session path has no parent directory: {:?}", path))
        })?;
        std::fs::create_dir_all(parent).map_err(storage)?;

        let mut temp = NamedTempFile::new_in(parent).map_err(storage)?;
        temp.write_all(json.as_bytes()).map_err(storage)?;
        temp.flush().map_err(storage)?;
        temp.persist(path)
            .map_err(|e| AutoGuardError::Storage(e.error.to_string()))?;

        info!("Saved session to {:?}", path);
        Ok(())
    }

    /// The id to show: an explicitly supplied one wins over the remembered
    /// one. Blank ids count as absent.
    pub fn resolve_analysis_id(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or_else(|| self.last_analysis_id.as_deref())
            .map(str::to_string)
    }

    pub fn remember_analysis(&mut self, analysis_id: &str) {
        self.last_analysis_id = Some(analysis_id.to_string());
    }

    pub fn remember_claim(&mut self, claim_id: &str) {
        self.last_claim_id = Some(claim_id.to_string());
    }
}

/// Default session location inside the data directory.
pub fn session_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let session = SessionContext::load(&dir.path().join("session.json"));
        assert_eq!(session, SessionContext::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = SessionContext::default();
        session.remember_analysis("an-42");
        session.remember_claim("cl-7");
        session.save(&path).unwrap();

        let loaded = SessionContext::load(&path);
        assert_eq!(loaded.last_analysis_id.as_deref(), Some("an-42"));
        assert_eq!(loaded.last_claim_id.as_deref(), Some("cl-7"));
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(SessionContext::load(&path), SessionContext::default());
    }

    #[test]
    fn test_explicit_id_wins() {
        let session = SessionContext {
            last_analysis_id: Some("stored".into()),
            last_claim_id: None,
        };
        assert_eq!(
            session.resolve_analysis_id(Some("given")).as_deref(),
            Some("given")
        );
        assert_eq!(session.resolve_analysis_id(None).as_deref(), Some("stored"));
        assert_eq!(session.resolve_analysis_id(Some("  ")).as_deref(), Some("stored"));
    }

    #[test]
    fn test_no_id_anywhere() {
        assert_eq!(SessionContext::default().resolve_analysis_id(None), None);
    }
}
