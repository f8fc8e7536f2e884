//! Keeps the signed-in session between CLI invocations.

use crate::error::Result;
use crate::models::Session;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Session file, or nothing at all for backends whose sessions die with the process
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that never reads or writes a file
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    /// Offline sessions are never written over the hosted one
    pub fn for_backend(path: impl Into<PathBuf>, offline: bool) -> Self {
        if offline {
            Self::ephemeral()
        } else {
            Self::new(path)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Saved session, or `None` when nobody is signed in
    pub async fn load(&self) -> Result<Option<Session>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("Session not persisted");
            return Ok(());
        };
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(path, json).await?;
        debug!(path = %path.display(), "Saved session");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
