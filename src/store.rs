use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{RestoreError, Result};
use crate::model::Workspace;

pub const PRIMARY_FILE: &str = "workspaces.json";
pub const OVERLAY_FILE: &str = "temp-workspace.json";

/// On-disk workspace store: a primary document holding every saved workspace
/// and an overlay document holding a single ad-hoc one. Documents are read
/// per request and never written by the engine.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `RESPACE_DIR` when set, otherwise `%LOCALAPPDATA%\respace`.
    pub fn default_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("RESPACE_DIR") {
            return PathBuf::from(dir);
        }
        match std::env::var("LOCALAPPDATA") {
            Ok(base) => Path::new(&base).join("respace"),
            Err(_) => std::env::temp_dir().join("respace"),
        }
    }

    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(PRIMARY_FILE)
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.dir.join(OVERLAY_FILE)
    }

    /// All workspaces of the primary document.
    pub fn read_all(&self) -> Result<Vec<Workspace>> {
        let raw = fs::read_to_string(self.primary_path()).map_err(RestoreError::store_read)?;
        serde_json::from_str(&raw).map_err(RestoreError::store_read)
    }

    /// The single workspace of the overlay document.
    pub fn read_overlay(&self) -> Result<Workspace> {
        let raw = fs::read_to_string(self.overlay_path()).map_err(RestoreError::store_read)?;
        serde_json::from_str(&raw).map_err(RestoreError::store_read)
    }

    /// Locate a workspace by identifier: the primary list first, then the
    /// overlay.
    pub fn find(&self, id: &str) -> Result<Workspace> {
        match self.read_all() {
            Ok(workspaces) => {
                if let Some(ws) = workspaces.into_iter().find(|ws| ws.id == id) {
                    return Ok(ws);
                }
            }
            Err(err) => warn!("failed to read workspaces file: {err}"),
        }

        match self.read_overlay() {
            Ok(ws) if ws.id == id => return Ok(ws),
            Ok(_) => {}
            Err(err) => warn!("failed to read overlay workspace file: {err}"),
        }

        Err(RestoreError::WorkspaceNotFound(id.to_string()))
    }
}
