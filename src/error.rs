use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("failed to read workspace store: {0}")]
    StoreRead(String),

    #[error("launch failed for {identifier}: {message}")]
    LaunchFailed { identifier: String, message: String },

    #[error("placement failed for {app}: {os_error}")]
    PlacementFailed { app: String, os_error: String },

    #[error("window enumeration failed: {0}")]
    OsEnumeration(String),

    #[error("a workspace request is already in flight")]
    Busy,
}

impl RestoreError {
    pub fn store_read(err: impl std::fmt::Display) -> Self {
        RestoreError::StoreRead(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;
