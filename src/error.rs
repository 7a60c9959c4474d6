// Error taxonomy for the export pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes, one per fatal error class
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const VERIFY_FAILED: i32 = 1;
    pub const CONFIGURATION: i32 = 2;
    pub const STORE_UNAVAILABLE: i32 = 3;
    pub const STORE_LOCKED: i32 = 4;
    pub const STORE_CORRUPT: i32 = 5;
    pub const EXPORT_FAILED: i32 = 6;
}

/// Fatal errors. Any of these aborts the run.
///
/// Per-record problems (dangling references, unencodable text) are not
/// errors; see [`crate::join::SkipReason`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("store at {path} is locked by another process; close the application and retry")]
    StoreLocked { path: PathBuf },

    #[error("store at {path} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("export failed: {context}")]
    ExportFailed {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn config(msg: impl Into<String>) -> Self {
        ExportError::Configuration(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ExportError::ExportFailed {
            context: context.into(),
            source,
        }
    }

    /// Distinct process exit code for this error class
    pub fn exit_code(&self) -> i32 {
        match self {
            ExportError::Configuration(_) => exit_code::CONFIGURATION,
            ExportError::StoreUnavailable { .. } => exit_code::STORE_UNAVAILABLE,
            ExportError::StoreLocked { .. } => exit_code::STORE_LOCKED,
            ExportError::StoreCorrupt { .. } => exit_code::STORE_CORRUPT,
            ExportError::ExportFailed { .. } => exit_code::EXPORT_FAILED,
        }
    }

    /// Map a SQLite error raised while reading `path` onto the store taxonomy
    pub(crate) fn from_sqlite(path: impl Into<PathBuf>, err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let path = path.into();
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => ExportError::StoreLocked { path },
            Some(ErrorCode::CannotOpen) | Some(ErrorCode::PermissionDenied) | Some(ErrorCode::NotFound) => {
                ExportError::StoreUnavailable {
                    path,
                    reason: err.to_string(),
                }
            }
            _ => ExportError::StoreCorrupt {
                path,
                reason: err.to_string(),
            },
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
