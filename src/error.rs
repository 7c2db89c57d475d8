use std::path::PathBuf;
use thiserror::Error;

/// How far an error reaches: only the current file, or the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    File,
    Batch,
}

/// Per-file failures of an upload run.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to create upload file [{}]: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload file [{}] ({kind}): {message}", path.display())]
    Transport {
        path: PathBuf,
        kind: String,
        message: String,
    },

    #[error("Failed to upload file [{}]: HTTP ({status})", path.display())]
    HttpStatus { path: PathBuf, status: u16 },

    #[error("Failed to upload file [{}]: {body}", path.display())]
    InvalidResponse { path: PathBuf, body: String },
}

impl UploadError {
    /// Transport and status failures stop the batch; everything else only
    /// costs the current file.
    pub fn severity(&self) -> Severity {
        match self {
            UploadError::CreateFailed { .. } | UploadError::InvalidResponse { .. } => Severity::File,
            UploadError::Transport { .. } | UploadError::HttpStatus { .. } => Severity::Batch,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            UploadError::CreateFailed { path, .. }
            | UploadError::Transport { path, .. }
            | UploadError::HttpStatus { path, .. }
            | UploadError::InvalidResponse { path, .. } => path,
        }
    }
}
