use std::path::{Path, PathBuf};

use pcd_core::{RecordError, TransformError};

use crate::format::Format;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single file conversion. Every variant names the file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported file format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("{}: required field '{field}' was not found", .path.display())]
    MissingField { path: PathBuf, field: String },

    #[error("{}: failed to decode", .path.display())]
    Decode { path: PathBuf, source: BoxError },

    #[error("{}: failed to encode", .path.display())]
    Encode { path: PathBuf, source: BoxError },

    #[error("{}: {format} does not support {operation}", .path.display())]
    UnsupportedOperation {
        path: PathBuf,
        format: Format,
        operation: &'static str,
    },

    #[error("{}: invalid point cloud", .path.display())]
    InvalidRecord { path: PathBuf, source: RecordError },

    #[error("{}: transform failed", .path.display())]
    Transform { path: PathBuf, source: TransformError },

    #[error("{}: invalid conversion options", .path.display())]
    Options { path: PathBuf, source: BoxError },

    #[error("{}: output shared by {jobs} conversion jobs", .path.display())]
    DuplicateOutput { path: PathBuf, jobs: usize },
}

impl Error {
    pub fn decode(path: &Path, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn encode(path: &Path, source: impl Into<BoxError>) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn missing_field(path: &Path, field: impl Into<String>) -> Self {
        Self::MissingField {
            path: path.to_path_buf(),
            field: field.into(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::UnsupportedFormat { path }
            | Self::MissingField { path, .. }
            | Self::Decode { path, .. }
            | Self::Encode { path, .. }
            | Self::UnsupportedOperation { path, .. }
            | Self::InvalidRecord { path, .. }
            | Self::Transform { path, .. }
            | Self::Options { path, .. }
            | Self::DuplicateOutput { path, .. } => path,
        }
    }
}
