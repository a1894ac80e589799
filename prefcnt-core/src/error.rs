//! Typed error handling for prefcnt.
//!
//! Every fatal condition of a run maps to one variant so that the CLI (and
//! library consumers) can pick the right diagnostic and exit status.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::TypeId;

/// Main error type for prefcnt operations.
#[derive(Error, Debug)]
pub enum PrefcntError {
    /// Allocation failed while building the graph arenas.
    #[error("insufficient memory")]
    Setup,

    /// I/O error when opening the input
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The input could not be read as a debug-info graph
    #[error("couldn't load debug info from {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// The provider handed over a graph that breaks a structural invariant.
    #[error("malformed debug info in {unit}: {message}")]
    MalformedGraph { unit: String, message: String },

    /// A chain of unguarded edges grew past the configured bound.
    #[error("unguarded reference chain exceeds depth {depth} at type {id} in {unit}")]
    UnguardedChain { unit: String, id: TypeId, depth: usize },

    /// Invalid argument provided
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl PrefcntError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a load error.
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a malformed-graph error for a translation unit.
    pub fn malformed(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedGraph {
            unit: unit.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Check if this error means the input never made it into a graph.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Load { .. })
    }

    /// Get the input path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Load { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get the translation unit the error was raised in, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::MalformedGraph { unit, .. } => Some(unit),
            Self::UnguardedChain { unit, .. } => Some(unit),
            _ => None,
        }
    }
}

/// Convenience type alias for prefcnt results.
pub type PrefcntResult<T> = Result<T, PrefcntError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> PrefcntResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> PrefcntResult<T> {
        self.map_err(|e| PrefcntError::io(path, e))
    }
}
