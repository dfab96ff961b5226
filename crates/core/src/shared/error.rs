use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the sequence controller and its persistence codec.
///
/// Every variant is returned before any state is mutated: a frame is either
/// committed with tracked ids or not added at all, and a failed load leaves
/// the previous sequence in place.
#[derive(Error, Debug)]
pub enum SequenceError {
    /// Bad frame scale, IoU threshold, or a model that cannot be loaded.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Empty or inconsistent image data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed sequence file {path}: {reason}")]
    MalformedFile { path: PathBuf, reason: String },
    #[error("face detection failed: {0}")]
    Detection(String),
    /// Every face id up to `u32::MAX` has been handed out.
    #[error("no face ids left to allocate")]
    IdsExhausted,
}

impl SequenceError {
    /// True for the persistence failures: unreadable, unwritable, or
    /// malformed files.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::MalformedFile { .. })
    }
}
