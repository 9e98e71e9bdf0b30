//! Error types for protocol operations

use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not valid UTF-8 text
    #[error("Frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Envelope is missing a frame the caller required
    #[error("Envelope has {len} frames, frame {index} is missing")]
    MissingFrame {
        /// Requested frame index
        index: usize,
        /// Number of frames in the envelope
        len: usize,
    },
}
