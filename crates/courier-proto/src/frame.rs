//! Frame structure and text decoding

use serde::{Deserialize, Serialize};
use bytes::Bytes;
use std::fmt;
use crate::ProtocolError;

/// One opaque segment of an envelope.
///
/// Frames are cheap to clone and never interpreted by the relay. Only agents
/// at the edges read them as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(Bytes);

impl Frame {
    /// Create a frame from any byte source
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Create an empty frame
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Create a frame holding UTF-8 text
    pub fn text(text: impl Into<String>) -> Self {
        Self(Bytes::from(text.into()))
    }

    /// Raw frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the frame and return its bytes
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Decode the frame as UTF-8.
    ///
    /// Invalid sequences are reported as [`ProtocolError::InvalidUtf8`] rather
    /// than replaced.
    pub fn to_text(&self) -> Result<&str, ProtocolError> {
        Ok(std::str::from_utf8(&self.0)?)
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the frame carries no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static str> for Frame {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Lossy, for log lines only. Use `to_text` when the content matters.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
