//! Multipart envelopes

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use crate::{Frame, ProtocolError};

/// An ordered sequence of frames travelling as one unit.
///
/// When an envelope travels from the public side inward, frame 0 is the
/// sending peer's identity and the remaining frames are the payload. Sockets
/// queue an envelope whole or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope {
    frames: VecDeque<Frame>,
}

impl Envelope {
    /// Create an empty envelope
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame, returning the envelope for chaining
    pub fn with(mut self, frame: impl Into<Frame>) -> Self {
        self.frames.push_back(frame.into());
        self
    }

    /// Append a frame
    pub fn push(&mut self, frame: impl Into<Frame>) {
        self.frames.push_back(frame.into());
    }

    /// Prepend a frame
    pub fn push_front(&mut self, frame: impl Into<Frame>) {
        self.frames.push_front(frame.into());
    }

    /// Remove and return the first frame
    pub fn pop_front(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Frame at `index`, if present
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Frame at `index`, or [`ProtocolError::MissingFrame`]
    pub fn frame(&self, index: usize) -> Result<&Frame, ProtocolError> {
        self.frames.get(index).ok_or(ProtocolError::MissingFrame {
            index,
            len: self.frames.len(),
        })
    }

    /// Frames from `start` onward, cloned into a new envelope
    pub fn payload_from(&self, start: usize) -> Envelope {
        self.frames.iter().skip(start).cloned().collect()
    }

    /// Iterate over frames in order
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the envelope has no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Append every frame of `other`
    pub fn extend(&mut self, other: impl IntoIterator<Item = Frame>) {
        self.frames.extend(other);
    }
}

impl FromIterator<Frame> for Envelope {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Envelope {
    type Item = Frame;
    type IntoIter = std::collections::vec_deque::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl From<Vec<Frame>> for Envelope {
    fn from(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}
