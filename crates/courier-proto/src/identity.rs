//! Peer routing identities

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::Frame;

/// Opaque routing key for one connected peer.
///
/// Used purely for routing, never as content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Bytes);

impl Identity {
    /// Create an identity from raw bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Random client identity of the form `CLIENT [n]`, `n` in `1..9999`.
    ///
    /// Uniqueness is best effort only.
    pub fn random_client() -> Self {
        let n: u32 = rand::thread_rng().gen_range(1..9999);
        Self(Bytes::from(format!("CLIENT [{}]", n)))
    }

    /// Raw identity bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if the identity is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identity as a routing frame
    pub fn to_frame(&self) -> Frame {
        Frame::new(self.0.clone())
    }
}

impl From<Frame> for Identity {
    fn from(frame: Frame) -> Self {
        Self(frame.into_bytes())
    }
}

impl From<&Frame> for Identity {
    fn from(frame: &Frame) -> Self {
        Self(frame.clone().into_bytes())
    }
}

impl From<&'static str> for Identity {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => f.write_str(text),
            Err(_) => {
                for byte in self.0.iter() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_client_format() {
        for _ in 0..100 {
            let identity = Identity::random_client();
            let text = identity.to_string();
            let n: u32 = text
                .strip_prefix("CLIENT [")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|n| n.parse().ok())
                .expect("identity should look like CLIENT [n]");
            assert!((1..9999).contains(&n));
        }
    }

    #[test]
    fn test_frame_conversion() {
        let identity = Identity::from("worker-1");
        let frame = identity.to_frame();
        assert_eq!(Identity::from(frame), identity);
    }

    #[test]
    fn test_display_hex_for_binary() {
        let identity = Identity::new(vec![0xff, 0x00, 0x10]);
        assert_eq!(identity.to_string(), "ff0010");
    }
}
