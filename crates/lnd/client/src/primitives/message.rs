//! Custom message type codes and the inbound message envelope.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::primitives::NodeId;

/// Numeric type code of a custom peer message.
///
/// Peers exchange the code on the wire; handlers see it as a tag, the
/// lowercase base-16 rendering without leading zeros (`42069` is `"a455"`).
/// The mapping is part of the wire contract and must never change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MessageType(u32);

impl MessageType {
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u32 {
        self.0
    }

    /// Textual tag handed to message handlers.
    pub fn tag(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Parses a tag produced by [`MessageType::tag`].
    ///
    /// Only the canonical form is accepted, so every code has exactly one tag.
    pub fn from_tag(tag: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidMessageType(tag.to_string());
        let canonical = !tag.is_empty()
            && tag.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
            && (tag == "0" || !tag.starts_with('0'));
        if !canonical {
            return Err(invalid());
        }
        u32::from_str_radix(tag, 16).map(Self).map_err(|_| invalid())
    }
}

impl From<u32> for MessageType {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl FromStr for MessageType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A custom message received from a peer, as handed to message handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub peer: NodeId,
    /// Tag of the message type, see [`MessageType::tag`].
    pub msg_type: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(peer: NodeId, msg_type: MessageType, payload: Vec<u8>) -> Self {
        Self {
            peer,
            msg_type: msg_type.tag(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_tag_is_lowercase_hex() {
        assert_eq!(MessageType::new(42069).tag(), "a455");
        assert_eq!(MessageType::new(0).tag(), "0");
        assert_eq!(MessageType::new(u32::MAX).tag(), "ffffffff");
    }

    #[test]
    fn test_tag_maps_back_to_code() {
        for code in [0, 1, 255, 32768, 42069, 42085, u32::MAX] {
            let msg_type = MessageType::new(code);
            assert_eq!(MessageType::from_tag(&msg_type.tag()), Ok(msg_type));
        }
    }

    #[test]
    fn test_rejects_non_canonical_tags() {
        for tag in ["", "A455", "0a455", "00", "a45g", "100000000", " a455"] {
            assert_matches!(
                MessageType::from_tag(tag),
                Err(ParseError::InvalidMessageType(_)),
                "tag {tag:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_inbound_message_carries_tag() {
        let peer: NodeId = "02eec7245d6b7d2ccb30380bfbe2a3648cd7a942653f5aa340edcea1f283686619"
            .parse()
            .unwrap();
        let msg = InboundMessage::new(peer, MessageType::new(42069), vec![1, 2, 3]);
        assert_eq!(msg.msg_type, "a455");
        assert_eq!(msg.payload, vec![1, 2, 3]);
    }
}
