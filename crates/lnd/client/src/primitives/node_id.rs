//! Compressed secp256k1 public key identifying a Lightning node.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Length of a compressed public key in bytes.
pub const NODE_ID_LEN: usize = 33;

/// A node's identity key. Rendered as 66 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// Builds an id from raw key bytes, as carried in custom message events.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let key: [u8; NODE_ID_LEN] = bytes.try_into().map_err(|_| ParseError::InvalidLength {
            expected: NODE_ID_LEN,
            actual: bytes.len(),
        })?;
        match key[0] {
            0x02 | 0x03 => Ok(Self(key)),
            prefix => Err(ParseError::InvalidPublicKeyPrefix(prefix)),
        }
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl FromStr for NodeId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}
