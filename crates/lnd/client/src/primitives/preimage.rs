//! Payment preimages.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

pub const PREIMAGE_LEN: usize = 32;

/// Secret whose hash locks an invoice.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Preimage([u8; PREIMAGE_LEN]);

impl Preimage {
    pub const fn new(bytes: [u8; PREIMAGE_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh preimage from the thread-local RNG.
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; PREIMAGE_LEN] {
        &self.0
    }
}

impl FromStr for Preimage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; PREIMAGE_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ParseError::InvalidLength {
                    expected: PREIMAGE_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// Keeps the secret out of logs.
impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Preimage(..)")
    }
}
