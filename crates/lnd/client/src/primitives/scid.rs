//! Short channel ids and their textual encodings.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

const MAX_BLOCK_HEIGHT: u32 = (1 << 24) - 1;
const MAX_TX_INDEX: u32 = (1 << 24) - 1;

/// Location of a channel's funding output: block, transaction, output.
///
/// Peers refer to a channel either by the `x` triplet (`"700000x1234x1"`),
/// by LND's colon rendering (`"700000:1234:1"`) or by LND's packed `u64` id.
/// All of them parse into the same value, so ids are compared here rather
/// than as strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ShortChannelId {
    block_height: u32,
    tx_index: u32,
    output_index: u16,
}

impl ShortChannelId {
    /// Returns `None` if a component does not fit its 24-bit field.
    pub fn new(block_height: u32, tx_index: u32, output_index: u16) -> Option<Self> {
        (block_height <= MAX_BLOCK_HEIGHT && tx_index <= MAX_TX_INDEX).then_some(Self {
            block_height,
            tx_index,
            output_index,
        })
    }

    pub fn block_height(&self) -> u32 {
        self.block_height
    }

    pub fn tx_index(&self) -> u32 {
        self.tx_index
    }

    pub fn output_index(&self) -> u16 {
        self.output_index
    }

    /// LND's packed channel id.
    pub fn to_u64(&self) -> u64 {
        (u64::from(self.block_height) << 40)
            | (u64::from(self.tx_index) << 16)
            | u64::from(self.output_index)
    }

    fn parse_triplet(s: &str, separator: char) -> Option<Self> {
        let mut parts = s.split(separator);
        let block_height = parts.next()?.parse().ok()?;
        let tx_index = parts.next()?.parse().ok()?;
        let output_index = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Self::new(block_height, tx_index, output_index)
    }
}

impl From<u64> for ShortChannelId {
    fn from(id: u64) -> Self {
        Self {
            block_height: (id >> 40) as u32,
            tx_index: ((id >> 16) & 0xff_ffff) as u32,
            output_index: (id & 0xffff) as u16,
        }
    }
}

impl From<ShortChannelId> for u64 {
    fn from(scid: ShortChannelId) -> Self {
        scid.to_u64()
    }
}

impl FromStr for ShortChannelId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if s.contains('x') {
            Self::parse_triplet(s, 'x')
        } else if s.contains(':') {
            Self::parse_triplet(s, ':')
        } else {
            s.parse::<u64>().ok().map(Self::from)
        };
        parsed.ok_or_else(|| ParseError::InvalidShortChannelId(s.to_string()))
    }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}",
            self.block_height, self.tx_index, self.output_index
        )
    }
}
