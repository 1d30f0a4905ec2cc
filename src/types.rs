use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Monotonically assigned write counter. Only the low 56 bits are usable,
/// the top byte of the packed trailer holds the [`ValueType`].
pub type SequenceNumber = u64;

/// Largest sequence number that fits in an encoded internal key.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Size of the packed `(sequence << 8) | type` trailer.
pub const TRAILER_SIZE: usize = 8;

/// Distinguishes puts from deletes in the storage engine.
/// A Delete writes a tombstone: the key is marked deleted, not removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ValueType {
    /// A delete (tombstone marker).
    Delete = 0x00,
    /// A normal put operation.
    #[default]
    Put = 0x01,
}

impl ValueType {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(ValueType::Delete),
            0x01 => Ok(ValueType::Put),
            _ => Err(Error::Corruption(format!("invalid value type: {byte}"))),
        }
    }
}

/// Internal key format: user key + sequence number + value type.
///
/// Ordering: (user_key ASC, sequence DESC).
/// This ensures the newest version of a key always comes first during merging.
///
/// Encoded as `user_key ++ fixed64_le((sequence << 8) | value_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InternalKey {
    pub user_key: Key,
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Key>, sequence: SequenceNumber, value_type: ValueType) -> Self {
        debug_assert!(sequence <= MAX_SEQUENCE_NUMBER);
        InternalKey {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.user_key.len() + TRAILER_SIZE);
        buf.extend_from_slice(&self.user_key);
        buf.extend_from_slice(&pack_trailer(self.sequence, self.value_type).to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        ParsedInternalKey::parse(data).map(|parsed| parsed.to_internal_key())
    }

    /// An empty internal key means "not set" in [`crate::FileMetaData`].
    pub fn is_empty(&self) -> bool {
        self.user_key.is_empty() && self.sequence == 0
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.value_type.cmp(&self.value_type))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Borrowed view over an encoded internal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let Some((user_key, trailer)) = data.split_last_chunk::<TRAILER_SIZE>() else {
            return Err(Error::Corruption(format!(
                "internal key too short: {} bytes",
                data.len()
            )));
        };
        let trailer = u64::from_le_bytes(*trailer);
        Ok(ParsedInternalKey {
            user_key,
            sequence: trailer >> 8,
            value_type: ValueType::from_u8((trailer & 0xff) as u8)?,
        })
    }

    pub fn to_internal_key(&self) -> InternalKey {
        InternalKey {
            user_key: self.user_key.to_vec(),
            sequence: self.sequence,
            value_type: self.value_type,
        }
    }
}

/// User-key portion of an encoded internal key. Caller guarantees the trailer exists.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    &internal_key[..internal_key.len().saturating_sub(TRAILER_SIZE)]
}

fn pack_trailer(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    (sequence << 8) | value_type as u64
}
