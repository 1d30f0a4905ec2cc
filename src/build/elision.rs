//! Redundancy elision: the streaming pass that decides which records of a
//! sorted stream reach the table.

use std::cmp::Ordering;

use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::types::{extract_user_key, ParsedInternalKey, SequenceNumber};

/// Receives the records that survive elision, in order.
pub trait RecordSink {
    fn emit(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Forward every record unchanged. `iter` must be positioned on the first
/// record. Returns the number of records emitted.
pub fn copy_all(iter: &mut dyn StorageIterator, sink: &mut dyn RecordSink) -> Result<u64> {
    let mut emitted = 0;
    while iter.is_valid() {
        sink.emit(iter.key(), iter.value())?;
        emitted += 1;
        iter.next();
    }
    Ok(emitted)
}

/// Forward only the newest version of each user key.
///
/// Holds a single retained record. A record with a new user key flushes the
/// retained one and takes its place; a record with the same user key is an
/// older version and is dropped. Within one user key sequence numbers must
/// strictly decrease, and no record may be older than `earliest_in_source`;
/// either violation stops the pass with [`Error::Integrity`].
///
/// `iter` must be positioned on the first record.
pub fn keep_newest_versions(
    iter: &mut dyn StorageIterator,
    user_comparator: &dyn Comparator,
    earliest_in_source: SequenceNumber,
    sink: &mut dyn RecordSink,
) -> Result<u64> {
    if !iter.is_valid() {
        return Ok(0);
    }

    let mut retained_key = iter.key().to_vec();
    let mut retained_value = iter.value().to_vec();
    let mut retained_seq = parse(&retained_key, earliest_in_source)?.sequence;
    let mut emitted = 0;

    iter.next();
    while iter.is_valid() {
        let key = iter.key();
        let this = parse(key, earliest_in_source)?;

        if user_comparator.compare(extract_user_key(&retained_key), this.user_key)
            != Ordering::Equal
        {
            sink.emit(&retained_key, &retained_value)?;
            emitted += 1;
            retained_key.clear();
            retained_key.extend_from_slice(key);
            retained_value.clear();
            retained_value.extend_from_slice(iter.value());
            retained_seq = this.sequence;
        } else if this.sequence >= retained_seq {
            return Err(Error::Integrity(format!(
                "sequence numbers not decreasing for key {:?}: {} follows {}",
                String::from_utf8_lossy(this.user_key),
                this.sequence,
                retained_seq
            )));
        }
        iter.next();
    }

    sink.emit(&retained_key, &retained_value)?;
    Ok(emitted + 1)
}

fn parse(key: &[u8], earliest_in_source: SequenceNumber) -> Result<ParsedInternalKey<'_>> {
    let parsed = ParsedInternalKey::parse(key)
        .map_err(|e| Error::Integrity(format!("malformed key in source stream: {e}")))?;
    if parsed.sequence < earliest_in_source {
        return Err(Error::Integrity(format!(
            "record sequence {} is older than the stream's earliest sequence {}",
            parsed.sequence, earliest_in_source
        )));
    }
    Ok(parsed)
}
