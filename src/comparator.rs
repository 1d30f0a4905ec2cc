use std::cmp::Ordering;
use std::sync::Arc;

use crate::types::{extract_user_key, TRAILER_SIZE};

/// Total order over raw user-key bytes.
///
/// The flush pipeline never compares user keys itself; it asks the
/// comparator whether two consecutive records belong to the same key.
pub trait Comparator: Send + Sync {
    /// Identifies the ordering. Tables written under one comparator must
    /// never be read under another.
    fn name(&self) -> &'static str;

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte order. The default user comparator.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "lsm.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Orders encoded internal keys: user key ascending under the wrapped
/// comparator, then the packed `(sequence, type)` trailer descending.
#[derive(Clone)]
pub struct InternalKeyComparator {
    user: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user: Arc<dyn Comparator>) -> Self {
        InternalKeyComparator { user }
    }

    pub fn user_comparator(&self) -> &Arc<dyn Comparator> {
        &self.user
    }

    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user
            .compare(extract_user_key(a), extract_user_key(b))
            .then_with(|| trailer(b).cmp(&trailer(a)))
    }
}

impl Default for InternalKeyComparator {
    fn default() -> Self {
        InternalKeyComparator::new(Arc::new(BytewiseComparator))
    }
}

impl std::fmt::Debug for InternalKeyComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalKeyComparator")
            .field("user", &self.user.name())
            .finish()
    }
}

fn trailer(internal_key: &[u8]) -> u64 {
    if internal_key.len() < TRAILER_SIZE {
        return 0;
    }
    let mut buf = [0u8; TRAILER_SIZE];
    buf.copy_from_slice(&internal_key[internal_key.len() - TRAILER_SIZE..]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InternalKey, ValueType};

    struct ReverseComparator;

    impl Comparator for ReverseComparator {
        fn name(&self) -> &'static str {
            "test.Reverse"
        }

        fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }
    }

    #[test]
    fn internal_order_matches_internal_key_ord() {
        let cmp = InternalKeyComparator::default();
        let newer = InternalKey::new(b"a".to_vec(), 9, ValueType::Put).encode();
        let older = InternalKey::new(b"a".to_vec(), 2, ValueType::Put).encode();
        let next = InternalKey::new(b"b".to_vec(), 100, ValueType::Put).encode();

        assert_eq!(cmp.compare(&newer, &older), Ordering::Less);
        assert_eq!(cmp.compare(&older, &next), Ordering::Less);
        assert_eq!(cmp.compare(&newer, &newer), Ordering::Equal);
    }

    #[test]
    fn user_comparator_drives_primary_order() {
        let cmp = InternalKeyComparator::new(Arc::new(ReverseComparator));
        let a = InternalKey::new(b"a".to_vec(), 1, ValueType::Put).encode();
        let b = InternalKey::new(b"b".to_vec(), 1, ValueType::Put).encode();
        assert_eq!(cmp.compare(&b, &a), Ordering::Less);
        assert_eq!(cmp.user_comparator().name(), "test.Reverse");
    }
}
