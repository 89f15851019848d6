use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a source image, shared by every batcher it is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey(pub(crate) u32);

impl ImageKey {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier assigned to each batcher at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatcherId(u64);

static NEXT_BATCHER_ID: AtomicU64 = AtomicU64::new(1);

impl BatcherId {
    pub(crate) fn next() -> Self {
        BatcherId(NEXT_BATCHER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability token for drawing a registered image.
///
/// Two handles compare equal when they refer to the same image, regardless of
/// which batcher produced them. Only the producing batcher accepts a handle.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    key: ImageKey,
    owner: BatcherId,
}

impl Handle {
    pub(crate) fn new(key: ImageKey, owner: BatcherId) -> Self {
        Self { key, owner }
    }

    pub fn key(&self) -> ImageKey {
        self.key
    }

    pub fn owner(&self) -> BatcherId {
        self.owner
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handle_equality_ignores_owner() {
        let a = Handle::new(ImageKey(3), BatcherId(1));
        let b = Handle::new(ImageKey(3), BatcherId(2));
        let c = Handle::new(ImageKey(4), BatcherId(1));

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Handle> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_batcher_ids_are_unique() {
        let first = BatcherId::next();
        let second = BatcherId::next();
        assert_ne!(first, second);
    }
}
