use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Bound required of any application key used with the dispatcher.
pub trait Key: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> Key for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// A key decorated with the lineage of pipeline stages it has passed
/// through, used internally by `firehose-pipe` to derive destination keys
/// without losing the identity of the originating application key.
///
/// Cloning a `StageKey` to attach a new stage tag is O(1): the lineage path
/// is `Arc`-shared, and appending a tag allocates one new `Arc` holding the
/// old path plus the new tag rather than copying the whole path.
#[derive(Clone)]
pub struct StageKey<K> {
    base: K,
    lineage: Arc<Lineage>,
}

enum Lineage {
    Root,
    Tagged { parent: Arc<Lineage>, tag: u64 },
}

impl<K: Key> StageKey<K> {
    /// Wraps an application key as the root of a new lineage.
    pub fn root(base: K) -> Self {
        Self {
            base,
            lineage: Arc::new(Lineage::Root),
        }
    }

    /// Derives a child key carrying the same base identity plus one more
    /// lineage tag. Two `StageKey`s are equal iff both the base key and the
    /// full lineage chain match, so sibling stages derived from the same
    /// parent with different tags never collide.
    #[must_use]
    pub fn derive(&self, tag: u64) -> Self {
        Self {
            base: self.base.clone(),
            lineage: Arc::new(Lineage::Tagged {
                parent: Arc::clone(&self.lineage),
                tag,
            }),
        }
    }

    pub fn base(&self) -> &K {
        &self.base
    }
}

impl<K: PartialEq> PartialEq for StageKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && lineage_eq(&self.lineage, &other.lineage)
    }
}

impl<K: Eq> Eq for StageKey<K> {}

fn lineage_eq(a: &Arc<Lineage>, b: &Arc<Lineage>) -> bool {
    match (&**a, &**b) {
        (Lineage::Root, Lineage::Root) => true,
        (
            Lineage::Tagged { parent: pa, tag: ta },
            Lineage::Tagged { parent: pb, tag: tb },
        ) => ta == tb && lineage_eq(pa, pb),
        _ => false,
    }
}

impl<K: Hash> Hash for StageKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        hash_lineage(&self.lineage, state);
    }
}

fn hash_lineage<H: Hasher>(lineage: &Lineage, state: &mut H) {
    match lineage {
        Lineage::Root => 0u8.hash(state),
        Lineage::Tagged { parent, tag } => {
            1u8.hash(state);
            tag.hash(state);
            hash_lineage(parent, state);
        }
    }
}

impl<K: std::fmt::Debug> std::fmt::Debug for StageKey<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageKey").field("base", &self.base).finish_non_exhaustive()
    }
}

/// A predicate over keys, optionally rewriting a match into a set of
/// derived `(key, consumer-producing)` mappings. Selectors back wildcard or
/// tail-style registration where an exact key is not known up front.
pub struct Selector<K> {
    predicate: Box<dyn Fn(&K) -> bool + Send + Sync>,
}

impl<K> Selector<K> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&K) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }

    #[must_use]
    pub fn matches(&self, key: &K) -> bool {
        (self.predicate)(key)
    }
}
