use arc_swap::ArcSwap;
use std::sync::Arc;

/// A single-slot compare-and-swap cell. Readable without synchronization for
/// an eventually-consistent view; mutated only via `swap`, which retries the
/// supplied transition under contention until it commits.
///
/// Built directly on `arc_swap::ArcSwap`'s `rcu` (read-copy-update) helper —
/// no hand-rolled CAS loop is needed, `rcu` already retries `f` against a
/// freshly-loaded value whenever another writer wins the race.
pub struct Atom<T> {
    inner: ArcSwap<T>,
}

impl<T> Atom<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// Applies `f` to the current value under compare-and-swap until it
    /// commits, returning the value that was stored.
    pub fn swap<F>(&self, f: F) -> Arc<T>
    where
        F: Fn(&T) -> T,
    {
        self.inner.rcu(|old| Arc::new(f(old)))
    }

    /// Current value, loaded without blocking.
    #[must_use]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }
}

impl<T: Default> Default for Atom<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn swap_applies_transition() {
        let atom = Atom::new(0i64);
        let result = atom.swap(|v| v + 1);
        assert_eq!(*result, 1);
        assert_eq!(*atom.load(), 1);
    }

    #[test]
    fn concurrent_swaps_converge_to_sum() {
        let atom = StdArc::new(Atom::new(0i64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let atom = StdArc::clone(&atom);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    atom.swap(|v| v + 1);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*atom.load(), 8000);
    }
}
