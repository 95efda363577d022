use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::key::Selector;

/// A callable invoked with a borrowed key and value, safe to run on any
/// worker thread. Delivery by reference means fan-out to many registrations
/// never requires `V: Clone`.
pub type Consumer<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// A selector match's rewriter: given the key that matched, produces the
/// `(derived key, consumer)` pairs to invoke for that event.
pub type Rewriter<K, V> = Box<dyn Fn(&K) -> Vec<(K, Consumer<K, V>)> + Send + Sync>;

struct SelectorEntry<K, V> {
    id: u64,
    selector: Selector<K>,
    rewriter: Rewriter<K, V>,
}

/// A single registration, ordered by insertion within its key.
#[derive(Clone)]
pub struct Registration<K, V> {
    pub id: u64,
    pub key: K,
    pub consumer: Consumer<K, V>,
}

type ExactIndex<K, V> = HashMap<K, Arc<Vec<Registration<K, V>>>>;

/// Concurrent keyed registry: an exact-match index plus a selector list,
/// both kept as copy-on-write snapshots behind `ArcSwap` so reads never
/// block on registration/unregistration traffic.
///
/// Writers serialize through a short `Mutex` guarding the read-modify-write
/// of whichever snapshot they're replacing; readers always `load()` a
/// consistent `Arc` and never observe a partially-applied mutation.
pub struct Registry<K, V> {
    exact: ArcSwap<ExactIndex<K, V>>,
    selectors: ArcSwap<Vec<Arc<SelectorEntry<K, V>>>>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            exact: ArcSwap::from_pointee(HashMap::new()),
            selectors: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers `consumer` under the exact key `key`. Returns an id that
    /// can later be used to target this single registration for removal via
    /// `unregister_id`.
    pub fn register(&self, key: K, consumer: Consumer<K, V>) -> u64 {
        let id = self.next_id();
        let _guard = self.write_lock.lock().unwrap();
        let current = self.exact.load();
        let mut next: ExactIndex<K, V> = (**current).clone();
        let registration = Registration {
            id,
            key: key.clone(),
            consumer,
        };
        match next.get(&key) {
            Some(existing) => {
                let mut list = (**existing).clone();
                list.push(registration);
                next.insert(key, Arc::new(list));
            }
            None => {
                next.insert(key, Arc::new(vec![registration]));
            }
        }
        self.exact.store(Arc::new(next));
        tracing::debug!(id, "registered exact consumer");
        id
    }

    /// Registers a selector with a rewriter producing derived
    /// `(key, consumer)` pairs on match. Returns the selector's
    /// registration id.
    pub fn register_selector(&self, selector: Selector<K>, rewriter: Rewriter<K, V>) -> u64 {
        let id = self.next_id();
        let _guard = self.write_lock.lock().unwrap();
        let current = self.selectors.load();
        let mut next = (**current).clone();
        next.push(Arc::new(SelectorEntry {
            id,
            selector,
            rewriter,
        }));
        self.selectors.store(Arc::new(next));
        tracing::debug!(id, "registered selector");
        id
    }

    /// Returns every registration matching `key`: exact registrations in
    /// insertion order, followed by every selector match's rewritten
    /// consumers in selector-insertion order. Deterministic and computed
    /// fresh from the current snapshot on every call.
    #[must_use]
    pub fn select(&self, key: &K) -> Vec<Registration<K, V>> {
        let mut out = Vec::new();

        let exact = self.exact.load();
        if let Some(list) = exact.get(key) {
            out.extend(list.iter().cloned());
        }

        let selectors = self.selectors.load();
        for entry in selectors.iter() {
            if entry.selector.matches(key) {
                for (derived_key, consumer) in (entry.rewriter)(key) {
                    out.push(Registration {
                        id: entry.id,
                        key: derived_key,
                        consumer,
                    });
                }
            }
        }

        out
    }

    /// Removes all exact registrations under `key`. Returns `true` if any
    /// were removed.
    pub fn unregister(&self, key: &K) -> bool {
        let _guard = self.write_lock.lock().unwrap();
        let current = self.exact.load();
        if !current.contains_key(key) {
            return false;
        }
        let mut next: ExactIndex<K, V> = (**current).clone();
        next.remove(key);
        self.exact.store(Arc::new(next));
        tracing::debug!("unregistered exact key");
        true
    }

    /// Removes every exact registration whose key satisfies `predicate`,
    /// and every selector whose registration id is in `selector_ids`.
    /// Returns `true` if anything was removed.
    pub fn unregister_matching<P>(&self, predicate: P, selector_ids: &[u64]) -> bool
    where
        P: Fn(&K) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap();
        let mut removed = false;

        let current = self.exact.load();
        let mut next: ExactIndex<K, V> = HashMap::new();
        for (k, v) in current.iter() {
            if predicate(k) {
                removed = true;
            } else {
                next.insert(k.clone(), Arc::clone(v));
            }
        }
        if removed {
            self.exact.store(Arc::new(next));
        }

        if !selector_ids.is_empty() {
            let selectors = self.selectors.load();
            let filtered: Vec<_> = selectors
                .iter()
                .filter(|entry| !selector_ids.contains(&entry.id))
                .cloned()
                .collect();
            if filtered.len() != selectors.len() {
                removed = true;
                self.selectors.store(Arc::new(filtered));
            }
        }

        if removed {
            tracing::debug!("unregistered matching registrations");
        }
        removed
    }

    /// Removes a single registration by id, whether exact or selector.
    pub fn unregister_id(&self, id: u64) -> bool {
        let _guard = self.write_lock.lock().unwrap();
        let mut removed = false;

        let current = self.exact.load();
        let mut next: ExactIndex<K, V> = HashMap::new();
        for (k, list) in current.iter() {
            if list.iter().any(|r| r.id == id) {
                removed = true;
                let filtered: Vec<_> = list.iter().filter(|r| r.id != id).cloned().collect();
                if !filtered.is_empty() {
                    next.insert(k.clone(), Arc::new(filtered));
                }
            } else {
                next.insert(k.clone(), Arc::clone(list));
            }
        }
        if removed {
            self.exact.store(Arc::new(next));
            return true;
        }

        let selectors = self.selectors.load();
        if selectors.iter().any(|entry| entry.id == id) {
            let filtered: Vec<_> = selectors.iter().filter(|e| e.id != id).cloned().collect();
            self.selectors.store(Arc::new(filtered));
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn consumer(counter: Arc<AtomicUsize>) -> Consumer<&'static str, i32> {
        Arc::new(move |_k: &&'static str, _v: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn select_returns_exact_registrations_in_order() {
        let registry: Registry<&'static str, i32> = Registry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let calls = Arc::clone(&calls);
            registry.register(
                "k",
                Arc::new(move |_k: &&'static str, _v: &i32| calls.lock().unwrap().push(i)),
            );
        }
        let results = registry.select(&"k");
        assert_eq!(results.len(), 3);
        for r in &results {
            (r.consumer)(&r.key, &1);
        }
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unregister_removes_exact_key() {
        let registry: Registry<&'static str, i32> = Registry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register("k", consumer(Arc::clone(&counter)));
        assert!(registry.unregister(&"k"));
        assert!(registry.select(&"k").is_empty());
        assert!(!registry.unregister(&"k"));
    }

    #[test]
    fn selector_matches_contribute_derived_keys() {
        let registry: Registry<&'static str, i32> = Registry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = consumer(Arc::clone(&counter));
        registry.register_selector(
            Selector::new(|k: &&'static str| k.starts_with('w')),
            Box::new(move |k| vec![(*k, Arc::clone(&c))]),
        );
        assert_eq!(registry.select(&"wildcard").len(), 1);
        assert!(registry.select(&"other").is_empty());
    }

    #[test]
    fn exact_precedes_selector_in_select_order() {
        let registry: Registry<&'static str, i32> = Registry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = Arc::clone(&order);
            registry.register(
                "k",
                Arc::new(move |_k: &&'static str, _v: &i32| order.lock().unwrap().push("exact")),
            );
        }
        {
            let order = Arc::clone(&order);
            registry.register_selector(
                Selector::new(|_: &&'static str| true),
                Box::new(move |k| {
                    let order = Arc::clone(&order);
                    vec![(
                        *k,
                        Arc::new(move |_k: &&'static str, _v: &i32| {
                            order.lock().unwrap().push("selector")
                        }) as Consumer<&'static str, i32>,
                    )]
                }),
            );
        }
        let results = registry.select(&"k");
        for r in &results {
            (r.consumer)(&r.key, &1);
        }
        assert_eq!(*order.lock().unwrap(), vec!["exact", "selector"]);
    }
}
