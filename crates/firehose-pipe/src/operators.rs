use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use firehose_core::{Atom, Consumer, Key, StageKey};
use firehose_timer::TimerHandle;

use crate::stage::{PipeDispatcher, StageSupplier};
use crate::value::PipeValue;

type BoxFn1<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;
type BoxPred<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

pub struct MapStage<T> {
    pub(crate) f: BoxFn1<T>,
}

impl<K, T> StageSupplier<K, T> for MapStage<T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let f = Arc::clone(&self.f);
        let dispatcher = Arc::clone(dispatcher);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(item) = v.as_item() {
                dispatcher.notify(destination.clone(), PipeValue::Item(f(item)));
            }
        })
    }
}

pub struct MapWithStage<T, S> {
    pub(crate) f: Arc<dyn Fn(&Atom<S>, &T) -> T + Send + Sync>,
    pub(crate) init: S,
}

impl<K, T, S> StageSupplier<K, T> for MapWithStage<T, S>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let state = Arc::new(Atom::new(self.init.clone()));
        let f = Arc::clone(&self.f);
        let dispatcher = Arc::clone(dispatcher);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(item) = v.as_item() {
                let next = f(&state, item);
                dispatcher.notify(destination.clone(), PipeValue::Item(next));
            }
        })
    }
}

pub struct ScanStage<T> {
    pub(crate) f: Arc<dyn Fn(&T, &T) -> T + Send + Sync>,
    pub(crate) init: T,
}

impl<K, T> StageSupplier<K, T> for ScanStage<T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let state = Atom::new(self.init.clone());
        let f = Arc::clone(&self.f);
        let dispatcher = Arc::clone(dispatcher);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(item) = v.as_item() {
                let next = state.swap(|s| f(s, item));
                dispatcher.notify(destination.clone(), PipeValue::Item((*next).clone()));
            }
        })
    }
}

pub struct FilterStage<T> {
    pub(crate) predicate: BoxPred<T>,
}

impl<K, T> StageSupplier<K, T> for FilterStage<T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let predicate = Arc::clone(&self.predicate);
        let dispatcher = Arc::clone(dispatcher);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(item) = v.as_item() {
                if predicate(item) {
                    dispatcher.notify(destination.clone(), PipeValue::Item(item.clone()));
                }
            }
        })
    }
}

pub struct SlideStage<T> {
    pub(crate) drop: Arc<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>,
}

impl<K, T> StageSupplier<K, T> for SlideStage<T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let state: Atom<Vec<T>> = Atom::new(Vec::new());
        let drop_fn = Arc::clone(&self.drop);
        let dispatcher = Arc::clone(dispatcher);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            if let Some(item) = v.as_item() {
                let next = state.swap(|seq| {
                    let mut extended = seq.clone();
                    extended.push(item.clone());
                    drop_fn(extended)
                });
                dispatcher.notify(destination.clone(), PipeValue::Window((*next).clone()));
            }
        })
    }
}

pub struct PartitionStage<T> {
    pub(crate) emit_when_full: Arc<dyn Fn(&[T]) -> bool + Send + Sync>,
}

impl<K, T> StageSupplier<K, T> for PartitionStage<T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let state: Atom<Vec<T>> = Atom::new(Vec::new());
        let emit_when_full = Arc::clone(&self.emit_when_full);
        let dispatcher = Arc::clone(dispatcher);
        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            let Some(item) = v.as_item() else { return };

            // The append/test/reset decision happens inside the swap closure
            // so it commits atomically with the mutation; the downstream
            // publish is deferred until after `swap` returns.
            let emitted: RefCell<Option<Vec<T>>> = RefCell::new(None);
            state.swap(|seq| {
                let mut next = seq.clone();
                next.push(item.clone());
                if emit_when_full(&next) {
                    *emitted.borrow_mut() = Some(next.clone());
                    Vec::new()
                } else {
                    *emitted.borrow_mut() = None;
                    next
                }
            });

            if let Some(full) = emitted.into_inner() {
                dispatcher.notify(destination.clone(), PipeValue::Window(full));
            }
        })
    }
}

/// Shared implementation behind `debounce` and `throttle`: every event
/// cancels whichever firing is currently pending, records the event as the
/// latest value, and arms a new one-shot timer for `period` out. Only the
/// last value observed before the window elapses in silence is emitted.
pub struct CoalesceStage<T> {
    pub(crate) period: Duration,
    _marker: std::marker::PhantomData<T>,
}

impl<T> CoalesceStage<T> {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T> StageSupplier<K, T> for CoalesceStage<T>
where
    K: Key,
    T: Clone + Send + Sync + 'static,
{
    fn build(
        &self,
        dispatcher: &Arc<PipeDispatcher<K, T>>,
        _source: StageKey<K>,
        destination: StageKey<K>,
    ) -> Consumer<StageKey<K>, PipeValue<T>> {
        let last_seen: Arc<Atom<Option<T>>> = Arc::new(Atom::new(None));
        let handle_cell: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));
        let dispatcher = Arc::clone(dispatcher);
        let period = self.period;

        Arc::new(move |_k: &StageKey<K>, v: &PipeValue<T>| {
            let Some(item) = v.as_item() else { return };
            last_seen.swap(|_| Some(item.clone()));

            let mut handle_guard = handle_cell.lock().unwrap();
            if let Some(prev) = handle_guard.take() {
                prev.cancel();
            }

            let last_seen_for_timer = Arc::clone(&last_seen);
            let handle_cell_for_timer = Arc::clone(&handle_cell);
            let dispatcher_for_timer = Arc::clone(&dispatcher);
            let destination_for_timer = destination.clone();
            let new_handle = dispatcher.timer().schedule(period, move || {
                if let Some(value) = &*last_seen_for_timer.load() {
                    dispatcher_for_timer.notify(destination_for_timer, PipeValue::Item(value.clone()));
                }
                *handle_cell_for_timer.lock().unwrap() = None;
            });
            *handle_guard = Some(new_handle);
        })
    }
}
