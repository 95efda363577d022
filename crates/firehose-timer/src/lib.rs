//! Hashed timing wheel: deferred one-shot scheduling with cancellable handles.
//!
//! Entries are bucketed by `(cursor + delay_ticks) % size`; an entry whose
//! delay spans more than one revolution carries a round counter that is
//! decremented each time the cursor passes its bucket. Firings run on the
//! wheel's own background thread and must stay short — callbacks that do
//! real work should hand off to some other executor themselves.

mod wheel;

pub use wheel::{TimerHandle, TimingWheel, WheelConfig};
