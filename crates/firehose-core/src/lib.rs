//! The dispatch core: a keyed publish/subscribe bus with a fixed-capacity
//! ring-buffer handoff, a worker pool, reentrant in-dispatch delivery, and a
//! concurrent consumer registry supporting exact-key and selector-based
//! registration.
//!
//! Downstream crates build declarative stream pipelines (`firehose-pipe`)
//! and reactive-streams bridges (`firehose-reactive`) on top of the types
//! exported here.

mod atom;
mod backoff;
mod config;
mod dispatcher;
mod error;
mod key;
mod registry;
mod ring_handoff;

pub use atom::Atom;
pub use backoff::Backoff;
pub use config::FirehoseConfig;
pub use dispatcher::Firehose;
pub use error::DispatchError;
pub use key::{Key, Selector, StageKey};
pub use registry::{Consumer, Registration, Registry, Rewriter};
pub use ring_handoff::{RingHandoff, Task};
