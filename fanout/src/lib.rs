#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Slots run on the thread that emits, and may run concurrently when a thread-safe signal is
//! emitted from multiple threads at once. Synchronising their own state is up to them.

mod connection;
mod observer;
mod signal;
mod slot;
mod slot_state;

pub use connection::{Connection, ConnectionBlocker, ScopedConnection};
pub use observer::{AsObserver, Observer, ObserverUnsafe};
pub use signal::{Connector, Signal, SignalBase, SignalUnsafe};
pub use slot_state::GroupId;

/// Lock policies, re-exported from `fanout-core`.
pub mod lock {
	pub use fanout_core::lock::{Admits, DefaultLock, NullMutex, SpinMutex};
}

/// Object identities and tracking, re-exported from `fanout-core`.
pub mod track {
	pub use fanout_core::{
		identity::{ObjectId, ObjectRef},
		track::{Trackable, Unchecked},
	};
}

#[doc = include_str!("../README.md")]
mod readme {}
