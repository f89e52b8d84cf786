use core::{
	fmt::{self, Debug, Formatter},
	mem,
};

use fanout_core::lock::{DefaultLock, NullMutex};
use lock_api::{Mutex, RawMutex};

use crate::{Connection, ScopedConnection};

/// Owns connections made through [`Connector::connect_observer`](`crate::Connector::connect_observer`)
/// and disconnects them when dropped.
///
/// Embed it in a type and implement [`AsObserver`] to let signals register that type's
/// method slots with it.
///
/// ```rust
/// use std::sync::{
/// 	atomic::{AtomicUsize, Ordering},
/// 	Arc,
/// };
/// use fanout::{AsObserver, Observer, Signal};
///
/// #[derive(Default)]
/// struct Counter {
/// 	count: AtomicUsize,
/// 	observer: Observer,
/// }
///
/// impl AsObserver for Counter {
/// 	fn observer(&self) -> &Observer {
/// 		&self.observer
/// 	}
/// }
///
/// impl Counter {
/// 	fn add(&self, n: &usize) {
/// 		self.count.fetch_add(*n, Ordering::Relaxed);
/// 	}
/// }
///
/// let signal = Signal::<usize>::new();
/// let counter = Arc::new(Counter::default());
/// signal.connect_observer(Counter::add, &counter);
/// signal.emit(&2);
/// assert_eq!(counter.count.load(Ordering::Relaxed), 2);
///
/// counter.observer().disconnect_all();
/// assert_eq!(signal.slot_count(), 0);
/// ```
pub struct Observer<L: RawMutex = DefaultLock> {
	registry: Mutex<L, Registry<L>>,
}

struct Registry<L> {
	connections: Vec<ScopedConnection<L>>,
	/// Bumped by every [`Observer::disconnect_all`].
	generation: usize,
}

/// An [`Observer`] for single-threaded signals.
pub type ObserverUnsafe = Observer<NullMutex>;

/// Types that embed an [`Observer`].
pub trait AsObserver<L: RawMutex = DefaultLock> {
	/// The embedded [`Observer`].
	fn observer(&self) -> &Observer<L>;
}

impl<L: RawMutex> Observer<L> {
	/// Creates a new [`Observer`] without connections.
	#[must_use]
	pub fn new() -> Self {
		Self {
			registry: Mutex::new(Registry {
				connections: Vec::new(),
				generation: 0,
			}),
		}
	}

	/// Disconnects all registered connections.
	pub fn disconnect_all(&self) {
		// Disconnecting drops slots, which may re-enter this observer.
		let connections = {
			let mut registry = self.registry.lock();
			registry.generation = registry.generation.wrapping_add(1);
			mem::take(&mut registry.connections)
		};
		drop(connections);
	}

	/// The number of registered connections that are still connected.
	#[must_use]
	pub fn connection_count(&self) -> usize {
		// Checking a connection may drop the last reference to its slot, so only outside the lock.
		let connections = self
			.registry
			.lock()
			.connections
			.iter()
			.map(|connection| Connection::clone(connection))
			.collect::<Vec<_>>();
		connections
			.iter()
			.filter(|connection| connection.connected())
			.count()
	}

	pub(crate) fn add_connection(&self, connection: Connection<L>) {
		let (mut connections, generation) = {
			let mut registry = self.registry.lock();
			(mem::take(&mut registry.connections), registry.generation)
		};
		connections.retain(|connection| connection.connected());
		connections.push(connection.into_scoped());

		let dropped = {
			let mut registry = self.registry.lock();
			if registry.generation == generation {
				connections.append(&mut registry.connections);
				mem::replace(&mut registry.connections, connections)
			} else {
				// Disconnected everything in the meantime. Only the new connection is kept.
				let added = connections.pop();
				registry.connections.extend(added);
				connections
			}
		};
		drop(dropped);
	}
}

impl<L: RawMutex> Default for Observer<L> {
	fn default() -> Self {
		Self::new()
	}
}

impl<L: RawMutex> Drop for Observer<L> {
	fn drop(&mut self) {
		self.disconnect_all();
	}
}

impl<L: RawMutex> Debug for Observer<L> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observer")
			.field("connection_count", &self.connection_count())
			.finish_non_exhaustive()
	}
}
