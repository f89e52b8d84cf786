use core::{
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
	mem,
	ops::Deref,
};
use std::sync::{Arc, Weak};

use fanout_core::lock::DefaultLock;

use crate::slot_state::SlotState;

/// A handle to a connected slot.
///
/// [`Connection`] does not keep the slot alive and does not disconnect it when dropped.
/// All operations on a [`Connection`] whose slot is gone are silent no-ops.
///
/// `L` is the lock policy of the signal the slot was connected to.
/// The handle is [`Send`] and [`Sync`] exactly when `L` is.
pub struct Connection<L = DefaultLock> {
	state: Option<Weak<dyn SlotState>>,
	_lock: PhantomData<fn() -> L>,
}

unsafe impl<L: Send + Sync> Send for Connection<L> {}
unsafe impl<L: Send + Sync> Sync for Connection<L> {}

impl<L> Connection<L> {
	pub(crate) fn new(state: Weak<dyn SlotState>) -> Self {
		Self {
			state: Some(state),
			_lock: PhantomData,
		}
	}

	fn upgrade(&self) -> Option<Arc<dyn SlotState>> {
		self.state.as_ref().and_then(Weak::upgrade)
	}

	/// Whether the slot still exists.
	///
	/// A slot may outlive its disconnection for a while, for example while it's still running.
	#[must_use]
	pub fn valid(&self) -> bool {
		self.state.as_ref().is_some_and(|state| state.strong_count() > 0)
	}

	/// Whether the slot is still connected.
	///
	/// For tracked slots, this is also `false` once the tracked object is gone.
	#[must_use]
	pub fn connected(&self) -> bool {
		self.upgrade().is_some_and(|state| state.connected())
	}

	/// Disconnects the slot.
	///
	/// Returns whether this call disconnected it.
	/// When called concurrently for the same slot, at most one caller observes `true`.
	pub fn disconnect(&self) -> bool {
		self.upgrade().is_some_and(|state| state.core().disconnect())
	}

	/// Whether the slot is blocked.
	#[must_use]
	pub fn blocked(&self) -> bool {
		self.upgrade().is_some_and(|state| state.core().blocked())
	}

	/// Blocks the slot. A blocked slot is skipped during emission, but stays connected.
	pub fn block(&self) {
		if let Some(state) = self.upgrade() {
			state.core().set_blocked(true);
		}
	}

	/// Unblocks the slot.
	pub fn unblock(&self) {
		if let Some(state) = self.upgrade() {
			state.core().set_blocked(false);
		}
	}

	/// Blocks the slot until the returned [`ConnectionBlocker`] is dropped.
	pub fn blocker(&self) -> ConnectionBlocker<L> {
		ConnectionBlocker::new(self.state.clone())
	}

	/// Converts this [`Connection`] into a [`ScopedConnection`] that disconnects on drop.
	pub fn into_scoped(self) -> ScopedConnection<L> {
		ScopedConnection(self)
	}
}

impl<L> Clone for Connection<L> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
			_lock: PhantomData,
		}
	}
}

impl<L> Default for Connection<L> {
	/// A [`Connection`] that refers to no slot.
	fn default() -> Self {
		Self {
			state: None,
			_lock: PhantomData,
		}
	}
}

impl<L> Debug for Connection<L> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connection")
			.field("valid", &self.valid())
			.field("connected", &self.connected())
			.field("blocked", &self.blocked())
			.finish_non_exhaustive()
	}
}

/// Keeps a slot blocked while it exists.
#[must_use = "The slot is unblocked again when the `ConnectionBlocker` is dropped."]
pub struct ConnectionBlocker<L = DefaultLock> {
	state: Option<Weak<dyn SlotState>>,
	_lock: PhantomData<fn() -> L>,
}

unsafe impl<L: Send + Sync> Send for ConnectionBlocker<L> {}
unsafe impl<L: Send + Sync> Sync for ConnectionBlocker<L> {}

impl<L> ConnectionBlocker<L> {
	fn new(state: Option<Weak<dyn SlotState>>) -> Self {
		if let Some(state) = state.as_ref().and_then(Weak::upgrade) {
			state.core().set_blocked(true);
		}
		Self {
			state,
			_lock: PhantomData,
		}
	}
}

impl<L> Drop for ConnectionBlocker<L> {
	fn drop(&mut self) {
		if let Some(state) = self.state.as_ref().and_then(Weak::upgrade) {
			state.core().set_blocked(false);
		}
	}
}

impl<L> Debug for ConnectionBlocker<L> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectionBlocker").finish_non_exhaustive()
	}
}

/// A [`Connection`] that disconnects its slot when dropped.
#[must_use = "The slot is disconnected immediately if the `ScopedConnection` is dropped."]
pub struct ScopedConnection<L = DefaultLock>(Connection<L>);

impl<L> ScopedConnection<L> {
	/// Gives up ownership of the slot without disconnecting it.
	pub fn release(mut self) -> Connection<L> {
		mem::take(&mut self.0)
	}
}

impl<L> From<Connection<L>> for ScopedConnection<L> {
	fn from(connection: Connection<L>) -> Self {
		connection.into_scoped()
	}
}

impl<L> Deref for ScopedConnection<L> {
	type Target = Connection<L>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<L> Default for ScopedConnection<L> {
	fn default() -> Self {
		Self(Connection::default())
	}
}

impl<L> Drop for ScopedConnection<L> {
	fn drop(&mut self) {
		self.0.disconnect();
	}
}

impl<L> Debug for ScopedConnection<L> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ScopedConnection").field(&self.0).finish()
	}
}
