//! A copy-on-write container.
//!
//! [`CopyOnWrite::snapshot`] only bumps a reference count. Writing while a [`Snapshot`] is alive
//! clones the contents first, so that snapshot holders keep seeing a stable value.

use core::{fmt::Debug, ops::Deref};
use std::sync::Arc;

use tracing::trace;

/// Shared contents that are cloned lazily when written to while shared.
#[derive(Debug, Default)]
pub struct CopyOnWrite<T: Clone> {
	current: Arc<T>,
}

/// An immutable view of a [`CopyOnWrite`]'s contents at one point in time.
#[derive(Debug)]
pub struct Snapshot<T>(Arc<T>);

impl<T: Clone> CopyOnWrite<T> {
	/// Creates a new [`CopyOnWrite`] that owns `value`.
	pub fn new(value: T) -> Self {
		Self {
			current: Arc::new(value),
		}
	}

	/// Reads the current contents.
	#[must_use]
	pub fn read(&self) -> &T {
		&self.current
	}

	/// Takes a stable [`Snapshot`] of the current contents.
	#[must_use]
	pub fn snapshot(&self) -> Snapshot<T> {
		Snapshot(Arc::clone(&self.current))
	}

	/// Gives exclusive access to the contents, cloning them first if any [`Snapshot`] is alive.
	pub fn write(&mut self) -> &mut T {
		if Arc::strong_count(&self.current) > 1 {
			trace!(
				snapshots = Arc::strong_count(&self.current) - 1,
				"Forking shared contents before write."
			);
		}
		Arc::make_mut(&mut self.current)
	}

	/// Whether any [`Snapshot`] of the current contents is alive.
	#[must_use]
	pub fn is_shared(&self) -> bool {
		Arc::strong_count(&self.current) > 1
	}
}

impl<T> Clone for Snapshot<T> {
	fn clone(&self) -> Self {
		Self(Arc::clone(&self.0))
	}
}

impl<T> Deref for Snapshot<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
