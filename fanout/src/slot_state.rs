use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Weak;

/// The priority of a slot group. Groups run in ascending order.
pub type GroupId = i32;

/// Removes disconnected slots from the container that owns them.
pub(crate) trait Cleanable {
	/// Called exactly once per slot, by the thread that disconnected it.
	fn clean(&self, core: &SlotCore);
}

/// State shared between a slot and the [`Connection`](`crate::Connection`)s that refer to it.
pub(crate) struct SlotCore {
	/// Only written while the owning signal's lock is held.
	index: AtomicUsize,
	group: GroupId,
	blocked: AtomicBool,
	connected: AtomicBool,
	cleaner: Weak<dyn Cleanable>,
}

impl SlotCore {
	pub(crate) fn new(group: GroupId, cleaner: Weak<dyn Cleanable>) -> Self {
		Self {
			index: AtomicUsize::new(0),
			group,
			blocked: AtomicBool::new(false),
			connected: AtomicBool::new(true),
			cleaner,
		}
	}

	pub(crate) fn index(&self) -> usize {
		self.index.load(Ordering::Relaxed)
	}

	pub(crate) fn set_index(&self, index: usize) {
		self.index.store(index, Ordering::Relaxed);
	}

	pub(crate) fn group(&self) -> GroupId {
		self.group
	}

	pub(crate) fn connected(&self) -> bool {
		self.connected.load(Ordering::Acquire)
	}

	pub(crate) fn blocked(&self) -> bool {
		self.blocked.load(Ordering::Acquire)
	}

	pub(crate) fn set_blocked(&self, blocked: bool) {
		self.blocked.store(blocked, Ordering::Release);
	}

	/// Disconnects the slot and removes it from its signal.
	///
	/// Returns whether this call performed the disconnection.
	pub(crate) fn disconnect(&self) -> bool {
		if !self.mark_disconnected() {
			return false;
		}
		if let Some(cleaner) = self.cleaner.upgrade() {
			cleaner.clean(self);
		}
		true
	}

	/// Disconnects the slot without notifying its signal.
	///
	/// Only for use by the signal itself, while it removes the slot.
	pub(crate) fn mark_disconnected(&self) -> bool {
		self.connected
			.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}
}

/// Type-erased access to a slot's [`SlotCore`].
pub(crate) trait SlotState {
	fn core(&self) -> &SlotCore;

	/// Also `false` if the slot's tracked target is gone.
	fn connected(&self) -> bool {
		self.core().connected()
	}
}
