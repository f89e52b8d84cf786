//! Lock policies for signals.
//!
//! A lock policy is any [`RawMutex`]. Signals only ever hold it briefly, to take a snapshot of
//! their slot list or to modify it, and never while user code runs.

use core::{
	cell::Cell,
	sync::atomic::{AtomicBool, Ordering},
};
use std::thread;

use lock_api::{GuardNoSend, GuardSend, RawMutex};

/// The thread-safe lock policy used when none is specified.
pub type DefaultLock = parking_lot::RawMutex;

/// Lock policies that allow values of type `T` to be stored behind them.
///
/// Containers that are generic over a lock policy `L` are [`Send`] and [`Sync`] exactly when
/// `L` is both. A policy may therefore admit any `T` if it is not `Send + Sync` itself.
///
/// # Safety
///
/// If `Self` is [`Send`] and [`Sync`], `T` **must** be [`Send`] and [`Sync`] too.
pub unsafe trait Admits<T: ?Sized>: RawMutex {}

unsafe impl<T: ?Sized + Send + Sync> Admits<T> for parking_lot::RawMutex {}
unsafe impl<T: ?Sized + Send + Sync> Admits<T> for SpinMutex {}
unsafe impl<T: ?Sized> Admits<T> for NullMutex {}

/// A lock policy for single-threaded use.
///
/// It never blocks. It only remembers whether it is held, so that accidental re-entrant
/// acquisition panics instead of aliasing the protected data.
///
/// [`NullMutex`] is [`!Sync`](`Sync`), so anything protected by it stays on its thread.
#[derive(Debug)]
pub struct NullMutex {
	locked: Cell<bool>,
}

unsafe impl RawMutex for NullMutex {
	#[allow(clippy::declare_interior_mutable_const)]
	const INIT: Self = Self {
		locked: Cell::new(false),
	};

	type GuardMarker = GuardNoSend;

	fn lock(&self) {
		assert!(
			self.try_lock(),
			"`NullMutex` acquired re-entrantly. This is a bug in the calling code."
		);
	}

	fn try_lock(&self) -> bool {
		!self.locked.replace(true)
	}

	unsafe fn unlock(&self) {
		self.locked.set(false);
	}

	fn is_locked(&self) -> bool {
		self.locked.get()
	}
}

/// A spin lock that yields to the scheduler while contended.
///
/// Can outperform [`DefaultLock`] when critical sections are very short and emission rates
/// are very high. Prefer [`DefaultLock`] otherwise.
#[derive(Debug)]
pub struct SpinMutex {
	state: AtomicBool,
}

unsafe impl RawMutex for SpinMutex {
	#[allow(clippy::declare_interior_mutable_const)]
	const INIT: Self = Self {
		state: AtomicBool::new(false),
	};

	type GuardMarker = GuardSend;

	fn lock(&self) {
		while !self.try_lock() {
			while self.state.load(Ordering::Relaxed) {
				thread::yield_now();
			}
		}
	}

	fn try_lock(&self) -> bool {
		self.state
			.compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
			.is_ok()
	}

	unsafe fn unlock(&self) {
		self.state.store(false, Ordering::Release);
	}

	fn is_locked(&self) -> bool {
		self.state.load(Ordering::Relaxed)
	}
}
