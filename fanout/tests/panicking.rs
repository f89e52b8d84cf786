use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	sync::atomic::{AtomicI64, Ordering},
};

use fanout::{Signal, SignalUnsafe};

#[test]
fn panic_skips_later_slots() {
	static SUM: AtomicI64 = AtomicI64::new(0);
	fn add(i: &i32) {
		SUM.fetch_add(i64::from(*i), Ordering::Relaxed);
	}

	let sig = Signal::<i32>::new();
	let panicking = sig.group(0).connect(|_: &i32| panic!("slot failed"));
	sig.group(1).connect(add);

	assert!(catch_unwind(AssertUnwindSafe(|| sig.emit(&1))).is_err());
	assert_eq!(SUM.load(Ordering::Relaxed), 0);

	// The signal stays usable.
	sig.connect(add);
	assert_eq!(sig.slot_count(), 3);
	assert!(panicking.connected());

	panicking.disconnect();
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 2);
}

#[test]
fn panic_releases_the_null_lock() {
	static CALLS: AtomicI64 = AtomicI64::new(0);

	let sig = SignalUnsafe::<()>::new();
	let panicking = sig.connect(|_: &()| panic!("slot failed"));
	sig.connect(|_: &()| {
		CALLS.fetch_add(1, Ordering::Relaxed);
	});

	assert!(catch_unwind(AssertUnwindSafe(|| sig.emit(&()))).is_err());
	assert_eq!(CALLS.load(Ordering::Relaxed), 0);

	assert!(panicking.disconnect());
	sig.emit(&());
	assert_eq!(CALLS.load(Ordering::Relaxed), 1);
	assert_eq!(sig.slot_count(), 1);
}
