use std::sync::{
	atomic::{AtomicI64, Ordering},
	Arc,
};

use fanout::{Connection, Signal};

#[test]
fn free_function() {
	static SUM: AtomicI64 = AtomicI64::new(0);
	fn fc(c: &Connection, i: &i32) {
		SUM.fetch_add(i64::from(*i), Ordering::Relaxed);
		c.disconnect();
	}

	let sig = Signal::<i32>::new();
	sig.connect_extended(fc);

	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 1);
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 1);
	assert_eq!(sig.slot_count(), 0);
}

#[test]
fn function_pointer_identity() {
	fn fc(_: &Connection, _: &i32) {}
	let fc: fn(&Connection, &i32) = fc;

	let sig = Signal::<i32>::new();
	sig.connect_extended(fc);
	sig.connect_extended(fc);
	assert_eq!(sig.disconnect_callable(&fc), 2);
}

#[test]
fn closure_disconnects_itself() {
	static SUM: AtomicI64 = AtomicI64::new(0);

	let sig = Signal::<i64>::new();
	let connection = sig.connect_extended(|c: &Connection, i: &i64| {
		SUM.fetch_add(*i, Ordering::Relaxed);
		assert!(c.connected());
		assert!(c.disconnect());
		assert!(!c.connected());
	});
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 1);
	assert!(!connection.connected());

	sig.connect_extended(|c: &Connection, i: &i64| {
		SUM.fetch_add(2 * i, Ordering::Relaxed);
		c.disconnect();
	});
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 3);
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 3);
}

#[test]
fn slot_blocks_itself() {
	static CALLS: AtomicI64 = AtomicI64::new(0);

	let sig = Signal::<()>::new();
	let connection = sig.connect_extended(|c: &Connection, _: &()| {
		if CALLS.fetch_add(1, Ordering::Relaxed) == 2 {
			c.block();
		}
	});

	for _ in 0..5 {
		sig.emit(&());
	}
	assert_eq!(CALLS.load(Ordering::Relaxed), 3);
	assert!(connection.blocked());
	assert!(connection.connected());
}

struct S {
	sum: AtomicI64,
}

impl S {
	fn f(&self, c: &Connection, i: &i32) {
		self.sum.fetch_add(i64::from(*i), Ordering::Relaxed);
		c.disconnect();
	}
}

#[test]
fn method() {
	let sig = Signal::<i32>::new();
	let p = S {
		sum: AtomicI64::new(0),
	};
	unsafe { sig.connect_method_unchecked_extended(S::f, &p) };

	sig.emit(&1);
	assert_eq!(p.sum.load(Ordering::Relaxed), 1);
	sig.emit(&1);
	assert_eq!(p.sum.load(Ordering::Relaxed), 1);
}

#[test]
fn tracked_method() {
	let sig = Signal::<i32>::new();
	let p = Arc::new(S {
		sum: AtomicI64::new(0),
	});
	sig.connect_method_extended(S::f, &p);

	sig.emit(&1);
	assert_eq!(p.sum.load(Ordering::Relaxed), 1);
	sig.emit(&1);
	assert_eq!(p.sum.load(Ordering::Relaxed), 1);

	let connection = sig.connect_method_extended(S::f, &p);
	let weak = Arc::downgrade(&p);
	drop(p);
	assert!(!connection.connected());
	sig.emit(&1);
	assert!(weak.upgrade().is_none());
	assert_eq!(sig.slot_count(), 0);
}

#[test]
fn tracked() {
	static SUM: AtomicI64 = AtomicI64::new(0);
	let o = |c: &Connection, i: &i32| {
		SUM.fetch_add(i64::from(*i), Ordering::Relaxed);
		c.disconnect();
	};

	let sig = Signal::<i32>::new();
	let d = Arc::new(());
	sig.connect_tracked_extended(o, &d);

	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 1);
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 1);

	sig.connect_tracked_extended(o, &d);
	drop(d);
	sig.emit(&1);
	assert_eq!(SUM.load(Ordering::Relaxed), 1);
	assert_eq!(sig.slot_count(), 0);
}

#[test]
fn group() {
	static ORDER: AtomicI64 = AtomicI64::new(0);

	let sig = Signal::<()>::new();
	sig.group(2).connect_extended(|c: &Connection, _: &()| {
		assert_eq!(ORDER.fetch_add(1, Ordering::Relaxed), 1);
		c.disconnect();
	});
	sig.group(-2).connect_extended(|c: &Connection, _: &()| {
		assert_eq!(ORDER.fetch_add(1, Ordering::Relaxed), 0);
		c.disconnect();
	});

	sig.emit(&());
	assert_eq!(ORDER.load(Ordering::Relaxed), 2);
	assert_eq!(sig.slot_count(), 0);
}
