use std::{cell::Cell, rc::Rc, sync::Arc};

use fanout::{
	lock::NullMutex,
	track::ObjectId,
	Connection, SignalUnsafe,
};

#[test]
fn shared_state() {
	let sum = Rc::new(Cell::new(0));

	let sig = SignalUnsafe::<i32>::new();
	sig.connect({
		let sum = Rc::clone(&sum);
		move |i: &i32| sum.set(sum.get() + i)
	});

	sig.emit(&2);
	sig.emit(&3);
	assert_eq!(sum.get(), 5);

	drop(sig);
	assert_eq!(Rc::strong_count(&sum), 1);
}

#[test]
fn recursive_emission() {
	let calls = Rc::new(Cell::new(0));

	let sig = Arc::new(SignalUnsafe::<u8>::new());
	sig.connect_method(
		{
			let calls = Rc::clone(&calls);
			move |sig: &SignalUnsafe<u8>, depth: &u8| {
				calls.set(calls.get() + 1);
				if *depth > 0 {
					sig.emit(&(depth - 1));
				}
			}
		},
		&sig,
	);

	sig.emit(&3);
	assert_eq!(calls.get(), 4);
}

#[test]
fn connecting_from_a_slot() {
	let calls = Rc::new(Cell::new(0));

	let sig = Arc::new(SignalUnsafe::<()>::new());
	let weak = Arc::downgrade(&sig);
	sig.connect_extended({
		let calls = Rc::clone(&calls);
		move |c: &Connection<NullMutex>, _: &()| {
			c.disconnect();
			if let Some(sig) = weak.upgrade() {
				let calls = Rc::clone(&calls);
				sig.connect(move |_: &()| calls.set(calls.get() + 1));
			}
		}
	});

	sig.emit(&());
	sig.emit(&());
	assert!(calls.get() >= 1);
	assert_eq!(sig.slot_count(), 1);
}

struct Local {
	seen: Cell<i32>,
}

impl Local {
	fn see(&self, i: &i32) {
		self.seen.set(*i);
	}
}

#[test]
fn unchecked_method() {
	let local = Local { seen: Cell::new(0) };

	let sig = SignalUnsafe::<i32>::new();
	let connection = unsafe { sig.connect_method_unchecked(Local::see, &local) };
	sig.emit(&7);
	assert_eq!(local.seen.get(), 7);

	assert_eq!(sig.disconnect_object(&ObjectId::of(&local)), 1);
	assert!(!connection.valid());
}

#[test]
fn tracked_unsend_target() {
	let seen = Rc::new(Cell::new(0));
	let target = Arc::new(Cell::new(false));

	let sig = SignalUnsafe::<i32>::new();
	sig.connect_tracked(
		{
			let seen = Rc::clone(&seen);
			move |i: &i32| seen.set(*i)
		},
		&target,
	);

	sig.emit(&1);
	drop(target);
	sig.emit(&2);
	assert_eq!(seen.get(), 1);
	assert_eq!(sig.slot_count(), 0);
}
