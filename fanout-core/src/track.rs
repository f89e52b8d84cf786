//! Lifetime tracking for slots.
//!
//! A [`Trackable`] can be observed weakly. A slot tracking one disconnects itself lazily, the
//! first time it would run after the target is gone.
//!
//! A [`Binding`] is how a method slot reaches its object: either through a [`Weak`] (tracked),
//! or through an [`Unchecked`] pointer whose validity the caller vouches for.

use core::{fmt::Debug, ops::Deref, ptr::NonNull};
use std::sync::{Arc, Weak};

use crate::identity::ObjectId;

/// Values that can be observed through a [`Weak`] reference.
pub trait Trackable {
	/// The type of the tracked object.
	type Target: ?Sized;

	/// Creates a [`Weak`] reference to the tracked object.
	fn to_weak(&self) -> Weak<Self::Target>;
}

impl<T: ?Sized> Trackable for Arc<T> {
	type Target = T;

	fn to_weak(&self) -> Weak<T> {
		Arc::downgrade(self)
	}
}

impl<T: ?Sized> Trackable for Weak<T> {
	type Target = T;

	fn to_weak(&self) -> Weak<T> {
		self.clone()
	}
}

/// How a method slot reaches the object it's bound to.
pub trait Binding: 'static {
	/// The bound object's type.
	type Object: ?Sized + 'static;

	/// Keeps the object alive while a slot runs.
	type Strong<'a>: Deref<Target = Self::Object>
	where
		Self: 'a;

	/// Tries to access the object. [`None`] means it's gone for good.
	fn resolve(&self) -> Option<Self::Strong<'_>>;

	/// Whether [`resolve`](`Binding::resolve`) would fail.
	fn expired(&self) -> bool;

	/// The bound object's identity, or [`ObjectId::NONE`] if it is already gone.
	fn object_id(&self) -> ObjectId;
}

impl<T: ?Sized + 'static> Binding for Weak<T> {
	type Object = T;
	type Strong<'a> = Arc<T>;

	fn resolve(&self) -> Option<Arc<T>> {
		self.upgrade()
	}

	fn expired(&self) -> bool {
		self.strong_count() == 0
	}

	fn object_id(&self) -> ObjectId {
		crate::identity::ObjectRef::object_id(self)
	}
}

/// A [`Binding`] to an object through a plain pointer. Never expires.
pub struct Unchecked<T: ?Sized>(NonNull<T>);

unsafe impl<T: ?Sized + Sync> Send for Unchecked<T> {}
unsafe impl<T: ?Sized + Sync> Sync for Unchecked<T> {}

impl<T: ?Sized> Unchecked<T> {
	/// Binds to `object` without tracking it.
	///
	/// # Safety
	///
	/// `object` **must** outlive every use of the resulting [`Unchecked`].
	/// For slots, that means the slot **must** be disconnected before `object` is dropped or moved.
	pub unsafe fn new(object: &T) -> Self {
		Self(NonNull::from(object))
	}
}

impl<T: ?Sized> Debug for Unchecked<T> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_tuple("Unchecked").field(&self.0.as_ptr().cast::<()>()).finish()
	}
}

impl<T: ?Sized + 'static> Binding for Unchecked<T> {
	type Object = T;
	type Strong<'a> = &'a T;

	fn resolve(&self) -> Option<&T> {
		// SAFETY: Guaranteed by the caller of `Unchecked::new`.
		Some(unsafe { self.0.as_ref() })
	}

	fn expired(&self) -> bool {
		false
	}

	fn object_id(&self) -> ObjectId {
		ObjectId::of_ptr(self.0.as_ptr().cast_const())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn weak_binding_expires() {
		let target = Arc::new(String::from("target"));
		let binding = target.to_weak();
		assert!(!binding.expired());
		assert_eq!(binding.object_id(), ObjectId::of(&*target));
		assert_eq!(binding.resolve().as_deref().map(String::as_str), Some("target"));

		drop(target);
		assert!(binding.expired());
		assert!(binding.resolve().is_none());
		assert!(binding.object_id().is_none());
	}

	#[test]
	fn unchecked_binding_resolves() {
		let target = 7;
		let binding = unsafe { Unchecked::new(&target) };
		assert!(!binding.expired());
		assert_eq!(binding.resolve().copied(), Some(7));
		assert_eq!(binding.object_id(), ObjectId::of(&target));
	}
}
