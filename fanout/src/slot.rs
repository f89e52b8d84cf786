//! Slot variants.
//!
//! Every slot is a [`SlotNode`] around a [`SlotKind`], which decides what the slot calls and
//! whether it tracks or binds an object:
//!
//! | kind | calls | with its own [`Connection`] |
//! |---|---|---|
//! | [`Plain`] | `f(args)` | [`Extended`] |
//! | [`Tracked`] | `f(args)` while the target lives | [`TrackedExtended`] |
//! | [`Method`] | `m(object, args)` | [`MethodExtended`] |
//!
//! Tracked and method slots disconnect themselves the first time they would run after their
//! object is gone.

use core::any::Any;
use std::sync::{Arc, Weak};

use fanout_core::{
	identity::{CallableId, CallableKind, FnPtr, ObjectId},
	track::Binding,
};
use tracing::debug;

use crate::{
	slot_state::{Cleanable, GroupId, SlotCore, SlotState},
	Connection,
};

/// Behaviour shared by all slot kinds, independent of the signal's arguments.
pub(crate) trait SlotKind: 'static {
	/// Whether the tracked or bound object is gone.
	fn expired(&self) -> bool {
		false
	}

	fn object_id(&self) -> ObjectId {
		ObjectId::NONE
	}
}

/// A [`SlotKind`] that can be called with `A`.
pub(crate) trait Invoke<A: ?Sized>: SlotKind {
	/// The stored callable.
	type Callable: 'static;
	/// The function pointer shape [`Invoke::Callable`] is identified by, if it is one.
	type Shape: FnPtr;
	const KIND: CallableKind;

	fn callable(&self) -> &Self::Callable;

	/// Runs the slot. The caller has already checked that it is connected and unblocked.
	fn call(&self, core: &SlotCore, args: &A);
}

/// A slot as stored by a signal.
pub(crate) trait ErasedSlot<A: ?Sized>: SlotState {
	/// Runs the slot if it's connected and not blocked.
	fn invoke(&self, args: &A);

	/// Whether `query` is (a copy of) the stored callable.
	fn matches_callable(&self, query: &dyn Any) -> bool;

	fn object(&self) -> ObjectId;
}

pub(crate) struct SlotNode<K> {
	core: SlotCore,
	callable: CallableId,
	object: ObjectId,
	kind: K,
}

impl<K: SlotKind> SlotNode<K> {
	pub(crate) fn new<A: ?Sized>(kind: K, group: GroupId, cleaner: Weak<dyn Cleanable>) -> Arc<Self>
	where
		K: Invoke<A>,
	{
		Arc::new(Self::from_kind(kind, group, cleaner))
	}

	/// Creates a slot whose kind holds a [`Connection`] to the slot itself.
	pub(crate) fn new_cyclic<A: ?Sized, L>(
		group: GroupId,
		cleaner: Weak<dyn Cleanable>,
		make_kind: impl FnOnce(Connection<L>) -> K,
	) -> Arc<Self>
	where
		K: Invoke<A>,
	{
		Arc::new_cyclic(|this: &Weak<Self>| {
			let this: Weak<dyn SlotState> = this.clone();
			Self::from_kind(make_kind(Connection::new(this)), group, cleaner)
		})
	}

	fn from_kind<A: ?Sized>(kind: K, group: GroupId, cleaner: Weak<dyn Cleanable>) -> Self
	where
		K: Invoke<A>,
	{
		Self {
			core: SlotCore::new(group, cleaner),
			callable: CallableId::of::<K::Callable, K::Shape>(kind.callable(), K::KIND),
			object: kind.object_id(),
			kind,
		}
	}
}

impl<K: SlotKind> SlotState for SlotNode<K> {
	fn core(&self) -> &SlotCore {
		&self.core
	}

	fn connected(&self) -> bool {
		self.core.connected() && !self.kind.expired()
	}
}

impl<A: ?Sized, K: Invoke<A>> ErasedSlot<A> for SlotNode<K> {
	fn invoke(&self, args: &A) {
		if self.core.connected() && !self.core.blocked() {
			self.kind.call(&self.core, args);
		}
	}

	fn matches_callable(&self, query: &dyn Any) -> bool {
		CallableId::of_query::<K::Callable, K::Shape>(query, K::KIND)
			.is_some_and(|query| self.callable.matches(&query))
	}

	fn object(&self) -> ObjectId {
		self.object
	}
}

/// Resolves `binding`, disconnecting the slot if it is gone.
fn resolve_or_expire<'a, B: Binding>(binding: &'a B, core: &SlotCore) -> Option<B::Strong<'a>> {
	let resolved = binding.resolve();
	if resolved.is_none() {
		debug!(group = core.group(), "Tracked object is gone. Disconnecting slot.");
		core.disconnect();
	}
	// Another thread may have disconnected the slot in the meantime.
	resolved.filter(|_| core.connected())
}

pub(crate) struct Plain<F>(pub(crate) F);

impl<F: 'static> SlotKind for Plain<F> {}

impl<A: ?Sized + 'static, F: 'static + Fn(&A)> Invoke<A> for Plain<F> {
	type Callable = F;
	type Shape = fn(&A);
	const KIND: CallableKind = CallableKind::Function;

	fn callable(&self) -> &F {
		&self.0
	}

	fn call(&self, _: &SlotCore, args: &A) {
		(self.0)(args);
	}
}

pub(crate) struct Extended<F, L> {
	pub(crate) f: F,
	pub(crate) connection: Connection<L>,
}

impl<F: 'static, L: 'static> SlotKind for Extended<F, L> {}

impl<A: ?Sized + 'static, F: 'static + Fn(&Connection<L>, &A), L: 'static> Invoke<A>
	for Extended<F, L>
{
	type Callable = F;
	type Shape = fn(&Connection<L>, &A);
	const KIND: CallableKind = CallableKind::Function;

	fn callable(&self) -> &F {
		&self.f
	}

	fn call(&self, _: &SlotCore, args: &A) {
		(self.f)(&self.connection, args);
	}
}

pub(crate) struct Tracked<F, B> {
	pub(crate) f: F,
	pub(crate) target: B,
}

impl<F: 'static, B: Binding> SlotKind for Tracked<F, B> {
	fn expired(&self) -> bool {
		self.target.expired()
	}

	fn object_id(&self) -> ObjectId {
		self.target.object_id()
	}
}

impl<A: ?Sized + 'static, F: 'static + Fn(&A), B: Binding> Invoke<A> for Tracked<F, B> {
	type Callable = F;
	type Shape = fn(&A);
	const KIND: CallableKind = CallableKind::Function;

	fn callable(&self) -> &F {
		&self.f
	}

	fn call(&self, core: &SlotCore, args: &A) {
		if let Some(_alive) = resolve_or_expire(&self.target, core) {
			(self.f)(args);
		}
	}
}

pub(crate) struct TrackedExtended<F, B, L> {
	pub(crate) f: F,
	pub(crate) target: B,
	pub(crate) connection: Connection<L>,
}

impl<F: 'static, B: Binding, L: 'static> SlotKind for TrackedExtended<F, B, L> {
	fn expired(&self) -> bool {
		self.target.expired()
	}

	fn object_id(&self) -> ObjectId {
		self.target.object_id()
	}
}

impl<A: ?Sized + 'static, F: 'static + Fn(&Connection<L>, &A), B: Binding, L: 'static> Invoke<A>
	for TrackedExtended<F, B, L>
{
	type Callable = F;
	type Shape = fn(&Connection<L>, &A);
	const KIND: CallableKind = CallableKind::Function;

	fn callable(&self) -> &F {
		&self.f
	}

	fn call(&self, core: &SlotCore, args: &A) {
		if let Some(_alive) = resolve_or_expire(&self.target, core) {
			(self.f)(&self.connection, args);
		}
	}
}

pub(crate) struct Method<M, B> {
	pub(crate) m: M,
	pub(crate) object: B,
}

impl<M: 'static, B: Binding> SlotKind for Method<M, B> {
	fn expired(&self) -> bool {
		self.object.expired()
	}

	fn object_id(&self) -> ObjectId {
		self.object.object_id()
	}
}

impl<A: ?Sized + 'static, M: 'static + Fn(&B::Object, &A), B: Binding> Invoke<A> for Method<M, B> {
	type Callable = M;
	type Shape = fn(&B::Object, &A);
	const KIND: CallableKind = CallableKind::Method;

	fn callable(&self) -> &M {
		&self.m
	}

	fn call(&self, core: &SlotCore, args: &A) {
		if let Some(object) = resolve_or_expire(&self.object, core) {
			(self.m)(&*object, args);
		}
	}
}

pub(crate) struct MethodExtended<M, B, L> {
	pub(crate) m: M,
	pub(crate) object: B,
	pub(crate) connection: Connection<L>,
}

impl<M: 'static, B: Binding, L: 'static> SlotKind for MethodExtended<M, B, L> {
	fn expired(&self) -> bool {
		self.object.expired()
	}

	fn object_id(&self) -> ObjectId {
		self.object.object_id()
	}
}

impl<
		A: ?Sized + 'static,
		M: 'static + Fn(&B::Object, &Connection<L>, &A),
		B: Binding,
		L: 'static,
	> Invoke<A> for MethodExtended<M, B, L>
{
	type Callable = M;
	type Shape = fn(&B::Object, &Connection<L>, &A);
	const KIND: CallableKind = CallableKind::Method;

	fn callable(&self) -> &M {
		&self.m
	}

	fn call(&self, core: &SlotCore, args: &A) {
		if let Some(object) = resolve_or_expire(&self.object, core) {
			(self.m)(&*object, &self.connection, args);
		}
	}
}
