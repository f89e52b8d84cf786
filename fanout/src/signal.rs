use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
	mem,
	ptr,
	sync::atomic::{AtomicBool, Ordering},
};
use std::sync::{Arc, Weak};

use fanout_core::{
	cow::CopyOnWrite,
	identity::{ObjectId, ObjectRef},
	lock::{Admits, DefaultLock, NullMutex},
	track::{Trackable, Unchecked},
};
use lock_api::{Mutex, RawMutex};
use scopeguard::guard_on_unwind;
use tracing::{debug, trace};

use crate::{
	observer::AsObserver,
	slot::{
		ErasedSlot, Extended, Invoke, Method, MethodExtended, Plain, SlotNode, Tracked,
		TrackedExtended,
	},
	slot_state::{Cleanable, GroupId, SlotCore},
	Connection, ScopedConnection,
};

/// A thread-safe signal with argument type `A`.
pub type Signal<A> = SignalBase<DefaultLock, A>;

/// A single-threaded signal with argument type `A`.
///
/// It can store callables that are not [`Send`] or [`Sync`], and is neither itself.
pub type SignalUnsafe<A> = SignalBase<NullMutex, A>;

/// A signal that calls its connected slots with `&A` when emitted.
///
/// Slots are called in ascending order of their [`GroupId`], and then in connection order.
/// (Disconnecting a slot may move the last slot of its group into its place.)
///
/// `L` is the signal's lock policy. The lock is only held briefly to modify or snapshot the
/// list of slots, never while slots run, so slots may freely connect, disconnect and emit
/// recursively. Whatever `L` is, the signal stores only values [admitted](`Admits`) by it.
///
/// Dropping the signal disconnects all of its slots.
pub struct SignalBase<L: RawMutex + 'static = DefaultLock, A: ?Sized + 'static = ()> {
	inner: Arc<SignalInner<L, A>>,
	blocked: AtomicBool,
}

struct SignalInner<L: RawMutex, A: ?Sized + 'static> {
	slots: Mutex<L, CopyOnWrite<Vec<SlotGroup<A>>>>,
}

unsafe impl<L: RawMutex + Send + Sync, A: ?Sized> Send for SignalInner<L, A> {}
unsafe impl<L: RawMutex + Send + Sync, A: ?Sized> Sync for SignalInner<L, A> {}

struct SlotGroup<A: ?Sized + 'static> {
	id: GroupId,
	slots: Vec<Arc<dyn ErasedSlot<A>>>,
}

impl<A: ?Sized> Clone for SlotGroup<A> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			slots: self.slots.clone(),
		}
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> Cleanable for SignalInner<L, A> {
	fn clean(&self, core: &SlotCore) {
		let (index, removed) = {
			let mut slots = self.slots.lock();
			let index = core.index();
			let Ok(position) = slots
				.read()
				.binary_search_by_key(&core.group(), |group| group.id)
			else {
				return;
			};
			if !slots.read()[position]
				.slots
				.get(index)
				.is_some_and(|slot| ptr::eq(slot.core(), core))
			{
				return;
			}

			let group = &mut slots.write()[position];
			let removed = group.slots.swap_remove(index);
			if let Some(moved) = group.slots.get(index) {
				moved.core().set_index(index);
			}
			(index, removed)
		};
		trace!(group = core.group(), index, "Cleaned disconnected slot.");
		// Dropped only now, since slots may own values whose destructors re-enter this signal.
		drop(removed);
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> SignalInner<L, A> {
	fn insert(&self, slot: Arc<dyn ErasedSlot<A>>) {
		let group_id = slot.core().group();
		let index = {
			let mut slots = self.slots.lock();
			let groups = slots.write();
			let position = match groups.binary_search_by_key(&group_id, |group| group.id) {
				Ok(position) => position,
				Err(position) => {
					groups.insert(
						position,
						SlotGroup {
							id: group_id,
							slots: Vec::new(),
						},
					);
					position
				}
			};
			let group = &mut groups[position].slots;
			let index = group.len();
			slot.core().set_index(index);
			group.push(slot);
			index
		};
		trace!(group = group_id, index, "Connected slot.");
	}

	/// Removes every slot for which `predicate` returns `true`.
	///
	/// Returns how many of them were disconnected by this call.
	fn disconnect_where(&self, mut predicate: impl FnMut(&dyn ErasedSlot<A>) -> bool) -> usize {
		let mut removed = Vec::new();
		{
			let mut slots = self.slots.lock();
			if !slots
				.read()
				.iter()
				.flat_map(|group| &group.slots)
				.any(|slot| predicate(&**slot))
			{
				return 0;
			}

			for group in slots.write() {
				let mut index = 0;
				while index < group.slots.len() {
					if predicate(&*group.slots[index]) {
						removed.push(group.slots.swap_remove(index));
						if let Some(moved) = group.slots.get(index) {
							moved.core().set_index(index);
						}
					} else {
						index += 1;
					}
				}
			}
		}
		removed
			.iter()
			.filter(|slot| slot.core().mark_disconnected())
			.count()
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> SignalBase<L, A> {
	/// Creates a new [`SignalBase`] without any slots.
	#[must_use]
	pub fn new() -> Self {
		Self {
			inner: Arc::new(SignalInner {
				slots: Mutex::new(CopyOnWrite::new(Vec::new())),
			}),
			blocked: AtomicBool::new(false),
		}
	}

	/// Selects the slot group `group` to connect to.
	///
	/// The `connect…` methods directly on [`SignalBase`] connect to group `0`.
	pub fn group(&self, group: GroupId) -> Connector<'_, L, A> {
		Connector {
			signal: self,
			group,
		}
	}

	/// Calls all connected, unblocked slots with `args`.
	///
	/// Does nothing while the signal is [blocked](`SignalBase::block`).
	///
	/// Slots connected or disconnected while this runs may or may not be called.
	/// If a slot panics, the remaining slots are skipped and the panic propagates.
	pub fn emit(&self, args: &A) {
		if self.blocked() {
			return;
		}

		let snapshot = self.inner.slots.lock().snapshot();
		let _unwinding = guard_on_unwind((), |()| {
			debug!("A slot panicked. Unwinding out of `SignalBase::emit`.");
		});
		for group in snapshot.iter() {
			for slot in &group.slots {
				slot.invoke(args);
			}
		}
	}

	/// The number of connected slots.
	#[must_use]
	pub fn slot_count(&self) -> usize {
		self.inner
			.slots
			.lock()
			.read()
			.iter()
			.map(|group| group.slots.len())
			.sum()
	}

	/// Blocks the whole signal, so that [`emit`](`SignalBase::emit`) does nothing.
	///
	/// Doesn't affect individual slots' [blocked](`Connection::blocked`) state.
	pub fn block(&self) {
		self.blocked.store(true, Ordering::Release);
	}

	/// Unblocks the signal.
	pub fn unblock(&self) {
		self.blocked.store(false, Ordering::Release);
	}

	/// Whether the signal is blocked.
	#[must_use]
	pub fn blocked(&self) -> bool {
		self.blocked.load(Ordering::Acquire)
	}

	/// Disconnects all slots that call `callable`.
	///
	/// Function pointers (`fn(&A)`, `fn(&Connection<L>, &A)`) are compared by address.
	/// Method pointers (`fn(&O, &A)`, `fn(&O, &Connection<L>, &A)`) are compared by address and type.
	/// Anything else is compared by type only.
	/// Type comparisons need the `type_identity` feature, without which they never match.
	///
	/// Fn items like `f` are function objects too. Connect and query with `f as fn(&A)` to
	/// match by address instead, which works without `type_identity`.
	///
	/// Returns the number of slots this call disconnected.
	pub fn disconnect_callable<F: 'static>(&self, callable: &F) -> usize {
		let query: &dyn Any = callable;
		let count = self
			.inner
			.disconnect_where(|slot| slot.matches_callable(query));
		debug!(count, "Disconnected slots by callable.");
		count
	}

	/// Disconnects all slots bound to or tracking `object`.
	///
	/// Returns the number of slots this call disconnected.
	pub fn disconnect_object(&self, object: &(impl ?Sized + ObjectRef)) -> usize {
		let object = object.object_id();
		if object == ObjectId::NONE {
			debug!("Ignored request to disconnect slots of no object.");
			return 0;
		}
		let count = self.inner.disconnect_where(|slot| slot.object() == object);
		debug!(count, ?object, "Disconnected slots by object.");
		count
	}

	/// Disconnects all slots that call `callable` and are bound to or track `object`.
	///
	/// See [`disconnect_callable`](`SignalBase::disconnect_callable`) for how callables are compared.
	///
	/// Returns the number of slots this call disconnected.
	pub fn disconnect_callable_object<F: 'static>(
		&self,
		callable: &F,
		object: &(impl ?Sized + ObjectRef),
	) -> usize {
		let object = object.object_id();
		if object == ObjectId::NONE {
			debug!("Ignored request to disconnect slots of no object.");
			return 0;
		}
		let query: &dyn Any = callable;
		let count = self
			.inner
			.disconnect_where(|slot| slot.object() == object && slot.matches_callable(query));
		debug!(count, ?object, "Disconnected slots by callable and object.");
		count
	}

	/// Disconnects all slots in `group`.
	///
	/// Returns the number of slots the group had.
	pub fn disconnect_group(&self, group: GroupId) -> usize {
		let removed = {
			let mut slots = self.inner.slots.lock();
			let Ok(position) = slots.read().binary_search_by_key(&group, |g| g.id) else {
				return 0;
			};
			slots.write().remove(position)
		};
		for slot in &removed.slots {
			slot.core().mark_disconnected();
		}
		debug!(group, count = removed.slots.len(), "Disconnected slot group.");
		removed.slots.len()
	}

	/// Disconnects all slots.
	pub fn disconnect_all(&self) {
		let removed = mem::replace(
			&mut *self.inner.slots.lock(),
			CopyOnWrite::new(Vec::new()),
		);
		for slot in removed.read().iter().flat_map(|group| &group.slots) {
			slot.core().mark_disconnected();
		}
	}

	fn cleaner(&self) -> Weak<dyn Cleanable> {
		let cleaner: Weak<SignalInner<L, A>> = Arc::downgrade(&self.inner);
		cleaner
	}

	fn insert<K: Invoke<A>>(&self, slot: Arc<SlotNode<K>>) -> Connection<L> {
		let state: Weak<SlotNode<K>> = Arc::downgrade(&slot);
		self.inner.insert(slot);
		Connection::new(state)
	}

	/// Connects `f` to group `0`.
	///
	/// See [`Connector::connect`].
	pub fn connect<F: 'static + Fn(&A)>(&self, f: F) -> Connection<L>
	where
		L: Admits<F>,
	{
		self.group(0).connect(f)
	}

	/// Connects `f`, which receives its own [`Connection`], to group `0`.
	///
	/// See [`Connector::connect_extended`].
	pub fn connect_extended<F: 'static + Fn(&Connection<L>, &A)>(&self, f: F) -> Connection<L>
	where
		L: Admits<F>,
	{
		self.group(0).connect_extended(f)
	}

	/// Connects `f` to group `0` for as long as `target` lives.
	///
	/// See [`Connector::connect_tracked`].
	pub fn connect_tracked<F: 'static + Fn(&A), T: ?Sized + Trackable>(
		&self,
		f: F,
		target: &T,
	) -> Connection<L>
	where
		T::Target: 'static,
		L: Admits<F> + Admits<T::Target>,
	{
		self.group(0).connect_tracked(f, target)
	}

	/// Connects `f`, which receives its own [`Connection`], to group `0` for as long as `target` lives.
	///
	/// See [`Connector::connect_tracked_extended`].
	pub fn connect_tracked_extended<F: 'static + Fn(&Connection<L>, &A), T: ?Sized + Trackable>(
		&self,
		f: F,
		target: &T,
	) -> Connection<L>
	where
		T::Target: 'static,
		L: Admits<F> + Admits<T::Target>,
	{
		self.group(0).connect_tracked_extended(f, target)
	}

	/// Connects method `m` of the tracked `object` to group `0`.
	///
	/// See [`Connector::connect_method`].
	pub fn connect_method<O: ?Sized + 'static, M: 'static + Fn(&O, &A)>(
		&self,
		m: M,
		object: &(impl ?Sized + Trackable<Target = O>),
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.group(0).connect_method(m, object)
	}

	/// Connects method `m` of the tracked `object`, which receives its own [`Connection`], to group `0`.
	///
	/// See [`Connector::connect_method_extended`].
	pub fn connect_method_extended<O: ?Sized + 'static, M: 'static + Fn(&O, &Connection<L>, &A)>(
		&self,
		m: M,
		object: &(impl ?Sized + Trackable<Target = O>),
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.group(0).connect_method_extended(m, object)
	}

	/// Connects method `m` of `object` to group `0` without tracking `object`.
	///
	/// # Safety
	///
	/// See [`Connector::connect_method_unchecked`].
	pub unsafe fn connect_method_unchecked<O: ?Sized + 'static, M: 'static + Fn(&O, &A)>(
		&self,
		m: M,
		object: &O,
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.group(0).connect_method_unchecked(m, object)
	}

	/// Connects method `m` of `object`, which receives its own [`Connection`], to group `0`
	/// without tracking `object`.
	///
	/// # Safety
	///
	/// See [`Connector::connect_method_unchecked`].
	pub unsafe fn connect_method_unchecked_extended<
		O: ?Sized + 'static,
		M: 'static + Fn(&O, &Connection<L>, &A),
	>(
		&self,
		m: M,
		object: &O,
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.group(0).connect_method_unchecked_extended(m, object)
	}

	/// Connects method `m` of `object` to group `0` and registers the connection with `object`'s
	/// [`Observer`](`crate::Observer`).
	///
	/// See [`Connector::connect_observer`].
	pub fn connect_observer<O: 'static + AsObserver<L>, M: 'static + Fn(&O, &A)>(
		&self,
		m: M,
		object: &Arc<O>,
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.group(0).connect_observer(m, object)
	}

	/// Connects `f` to group `0`, disconnecting it again when the returned handle is dropped.
	pub fn connect_scoped<F: 'static + Fn(&A)>(&self, f: F) -> ScopedConnection<L>
	where
		L: Admits<F>,
	{
		self.group(0).connect_scoped(f)
	}

	/// Forwards emissions to `target` for as long as it lives, from group `0`.
	///
	/// See [`Connector::connect_signal`].
	pub fn connect_signal<L2: RawMutex + 'static>(
		&self,
		target: &Arc<SignalBase<L2, A>>,
	) -> Connection<L>
	where
		L: Admits<SignalBase<L2, A>> + Admits<fn(&SignalBase<L2, A>, &A)>,
	{
		self.group(0).connect_signal(target)
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> Default for SignalBase<L, A> {
	fn default() -> Self {
		Self::new()
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> Drop for SignalBase<L, A> {
	fn drop(&mut self) {
		self.disconnect_all();
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> Debug for SignalBase<L, A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignalBase")
			.field("slot_count", &self.slot_count())
			.field("blocked", &self.blocked())
			.finish_non_exhaustive()
	}
}

/// Connects slots to one group of a [`SignalBase`].
///
/// Created by [`SignalBase::group`].
///
/// All callables and objects are stored by the signal and must be [admitted](`Admits`) by its
/// lock policy `L`. For thread-safe policies, that means they must be [`Send`] and [`Sync`].
#[must_use = "A `Connector` does nothing unless a slot is connected through it."]
pub struct Connector<'a, L: RawMutex + 'static, A: ?Sized + 'static> {
	signal: &'a SignalBase<L, A>,
	group: GroupId,
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> Connector<'_, L, A> {
	/// Connects `f`.
	///
	/// ```rust
	/// use fanout::Signal;
	///
	/// let signal = Signal::<str>::new();
	/// let connection = signal.group(1).connect(|message: &str| println!("{message}"));
	///
	/// signal.emit("Hello!");
	/// connection.disconnect();
	/// ```
	pub fn connect<F: 'static + Fn(&A)>(self, f: F) -> Connection<L>
	where
		L: Admits<F>,
	{
		self.signal.insert(SlotNode::new::<A>(
			Plain(f),
			self.group,
			self.signal.cleaner(),
		))
	}

	/// Connects `f`, which receives its own [`Connection`] in addition to the arguments.
	///
	/// This lets a slot disconnect or block itself.
	pub fn connect_extended<F: 'static + Fn(&Connection<L>, &A)>(self, f: F) -> Connection<L>
	where
		L: Admits<F>,
	{
		self.signal
			.insert(SlotNode::new_cyclic::<A, L>(
				self.group,
				self.signal.cleaner(),
				|connection| Extended { f, connection },
			))
	}

	/// Connects `f` for as long as `target` lives.
	///
	/// The slot disconnects itself the first time it would run after `target` is dropped.
	/// Until then, [`Connection::connected`] reports `false` already.
	pub fn connect_tracked<F: 'static + Fn(&A), T: ?Sized + Trackable>(
		self,
		f: F,
		target: &T,
	) -> Connection<L>
	where
		T::Target: 'static,
		L: Admits<F> + Admits<T::Target>,
	{
		self.signal.insert(SlotNode::new::<A>(
			Tracked {
				f,
				target: target.to_weak(),
			},
			self.group,
			self.signal.cleaner(),
		))
	}

	/// Connects `f`, which receives its own [`Connection`], for as long as `target` lives.
	pub fn connect_tracked_extended<F: 'static + Fn(&Connection<L>, &A), T: ?Sized + Trackable>(
		self,
		f: F,
		target: &T,
	) -> Connection<L>
	where
		T::Target: 'static,
		L: Admits<F> + Admits<T::Target>,
	{
		let target = target.to_weak();
		self.signal
			.insert(SlotNode::new_cyclic::<A, L>(
				self.group,
				self.signal.cleaner(),
				|connection| TrackedExtended {
					f,
					target,
					connection,
				},
			))
	}

	/// Connects method `m` of `object`, which is tracked.
	///
	/// `m` receives the object first, so methods like `Type::method` can be passed directly.
	/// The slot disconnects itself the first time it would run after `object` is dropped.
	pub fn connect_method<O: ?Sized + 'static, M: 'static + Fn(&O, &A)>(
		self,
		m: M,
		object: &(impl ?Sized + Trackable<Target = O>),
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.signal.insert(SlotNode::new::<A>(
			Method {
				m,
				object: object.to_weak(),
			},
			self.group,
			self.signal.cleaner(),
		))
	}

	/// Connects method `m` of `object`, which is tracked. `m` also receives its own [`Connection`].
	pub fn connect_method_extended<O: ?Sized + 'static, M: 'static + Fn(&O, &Connection<L>, &A)>(
		self,
		m: M,
		object: &(impl ?Sized + Trackable<Target = O>),
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		let object = object.to_weak();
		self.signal
			.insert(SlotNode::new_cyclic::<A, L>(
				self.group,
				self.signal.cleaner(),
				|connection| MethodExtended {
					m,
					object,
					connection,
				},
			))
	}

	/// Connects method `m` of `object` without tracking it.
	///
	/// # Safety
	///
	/// `object` **must** stay alive and in place for as long as the slot may run.
	/// Disconnect it (or drop the signal) before `object` is dropped or moved.
	pub unsafe fn connect_method_unchecked<O: ?Sized + 'static, M: 'static + Fn(&O, &A)>(
		self,
		m: M,
		object: &O,
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		self.signal.insert(SlotNode::new::<A>(
			Method {
				m,
				object: Unchecked::new(object),
			},
			self.group,
			self.signal.cleaner(),
		))
	}

	/// Connects method `m` of `object` without tracking it. `m` also receives its own [`Connection`].
	///
	/// # Safety
	///
	/// See [`Connector::connect_method_unchecked`].
	pub unsafe fn connect_method_unchecked_extended<
		O: ?Sized + 'static,
		M: 'static + Fn(&O, &Connection<L>, &A),
	>(
		self,
		m: M,
		object: &O,
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		let object = Unchecked::new(object);
		self.signal
			.insert(SlotNode::new_cyclic::<A, L>(
				self.group,
				self.signal.cleaner(),
				|connection| MethodExtended {
					m,
					object,
					connection,
				},
			))
	}

	/// Connects method `m` of `object`, which is tracked, and registers the connection with
	/// `object`'s [`Observer`](`crate::Observer`).
	///
	/// The observer disconnects the slot when it is dropped or told to
	/// [disconnect all](`crate::Observer::disconnect_all`) of its connections.
	pub fn connect_observer<O: 'static + AsObserver<L>, M: 'static + Fn(&O, &A)>(
		self,
		m: M,
		object: &Arc<O>,
	) -> Connection<L>
	where
		L: Admits<M> + Admits<O>,
	{
		let connection = self.connect_method(m, object);
		object.observer().add_connection(connection.clone());
		connection
	}

	/// Connects `f`, disconnecting it again when the returned handle is dropped.
	pub fn connect_scoped<F: 'static + Fn(&A)>(self, f: F) -> ScopedConnection<L>
	where
		L: Admits<F>,
	{
		self.connect(f).into_scoped()
	}

	/// Forwards emissions to `target` for as long as it lives.
	///
	/// Signals can be chained into cycles. Slots have to break them eventually, for example by
	/// disconnecting or blocking themselves.
	pub fn connect_signal<L2: RawMutex + 'static>(
		self,
		target: &Arc<SignalBase<L2, A>>,
	) -> Connection<L>
	where
		L: Admits<SignalBase<L2, A>> + Admits<fn(&SignalBase<L2, A>, &A)>,
	{
		let emit: fn(&SignalBase<L2, A>, &A) = SignalBase::emit;
		self.connect_method(emit, target)
	}
}

impl<L: RawMutex + 'static, A: ?Sized + 'static> Debug for Connector<'_, L, A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connector")
			.field("signal", self.signal)
			.field("group", &self.group)
			.finish()
	}
}
