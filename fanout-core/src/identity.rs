//! Callable and object identities.
//!
//! Slots remember what they call so that they can later be disconnected by it, without keeping
//! a second copy of the callable around.
//!
//! - Function pointers are identified by their address, stored as raw bytes in a [`FuncPtr`].
//! - Function pointers that take the bound object first ("methods") are identified by address
//!   as well, but the match is confirmed by type, since the same address can be shared by
//!   functions of different signatures after code folding.
//! - Any other callable (closures, fn items, boxed callables) is identified by its type only.
//!   All values of one closure type are considered the same callable.
//!
//! Type confirmation requires the `type_identity` feature. Without it, only plain function
//! pointer identities ever match.
//!
//! Object identity ([`ObjectId`]) is tracked separately and is the untyped address of the
//! bound or tracked object.

use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
	mem::size_of,
};
use std::sync::{Arc, Weak};

#[allow(dead_code)]
union FnShapes {
	free: fn(),
	unary: fn(&()),
	binary: fn(&(), &()),
	ternary: fn(&(), &(), &()),
	object: *const (),
}

/// Capacity of a [`FuncPtr`], in bytes.
///
/// Wide enough for every function pointer shape a slot can store.
pub const FUNC_PTR_CAPACITY: usize = size_of::<FnShapes>();

/// The raw bytes of a function pointer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncPtr {
	data: [u8; FUNC_PTR_CAPACITY],
	len: usize,
}

impl FuncPtr {
	/// A [`FuncPtr`] that doesn't refer to any function.
	pub const EMPTY: Self = Self {
		data: [0; FUNC_PTR_CAPACITY],
		len: 0,
	};

	/// Copies the bytes of a function pointer's `address`.
	#[must_use]
	pub fn from_address(address: usize) -> Self {
		let bytes = address.to_ne_bytes();
		let mut data = [0; FUNC_PTR_CAPACITY];
		data[..bytes.len()].copy_from_slice(&bytes);
		Self {
			data,
			len: bytes.len(),
		}
	}

	/// The stored bytes.
	#[must_use]
	pub fn bytes(&self) -> &[u8] {
		&self.data[..self.len]
	}

	/// Whether this [`FuncPtr`] refers to no function.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}

impl Debug for FuncPtr {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("FuncPtr(")?;
		for byte in self.bytes().iter().rev() {
			write!(f, "{byte:02x}")?;
		}
		f.write_str(")")
	}
}

/// Function pointer shapes whose address can be captured.
///
/// Implemented for `fn(&X)`, `fn(&X, &Y)` and `fn(&X, &Y, &Z)`.
pub trait FnPtr: Copy + 'static {
	/// The pointer's address.
	fn address(self) -> usize;
}

macro_rules! impl_fn_ptr {
	($($param:ident),+) => {
		impl<$($param: ?Sized + 'static),+> FnPtr for fn($(&$param),+) {
			fn address(self) -> usize {
				self as usize
			}
		}
	};
}

impl_fn_ptr!(X);
impl_fn_ptr!(X, Y);
impl_fn_ptr!(X, Y, Z);

/// How a [`CallableId`] identifies its callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableKind {
	/// A free function pointer. Compared by address only.
	Function,
	/// A function pointer that receives the bound object first. Compared by address and type.
	Method,
	/// Any other callable. Compared by type.
	FunctionObject,
}

#[cfg(feature = "type_identity")]
type TypeTag = Option<core::any::TypeId>;
#[cfg(not(feature = "type_identity"))]
type TypeTag = Option<core::convert::Infallible>;

#[cfg(feature = "type_identity")]
fn type_tag<T: ?Sized + 'static>() -> TypeTag {
	Some(core::any::TypeId::of::<T>())
}

#[cfg(not(feature = "type_identity"))]
fn type_tag<T: ?Sized + 'static>() -> TypeTag {
	None
}

/// The identity of a stored callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableId {
	ptr: FuncPtr,
	tag: TypeTag,
	kind: CallableKind,
}

impl CallableId {
	/// Captures the identity of `callable`.
	///
	/// If `F` is the function pointer shape `P`, the identity is `P`'s address with the given
	/// `kind`. Otherwise `callable` is a [function object](`CallableKind::FunctionObject`).
	#[must_use]
	pub fn of<F: 'static, P: FnPtr>(callable: &F, kind: CallableKind) -> Self {
		match (callable as &dyn Any).downcast_ref::<P>() {
			Some(pointer) => Self::pointer(*pointer, kind),
			None => Self::object_of::<F>(),
		}
	}

	/// Captures the identity of a type-erased `query` *as if* stored by a slot holding an `F`.
	///
	/// Returns [`None`] if `query` can't possibly be the same callable.
	#[must_use]
	pub fn of_query<F: 'static, P: FnPtr>(query: &dyn Any, kind: CallableKind) -> Option<Self> {
		if let Some(pointer) = query.downcast_ref::<P>() {
			Some(Self::pointer(*pointer, kind))
		} else if query.is::<F>() {
			Some(Self::object_of::<F>())
		} else {
			None
		}
	}

	fn pointer<P: FnPtr>(pointer: P, kind: CallableKind) -> Self {
		Self {
			ptr: FuncPtr::from_address(pointer.address()),
			tag: type_tag::<P>(),
			kind,
		}
	}

	fn object_of<F: 'static>() -> Self {
		Self {
			ptr: FuncPtr::EMPTY,
			tag: type_tag::<F>(),
			kind: CallableKind::FunctionObject,
		}
	}

	/// The kind of identity.
	#[must_use]
	pub fn kind(&self) -> CallableKind {
		self.kind
	}

	/// The captured function pointer bytes. Empty for function objects.
	#[must_use]
	pub fn func_ptr(&self) -> &FuncPtr {
		&self.ptr
	}

	/// Whether this identity can ever [match](`CallableId::matches`) another.
	#[must_use]
	pub fn is_disconnectable(&self) -> bool {
		match self.kind {
			CallableKind::Function => true,
			CallableKind::Method | CallableKind::FunctionObject => self.tag.is_some(),
		}
	}

	/// Whether `self` and `other` identify the same callable.
	#[must_use]
	pub fn matches(&self, other: &Self) -> bool {
		if self.kind != other.kind || self.ptr != other.ptr {
			return false;
		}
		match self.kind {
			CallableKind::Function => true,
			CallableKind::Method | CallableKind::FunctionObject => {
				self.tag.is_some() && self.tag == other.tag
			}
		}
	}
}

/// The untyped address of an object a slot is bound to or tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
	/// No object. Never matches in queries.
	pub const NONE: Self = Self(0);

	/// The identity of the object at `pointer`.
	#[must_use]
	pub fn of_ptr<T: ?Sized>(pointer: *const T) -> Self {
		Self(pointer.cast::<()>() as usize)
	}

	/// The identity of `object`.
	#[must_use]
	pub fn of<T: ?Sized>(object: &T) -> Self {
		Self::of_ptr(object as *const T)
	}

	/// Whether this is [`ObjectId::NONE`].
	#[must_use]
	pub fn is_none(&self) -> bool {
		*self == Self::NONE
	}
}

/// Values that refer to an object by address.
pub trait ObjectRef {
	/// The referenced object's identity, or [`ObjectId::NONE`] if there is none.
	fn object_id(&self) -> ObjectId;
}

impl ObjectRef for ObjectId {
	fn object_id(&self) -> ObjectId {
		*self
	}
}

impl<T: ?Sized> ObjectRef for Arc<T> {
	fn object_id(&self) -> ObjectId {
		ObjectId::of_ptr(Arc::as_ptr(self))
	}
}

impl<T: ?Sized> ObjectRef for Weak<T> {
	fn object_id(&self) -> ObjectId {
		if self.strong_count() == 0 {
			ObjectId::NONE
		} else {
			ObjectId::of_ptr(self.as_ptr())
		}
	}
}

impl<T: ?Sized> ObjectRef for *const T {
	fn object_id(&self) -> ObjectId {
		ObjectId::of_ptr(*self)
	}
}

impl<T: ?Sized> ObjectRef for *mut T {
	fn object_id(&self) -> ObjectId {
		ObjectId::of_ptr(self.cast_const())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn first(_: &i32) {}
	fn second(_: &i32) {}

	#[test]
	fn function_pointers_match_by_address() {
		let a = CallableId::of::<_, fn(&i32)>(&(first as fn(&i32)), CallableKind::Function);
		let b = CallableId::of::<_, fn(&i32)>(&(first as fn(&i32)), CallableKind::Function);
		let c = CallableId::of::<_, fn(&i32)>(&(second as fn(&i32)), CallableKind::Function);

		assert_eq!(a.kind(), CallableKind::Function);
		assert!(!a.func_ptr().is_empty());
		assert!(a.is_disconnectable());
		assert!(a.matches(&b));
		assert!(!a.matches(&c));
	}

	#[test]
	fn query_must_fit_the_stored_shape() {
		let stored = CallableId::of::<_, fn(&i32)>(&(first as fn(&i32)), CallableKind::Function);
		let query: fn(&u8) = |_| ();
		assert!(CallableId::of_query::<fn(&i32), fn(&i32)>(&query, CallableKind::Function).is_none());

		let query = CallableId::of_query::<fn(&i32), fn(&i32)>(
			&(first as fn(&i32)),
			CallableKind::Function,
		)
		.unwrap();
		assert!(stored.matches(&query));
	}

	#[test]
	#[cfg(feature = "type_identity")]
	fn closures_match_by_type() {
		let make = |offset: i32| move |x: &i32| {
			let _ = *x + offset;
		};
		let a = make(1);
		let b = make(2);
		let other = |_: &i32| ();

		let a_id = CallableId::of::<_, fn(&i32)>(&a, CallableKind::Function);
		assert_eq!(a_id.kind(), CallableKind::FunctionObject);
		assert!(a_id.func_ptr().is_empty());
		assert!(a_id.matches(&CallableId::of::<_, fn(&i32)>(&b, CallableKind::Function)));
		assert!(!a_id.matches(&CallableId::of::<_, fn(&i32)>(&other, CallableKind::Function)));
	}

	#[test]
	#[cfg(not(feature = "type_identity"))]
	fn closures_never_match_without_type_identity() {
		let a = |_: &i32| ();
		let a_id = CallableId::of::<_, fn(&i32)>(&a, CallableKind::Function);
		assert!(!a_id.is_disconnectable());
		assert!(!a_id.matches(&a_id));
	}

	#[test]
	#[cfg(not(feature = "type_identity"))]
	fn methods_never_match_without_type_identity() {
		struct Receiver;

		impl Receiver {
			fn method(&self, _: &i32) {}
		}

		let m: fn(&Receiver, &i32) = Receiver::method;
		let id = CallableId::of::<_, fn(&Receiver, &i32)>(&m, CallableKind::Method);
		assert_eq!(id.kind(), CallableKind::Method);
		assert!(!id.func_ptr().is_empty());
		assert!(!id.is_disconnectable());
		assert!(!id.matches(&id));
	}

	#[test]
	fn object_ids() {
		let arc = Arc::new(5);
		let weak = Arc::downgrade(&arc);
		assert_eq!(arc.object_id(), weak.object_id());
		assert_eq!(arc.object_id(), ObjectId::of(&*arc));
		assert!(!arc.object_id().is_none());

		drop(arc);
		assert!(weak.object_id().is_none());
	}
}
