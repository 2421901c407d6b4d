//! Component D (spec.md §4.D): the Proxy Engine. Rust has no `Proxy`/`Reflect`
//! primitive to trap property access on, so [`Proxy`] is an explicit step API
//! instead — `.get()`/`.call()`/`.new_()`/`.set()` each return a fresh
//! unbound [`Proxy`] with one more path segment recorded, and `.recv()` is the
//! only place that actually touches the network (spec.md's Design Note §9).

use std::{
	sync::{Arc, OnceLock},
	time::Instant,
};

use objectstore_wire::{Id, IdValue, Segment, ShapeDescription};

use crate::{
	error::{ProtocolError, StoreError},
	store::StoreInner,
	value::{PropertyKey, Value},
};

struct BoundShape {
	wire: ShapeDescription,
	is_function: bool,
}

/// The part of a [`Proxy`] that the Remote Table caches by id (spec.md §4.C):
/// everything path-independent, so that two proxies for the same id — however
/// they were obtained — are the same underlying allocation (spec.md
/// invariant 3).
pub(crate) struct ProxyShared {
	pub(crate) store: Arc<StoreInner>,
	pub(crate) id: IdValue,
	bound: OnceLock<BoundShape>,
	pub(crate) created_at: Instant,
}

impl ProxyShared {
	pub(crate) fn new(store: Arc<StoreInner>, id: IdValue) -> Self {
		Self { store, id, bound: OnceLock::new(), created_at: Instant::now() }
	}

	/// Attaches a shape the first time it is seen. Later calls for the same id
	/// are no-ops: shapes are stable for the lifetime of an id (spec.md
	/// invariant 2), so the first one wins.
	pub(crate) fn bind(&self, wire: ShapeDescription, is_function: bool) {
		let _ = self.bound.set(BoundShape { wire, is_function });
	}

	fn shape(&self) -> Option<&ShapeDescription> {
		self.bound.get().map(|b| &b.wire)
	}

	fn is_function(&self) -> bool {
		self.bound.get().map(|b| b.is_function).unwrap_or(false)
	}
}

impl Drop for ProxyShared {
	fn drop(&mut self) {
		// Named (exposed) ids are held strongly by the Remote Table's `named`
		// map and never reach here; only numeric ids are GC-tracked.
		if let IdValue::Numeric(n) = self.id {
			let _ = self.store.remote.cleanup_tx.send(n);
		}
	}
}

/// A handle to a value the *other* peer owns: an unbound proxy if `path` is
/// non-empty or the root's shape hasn't arrived yet, a bound proxy — eligible
/// for reflection (`own_keys`, `prototype`, ...) — otherwise (spec.md §4.D).
#[derive(Clone)]
pub struct Proxy {
	pub(crate) root: Arc<ProxyShared>,
	pub(crate) path: Vec<Segment>,
}

impl Proxy {
	pub(crate) fn new_root(root: Arc<ProxyShared>) -> Self {
		Self { root, path: Vec::new() }
	}

	/// The id of the value this proxy ultimately refers to, ignoring any
	/// pending path (spec.md §4.C).
	pub fn root_id(&self) -> Id {
		Id::remote(self.root.id.clone())
	}

	/// `true` once this proxy's root shape has arrived and no path has been
	/// appended — reflection methods only work in this state (spec.md §4.D:
	/// "any further path segment yields a fresh unbound proxy").
	pub fn is_bound(&self) -> bool {
		self.path.is_empty() && self.root.shape().is_some()
	}

	pub(crate) fn is_function_hint(&self) -> bool {
		self.root.is_function()
	}

	fn extend(&self, segment: Segment) -> Proxy {
		let mut path = self.path.clone();
		path.push(segment);
		Proxy { root: self.root.clone(), path }
	}

	/// Records a property read. Always returns a fresh unbound proxy, even if
	/// `self` was bound (spec.md §4.D).
	pub fn get_key(&self, key: PropertyKey) -> Proxy {
		let key = self.root.store.encode_property_key(&key);
		self.extend(Segment::Get { key })
	}

	pub fn call(&self, args: Vec<Value>) -> Proxy {
		let args = args.iter().map(|v| self.root.store.encode_value(v)).collect();
		self.extend(Segment::Call { args })
	}

	pub fn new_(&self, args: Vec<Value>) -> Proxy {
		let args = args.iter().map(|v| self.root.store.encode_value(v)).collect();
		self.extend(Segment::New { args })
	}

	/// Collapses a trailing `get` into a `set` (spec.md §4.D's path-collapse
	/// rule): `proxy.get(key).set(value)` and `proxy.set(key, value)` are the
	/// same path. Only legal immediately after a `get` (spec.md invariant 5),
	/// enforced here rather than by the wire type.
	pub fn set(&self, value: Value) -> Result<Proxy, StoreError> {
		let mut path = self.path.clone();
		match path.pop() {
			Some(Segment::Get { key }) => {
				let value = self.root.store.encode_value(&value);
				path.push(Segment::Set { key, value });
				Ok(Proxy { root: self.root.clone(), path })
			}
			_ => Err(ProtocolError::SetWithoutGet.into()),
		}
	}

	/// Resolves this proxy's path against the owner, the only point at which
	/// a proxy touches the network (spec.md's Design Note §9).
	pub async fn recv(&self) -> Result<Value, StoreError> {
		self.root.store.clone().evaluate_remote(self.root.id.clone(), self.path.clone()).await
	}

	/// `Object.keys`-equivalent, requires a bound proxy (spec.md §4.D).
	pub fn own_keys(&self) -> Result<Vec<PropertyKey>, StoreError> {
		let shape = self.require_shape()?;
		shape
			.own_keys
			.iter()
			.map(|k| self.root.store.decode_property_key(&k.key))
			.collect()
	}

	/// Tests shape membership without a round trip (spec.md §4.D's `has`):
	/// `ownKeys`, then `hasKeys`, then the decoded prototype chain as far as
	/// it has already arrived (a prototype whose shape hasn't been fetched
	/// yet stops the walk rather than forcing a round trip).
	pub fn has(&self, key: &PropertyKey) -> Result<bool, StoreError> {
		let wire_key = self.root.store.encode_property_key(key);
		let target = match wire_key {
			objectstore_wire::ValueDescription::Str(s) => {
				objectstore_wire::KeyDescription::Str(s)
			}
			_ => return Ok(false),
		};

		let mut shape = self.require_shape()?.clone();
		loop {
			if shape.own_keys.iter().any(|k| k.key == target) || shape.has_keys.iter().any(|k| k == &target)
			{
				return Ok(true);
			}
			let Some(proto_ref) = shape.prototype.clone() else { return Ok(false) };
			let proto = self.root.store.remote.resolve(&self.root.store, proto_ref.id.value);
			let Some(next) = proto.root.shape().cloned() else { return Ok(false) };
			shape = next;
		}
	}

	/// Decodes this proxy's prototype reference into another proxy, or
	/// `None` for a root object / a policy that ships no prototype
	/// information at all (spec.md §4.D: "returns the decoded prototype,
	/// another proxy or null").
	pub fn prototype(&self) -> Result<Option<Proxy>, StoreError> {
		let shape = self.require_shape()?;
		Ok(shape
			.prototype
			.clone()
			.map(|r| self.root.store.remote.resolve(&self.root.store, r.id.value)))
	}

	fn require_shape(&self) -> Result<&ShapeDescription, StoreError> {
		if !self.path.is_empty() {
			return Err(ProtocolError::Malformed(
				"reflection requires a bound (path-empty) proxy".into(),
			)
			.into());
		}
		self.root
			.shape()
			.ok_or_else(|| ProtocolError::Malformed("proxy shape not yet resolved".into()).into())
	}
}

impl std::fmt::Debug for Proxy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Proxy({}, {} segment(s))", self.root.id, self.path.len())
	}
}

/// The synchronous stringification sentinel spec.md §6's `noToString` option
/// toggles (default off, i.e. this impl active): in the source system,
/// stringifying a remote object traps to the literal tag `"[object
/// RemoteObject]"` instead of a round trip. A Rust `Proxy` has no dynamic
/// trap to turn that off with — there's no call site where `Display` could
/// instead hand back an unbound proxy for the caller to await — so this impl
/// always matches the library's default (`noToString = false`) behavior;
/// `noToString = true` has no Rust analogue and is not modeled as an option.
impl std::fmt::Display for Proxy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[object RemoteObject]")
	}
}
