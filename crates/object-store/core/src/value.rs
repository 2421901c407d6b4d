//! The Rust stand-in for "arbitrary host-language value" (spec.md §3, SPEC_FULL §2).
//!
//! Rust has no `Proxy`/`Reflect` primitive, so a gc-tracked object or function is
//! anything implementing [`RemoteObject`]/[`RemoteFunction`] rather than an actual
//! dynamic shim. [`PlainObject`] and [`NativeFunction`] cover the common cases
//! (an object literal, a callback) without requiring callers to hand-implement the
//! traits.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

/// A decimal-text big integer literal, carried as-is across the wire (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigIntLiteral(Arc<str>);

impl BigIntLiteral {
	/// Validates that `digits` is an optionally-signed run of decimal digits.
	pub fn new(digits: impl Into<String>) -> Result<Self, HostError> {
		let digits = digits.into();
		let body = digits.strip_prefix('-').unwrap_or(&digits);
		if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
			return Err(HostError::new(format!(
				"not a decimal big integer literal: {digits:?}"
			)));
		}
		Ok(Self(digits.into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// A symbol: an identity-only value. Two [`SymbolHandle`]s are equal only if they
/// are the same allocation (spec.md §3: "treated identically to an object for
/// referencing, with an empty shape and no operations besides identity").
#[derive(Debug, Clone)]
pub struct SymbolHandle(Arc<SymbolInner>);

#[derive(Debug)]
struct SymbolInner {
	description: Option<String>,
}

impl SymbolHandle {
	pub fn new(description: impl Into<Option<String>>) -> Self {
		Self(Arc::new(SymbolInner { description: description.into() }))
	}

	pub fn description(&self) -> Option<&str> {
		self.0.description.as_deref()
	}

	/// A stable identity for this symbol, suitable for use as a Local Table key.
	pub fn identity(&self) -> usize {
		Arc::as_ptr(&self.0) as usize
	}
}

impl PartialEq for SymbolHandle {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for SymbolHandle {}

/// A property name: a string, or a reference to a symbol (spec.md §4.A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
	Str(Arc<str>),
	Symbol(SymbolHandle),
}

impl From<&str> for PropertyKey {
	fn from(s: &str) -> Self {
		PropertyKey::Str(s.into())
	}
}
impl From<String> for PropertyKey {
	fn from(s: String) -> Self {
		PropertyKey::Str(s.into())
	}
}

/// One entry of a shape's `ownKeys` (spec.md §3).
#[derive(Debug, Clone)]
pub struct OwnKey {
	pub key: PropertyKey,
	pub enumerable: bool,
}

/// Any value that can be exchanged between peers (spec.md §3).
///
/// `Object`/`Function` are values *this* peer owns and can hand to the Local
/// Table. `Proxy` is a reference to something the *other* peer owns — the
/// Proxy Engine's output (spec.md §4.D) — and is itself the thing that makes
/// passing a remote value back to its owner resolve to the original (spec.md
/// §4.A's "value already acting as a proxy").
#[derive(Clone)]
pub enum Value {
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	BigInt(BigIntLiteral),
	Str(Arc<str>),
	Object(Arc<dyn RemoteObject>),
	Function(Arc<dyn RemoteFunction>),
	Symbol(SymbolHandle),
	Proxy(crate::proxy::Proxy),
}

impl std::fmt::Debug for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Undefined => write!(f, "undefined"),
			Value::Null => write!(f, "null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Number(n) => write!(f, "{n}"),
			Value::BigInt(b) => write!(f, "{}n", b.as_str()),
			Value::Str(s) => write!(f, "{s:?}"),
			Value::Object(o) => write!(f, "Object({:p})", Arc::as_ptr(o)),
			Value::Function(fun) => write!(f, "Function({:p})", Arc::as_ptr(fun)),
			Value::Symbol(s) => write!(f, "Symbol({:?})", s.description()),
			Value::Proxy(p) => write!(f, "Proxy({})", p.root_id()),
		}
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Str(s.into())
	}
}
impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Str(s.into())
	}
}
impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Value::Number(n)
	}
}
impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

/// A user-thrown error, or a path-evaluation failure, in the form spec.md §7
/// needs to reconstruct it on the other side: a message/name/stack plus the
/// original value for use as `cause` (or for direct re-throw under the
/// `remoteObject` error policy).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
	pub name: String,
	pub message: String,
	pub stack: Option<String>,
	/// The thrown value itself, when it was an object/function (so it can be
	/// described and referenced rather than only summarized).
	pub value: Option<Value>,
}

impl HostError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { name: "Error".into(), message: message.into(), stack: None, value: None }
	}

	pub fn with_name(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self { name: name.into(), message: message.into(), stack: None, value: None }
	}

	pub fn with_value(mut self, value: Value) -> Self {
		self.value = Some(value);
		self
	}
}

/// An exposable object or function shape (spec.md §4.A–§4.D). Implemented by
/// [`PlainObject`] for plain property bags, and by user types that want to back a
/// property read/write with real logic.
pub trait RemoteObject: Send + Sync {
	fn get(&self, key: &PropertyKey) -> Option<Value>;
	fn set(&self, key: &PropertyKey, value: Value) -> Result<(), HostError>;
	fn own_keys(&self) -> Vec<OwnKey>;
	fn prototype(&self) -> Option<Value>;
}

/// A callable, additionally exposing the `functionPrototype` shape field that
/// makes cross-peer `instanceof` work (spec.md §3, §9).
#[async_trait::async_trait]
pub trait RemoteFunction: RemoteObject {
	async fn call(&self, this: Option<Value>, args: Vec<Value>) -> Result<Value, HostError>;
	async fn construct(&self, args: Vec<Value>) -> Result<Value, HostError>;
	fn function_prototype(&self) -> Value;
}

struct PlainProp {
	key: PropertyKey,
	value: Value,
	enumerable: bool,
}

/// An ordered property bag: the Rust stand-in for a plain object literal.
/// Own-key iteration order matches insertion order (spec.md §4.A's "native
/// iteration order").
pub struct PlainObject {
	prototype: Option<Value>,
	props: Mutex<Vec<PlainProp>>,
}

impl Default for PlainObject {
	fn default() -> Self {
		Self::new()
	}
}

impl PlainObject {
	pub fn new() -> Self {
		Self { prototype: None, props: Mutex::new(Vec::new()) }
	}

	pub fn with_prototype(prototype: Option<Value>) -> Self {
		Self { prototype, props: Mutex::new(Vec::new()) }
	}

	/// Builder-style insertion, enumerable by default.
	pub fn with(self, key: impl Into<PropertyKey>, value: Value) -> Self {
		self.insert(key, value, true);
		self
	}

	pub fn insert(&self, key: impl Into<PropertyKey>, value: Value, enumerable: bool) {
		let key = key.into();
		let mut props = self.props.lock().expect("PlainObject mutex poisoned");
		if let Some(existing) = props.iter_mut().find(|p| p.key == key) {
			existing.value = value;
			existing.enumerable = enumerable;
		} else {
			props.push(PlainProp { key, value, enumerable });
		}
	}
}

impl RemoteObject for PlainObject {
	fn get(&self, key: &PropertyKey) -> Option<Value> {
		let props = self.props.lock().expect("PlainObject mutex poisoned");
		props.iter().find(|p| &p.key == key).map(|p| p.value.clone())
	}

	fn set(&self, key: &PropertyKey, value: Value) -> Result<(), HostError> {
		self.insert(key.clone(), value, true);
		Ok(())
	}

	fn own_keys(&self) -> Vec<OwnKey> {
		let props = self.props.lock().expect("PlainObject mutex poisoned");
		props.iter().map(|p| OwnKey { key: p.key.clone(), enumerable: p.enumerable }).collect()
	}

	fn prototype(&self) -> Option<Value> {
		self.prototype.clone()
	}
}

type CallFn =
	Box<dyn Fn(Option<Value>, Vec<Value>) -> BoxFuture<'static, Result<Value, HostError>> + Send + Sync>;
type ConstructFn =
	Box<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, HostError>> + Send + Sync>;

/// Adapts a plain Rust closure into an exposable [`RemoteFunction`], so callers
/// don't need to implement the trait by hand for the common "expose a callback"
/// case (spec.md §8 scenario 4).
pub struct NativeFunction {
	call: CallFn,
	construct: Option<ConstructFn>,
	function_prototype: Value,
	props: Mutex<Vec<PlainProp>>,
}

impl NativeFunction {
	pub fn new<F, Fut>(call: F) -> Self
	where
		F: Fn(Option<Value>, Vec<Value>) -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = Result<Value, HostError>> + Send + 'static,
	{
		Self {
			call: Box::new(move |this, args| Box::pin(call(this, args))),
			construct: None,
			function_prototype: Value::Object(Arc::new(PlainObject::new())),
			props: Mutex::new(Vec::new()),
		}
	}

	pub fn with_construct<F, Fut>(mut self, construct: F) -> Self
	where
		F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = Result<Value, HostError>> + Send + 'static,
	{
		self.construct = Some(Box::new(move |args| Box::pin(construct(args))));
		self
	}

	pub fn with_function_prototype(mut self, prototype: Value) -> Self {
		self.function_prototype = prototype;
		self
	}
}

impl RemoteObject for NativeFunction {
	fn get(&self, key: &PropertyKey) -> Option<Value> {
		if matches!(key, PropertyKey::Str(s) if &**s == "prototype") {
			return Some(self.function_prototype.clone());
		}
		let props = self.props.lock().expect("NativeFunction mutex poisoned");
		props.iter().find(|p| &p.key == key).map(|p| p.value.clone())
	}

	fn set(&self, key: &PropertyKey, value: Value) -> Result<(), HostError> {
		let mut props = self.props.lock().expect("NativeFunction mutex poisoned");
		if let Some(existing) = props.iter_mut().find(|p| &p.key == key) {
			existing.value = value;
		} else {
			props.push(PlainProp { key: key.clone(), value, enumerable: true });
		}
		Ok(())
	}

	fn own_keys(&self) -> Vec<OwnKey> {
		let props = self.props.lock().expect("NativeFunction mutex poisoned");
		props.iter().map(|p| OwnKey { key: p.key.clone(), enumerable: p.enumerable }).collect()
	}

	fn prototype(&self) -> Option<Value> {
		None
	}
}

#[async_trait::async_trait]
impl RemoteFunction for NativeFunction {
	async fn call(&self, this: Option<Value>, args: Vec<Value>) -> Result<Value, HostError> {
		(self.call)(this, args).await
	}

	async fn construct(&self, args: Vec<Value>) -> Result<Value, HostError> {
		match &self.construct {
			Some(construct) => construct(args).await,
			None => Err(HostError::with_name("TypeError", "value is not a constructor")),
		}
	}

	fn function_prototype(&self) -> Value {
		self.function_prototype.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bigint_rejects_non_decimal() {
		assert!(BigIntLiteral::new("123").is_ok());
		assert!(BigIntLiteral::new("-123").is_ok());
		assert!(BigIntLiteral::new("12.3").is_err());
		assert!(BigIntLiteral::new("").is_err());
		assert!(BigIntLiteral::new("-").is_err());
	}

	#[test]
	fn plain_object_preserves_insertion_order() {
		let obj = PlainObject::new().with("b", Value::from(1.0)).with("a", Value::from(2.0));
		let keys: Vec<_> = obj
			.own_keys()
			.into_iter()
			.map(|k| match k.key {
				PropertyKey::Str(s) => s.to_string(),
				PropertyKey::Symbol(_) => unreachable!(),
			})
			.collect();
		assert_eq!(keys, vec!["b", "a"]);
	}

	#[test]
	fn plain_object_set_overwrites_in_place() {
		let obj = PlainObject::new().with("a", Value::from(1.0));
		obj.set(&"a".into(), Value::from(2.0)).unwrap();
		assert_eq!(obj.own_keys().len(), 1);
		match obj.get(&"a".into()) {
			Some(Value::Number(n)) => assert_eq!(n, 2.0),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[tokio::test]
	async fn native_function_exposes_prototype_property() {
		let f = NativeFunction::new(|_this, args| async move {
			let Some(Value::Number(n)) = args.into_iter().next() else {
				return Err(HostError::new("expected a number"));
			};
			Ok(Value::from(n * 2.0))
		});
		match f.get(&"prototype".into()) {
			Some(Value::Object(_)) => {}
			other => panic!("unexpected {other:?}"),
		}
		let result = f.call(None, vec![Value::from(21.0)]).await.unwrap();
		match result {
			Value::Number(n) => assert_eq!(n, 42.0),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn symbol_identity_is_pointer_equality() {
		let a = SymbolHandle::new(Some("a".to_string()));
		let b = a.clone();
		let c = SymbolHandle::new(Some("a".to_string()));
		assert_eq!(a, b);
		assert_ne!(a, c);
	}
}
