//! Component A (spec.md §4.A): converts between [`Value`] and the wire's
//! [`ValueDescription`] in both directions. Encoding is synchronous — it only
//! ever consults the Local Table — but decoding can issue a sub-request of
//! its own, when a description carries a path that must be evaluated by
//! whoever owns its root (spec.md §3's lazily-computed description).

use std::sync::Arc;

use objectstore_wire::{
	ErrorDescription, Id, IdValue, KeyDescription, Reference, Request, Side, TypedDescription,
	ValueDescription,
};

use crate::{
	error::{CodecError, PathError, StoreError},
	store::{PrototypePolicy, RemoteErrorPolicy, StoreInner},
	value::{HostError, PlainObject, PropertyKey, Value},
};

impl StoreInner {
	/// Synchronously turns a [`Value`] into the description that goes on the
	/// wire in its place. Gc-tracked values are registered in the Local Table
	/// the first time they're seen; a shape is attached only the first time
	/// that id crosses the wire (spec.md invariant 2).
	pub(crate) fn encode_value(&self, value: &Value) -> ValueDescription {
		match value {
			Value::Undefined => ValueDescription::undefined(),
			Value::Null => ValueDescription::null(),
			Value::Bool(b) => ValueDescription::Bool(*b),
			Value::Number(n) => ValueDescription::Number(*n),
			Value::BigInt(b) => {
				ValueDescription::Typed(TypedDescription::Bigint { value: b.as_str().to_string() })
			}
			Value::Str(s) => ValueDescription::Str(s.to_string()),
			Value::Symbol(s) => {
				let id = self.local.register(Value::Symbol(s.clone()));
				ValueDescription::Typed(TypedDescription::Symbol { id })
			}
			Value::Object(_) => {
				let id = self.local.identity_id(value);
				self.encode_gc_tracked(id, false, value)
			}
			Value::Function(_) => {
				let id = self.local.identity_id(value);
				self.encode_gc_tracked(id, true, value)
			}
			// Passing a proxy back replaces it with the reference it already
			// is — the round-trip law that makes `store.get(x).set(x.get(y))`
			// resolve to the original value rather than re-wrapping it
			// (spec.md §4.A).
			Value::Proxy(p) => ValueDescription::Reference(Reference {
				id: p.root_id(),
				path: p.path.clone(),
			}),
		}
	}

	fn encode_gc_tracked(&self, id: Id, is_function: bool, value: &Value) -> ValueDescription {
		if !self.local.take_needs_shape(&id.value) {
			return ValueDescription::reference(id);
		}
		let shape = self
			.local
			.shape_or_insert_with(&id.value, || self.build_shape(&id, is_function, value))
			.unwrap_or_else(|| self.build_shape(&id, is_function, value));
		if is_function {
			ValueDescription::Typed(TypedDescription::Function(shape))
		} else {
			ValueDescription::Typed(TypedDescription::Object(shape))
		}
	}

	fn build_shape(
		&self,
		id: &Id,
		is_function: bool,
		value: &Value,
	) -> objectstore_wire::ShapeDescription {
		let obj: &dyn crate::value::RemoteObject = match value {
			Value::Object(o) => o.as_ref(),
			Value::Function(f) => f.as_ref(),
			_ => unreachable!("build_shape only called for Object/Function"),
		};
		let own_keys = obj
			.own_keys()
			.into_iter()
			.map(|k| objectstore_wire::OwnKeyDescription {
				key: self.encode_key(&k.key),
				enumerable: k.enumerable,
			})
			.collect();
		let (prototype, has_keys) = match self.options.remote_object_prototype {
			// Ship the chain reference so the remote can walk/instanceof it;
			// no flattened key list needed.
			PrototypePolicy::Full => (self.encode_prototype_reference(obj), vec![]),
			// Flatten the chain into keys instead of shipping it (spec.md
			// §4.A: "hasKeys only when policy is keysOnly, collected by
			// walking the prototype chain").
			PrototypePolicy::KeysOnly => (None, self.collect_has_keys(obj.prototype())),
			PrototypePolicy::None => (None, vec![]),
		};
		let function_prototype = if is_function {
			if let Value::Function(f) = value {
				Some(Box::new(self.encode_value(&f.function_prototype())))
			} else {
				None
			}
		} else {
			None
		};
		objectstore_wire::ShapeDescription {
			id: id.clone(),
			own_keys,
			has_keys,
			prototype,
			function_prototype,
		}
	}

	/// `PrototypePolicy::Full`'s half of shape construction: a bare reference
	/// to the prototype value, minted/looked-up the same way any other
	/// gc-tracked value would be (spec.md §4.A).
	fn encode_prototype_reference(&self, obj: &dyn crate::value::RemoteObject) -> Option<Reference> {
		obj.prototype().map(|p| match self.encode_value(&p) {
			ValueDescription::Reference(r) => r,
			ValueDescription::Typed(TypedDescription::Object(shape)) => {
				Reference { id: shape.id, path: vec![] }
			}
			ValueDescription::Typed(TypedDescription::Function(shape)) => {
				Reference { id: shape.id, path: vec![] }
			}
			_ => unreachable!("a prototype is always an object/function value"),
		})
	}

	/// `PrototypePolicy::KeysOnly`'s half: flattens every enumerable own key
	/// reachable by walking `proto` up the prototype chain, rather than
	/// shipping the chain itself (spec.md §4.A: "hasKeys ... collected by
	/// walking the prototype chain"). Does not register ancestors in the
	/// Local Table — only the keys they contribute are observable under this
	/// policy, not the ancestor objects themselves.
	fn collect_has_keys(&self, mut proto: Option<Value>) -> Vec<KeyDescription> {
		let mut keys = Vec::new();
		while let Some(value) = proto {
			let obj: &dyn crate::value::RemoteObject = match &value {
				Value::Object(o) => o.as_ref(),
				Value::Function(f) => f.as_ref(),
				_ => break,
			};
			keys.extend(
				obj.own_keys().into_iter().filter(|k| k.enumerable).map(|k| self.encode_key(&k.key)),
			);
			proto = obj.prototype();
		}
		keys
	}

	fn encode_key(&self, key: &PropertyKey) -> KeyDescription {
		match key {
			PropertyKey::Str(s) => KeyDescription::Str(s.to_string()),
			PropertyKey::Symbol(s) => {
				let id = self.local.register(Value::Symbol(s.clone()));
				KeyDescription::Symbol(Reference::from(id))
			}
		}
	}

	pub(crate) fn encode_property_key(&self, key: &PropertyKey) -> ValueDescription {
		match self.encode_key(key) {
			KeyDescription::Str(s) => ValueDescription::Str(s),
			KeyDescription::Symbol(r) => ValueDescription::Reference(r),
		}
	}

	pub(crate) fn decode_property_key(&self, key: &KeyDescription) -> Result<PropertyKey, StoreError> {
		match key {
			KeyDescription::Str(s) => Ok(PropertyKey::Str(s.as_str().into())),
			KeyDescription::Symbol(r) => {
				let IdValue::Numeric(n) = &r.id.value else {
					return Err(StoreError::Codec(CodecError::Protocol(
						crate::error::ProtocolError::Malformed("symbol key must be a numeric id".into()),
					)));
				};
				match self.local.lookup(&IdValue::Numeric(*n), false) {
					Some(Value::Symbol(s)) => Ok(PropertyKey::Symbol(s)),
					_ => Err(StoreError::Codec(CodecError::UnknownId(crate::error::UnknownIdError(
						r.id.clone(),
					)))),
				}
			}
		}
	}

	/// Turns a wire description back into a [`Value`], recursing through a
	/// sub-request when the description is a path-bearing reference rooted
	/// on the other peer (spec.md §3, §4.A). Takes an owned `Arc` — rather
	/// than `&self` — because the recursive sub-request paths below need to
	/// hold it across an `.await` and hand it to a boxed continuation.
	pub(crate) async fn decode_value(
		self: Arc<Self>,
		description: ValueDescription,
	) -> Result<Value, CodecError> {
		match description {
			ValueDescription::Str(s) => Ok(Value::Str(s.into())),
			ValueDescription::Number(n) => Ok(Value::Number(n)),
			ValueDescription::Bool(b) => Ok(Value::Bool(b)),
			ValueDescription::Reference(r) => self.decode_reference(r).await,
			ValueDescription::Typed(t) => self.decode_typed(t).await,
		}
	}

	async fn decode_reference(self: Arc<Self>, r: Reference) -> Result<Value, CodecError> {
		match r.id.side {
			// The sender handed back something *I* own: resolve it against my
			// own Local Table rather than minting a proxy (spec.md's
			// round-trip law).
			Side::Remote => {
				if r.path.is_empty() {
					self.local.lookup(&r.id.value, false).ok_or_else(|| {
						CodecError::UnknownId(crate::error::UnknownIdError(r.id.clone()))
					})
				} else {
					let root = self.local.lookup(&r.id.value, false).ok_or_else(|| {
						CodecError::UnknownId(crate::error::UnknownIdError(r.id.clone()))
					})?;
					crate::path_eval::evaluate_path(&self, root, r.path).await.map_err(|e| match e {
						PathError::Protocol(p) => CodecError::Protocol(p),
						PathError::UnknownId(u) => CodecError::UnknownId(u),
						PathError::Thrown(h) => CodecError::Remote(h),
					})
				}
			}
			// The sender described something *they* own: cache/create a
			// proxy for it, resolving any attached path with a sub-request
			// since only they can evaluate it (spec.md §4.D).
			Side::Local => {
				if r.path.is_empty() {
					let proxy = self.remote.resolve(&self, r.id.value);
					crate::gc::maybe_trigger(&self);
					Ok(Value::Proxy(proxy))
				} else {
					let outbound_root = Id::remote(r.id.value);
					let payload = serde_json::to_value(Request::Remote {
						root: outbound_root,
						path: r.path,
					})
					.map_err(|e| {
						CodecError::Protocol(crate::error::ProtocolError::Malformed(e.to_string()))
					})?;
					let response = self.transport.request(payload).await?;
					let description: objectstore_wire::Response =
						serde_json::from_value(response).map_err(|e| {
							CodecError::Protocol(crate::error::ProtocolError::Malformed(e.to_string()))
						})?;
					// Boxed: breaks the decode_value -> decode_reference ->
					// decode_value cycle, which would otherwise be an
					// infinitely-sized future.
					Box::pin(self.decode_value(description)).await
				}
			}
		}
	}

	async fn decode_typed(self: Arc<Self>, t: TypedDescription) -> Result<Value, CodecError> {
		match t {
			TypedDescription::Bigint { value } => crate::value::BigIntLiteral::new(value)
				.map(Value::BigInt)
				.map_err(CodecError::Remote),
			TypedDescription::Undefined => Ok(Value::Undefined),
			TypedDescription::Null => Ok(Value::Null),
			TypedDescription::Object(shape) => {
				let proxy = self.remote.install_shape(&self, shape, false);
				crate::gc::maybe_trigger(&self);
				Ok(Value::Proxy(proxy))
			}
			TypedDescription::Function(shape) => {
				let proxy = self.remote.install_shape(&self, shape, true);
				crate::gc::maybe_trigger(&self);
				Ok(Value::Proxy(proxy))
			}
			// No operations besides identity (spec.md §3): decoding the same
			// symbol id twice must still yield the same local stand-in, so
			// it's cached by id rather than minted fresh every time.
			TypedDescription::Symbol { id } => Ok(Value::Symbol(self.remote.resolve_symbol(id.value))),
			TypedDescription::Error(description) => self.decode_error(description).await,
		}
	}

	async fn decode_error(self: Arc<Self>, description: ErrorDescription) -> Result<Value, CodecError> {
		// Boxed for the same reason as above: this can re-enter decode_value.
		let cause = Box::pin(
			self.clone().decode_value(ValueDescription::Reference(description.value)),
		)
		.await
		.ok();
		let host_error = match self.options.remote_error {
			RemoteErrorPolicy::NewError => HostError {
				name: description.name.unwrap_or_else(|| "Error".into()),
				message: description.message.unwrap_or_default(),
				stack: Some(format!(
					"Remote Stacktrace:\n{}",
					description.stack.unwrap_or_default()
				)),
				value: cause,
			},
			RemoteErrorPolicy::RemoteObject => HostError {
				name: description.name.unwrap_or_else(|| "Error".into()),
				message: description.message.unwrap_or_default(),
				stack: description.stack,
				value: cause,
			},
		};
		Err(CodecError::Remote(host_error))
	}

	/// Builds the wire-level error description for a failed path evaluation
	/// (spec.md §7 kind 3). Errors without a thrown object get a synthetic
	/// one built from their message/name/stack, so `ErrorDescription.value`
	/// always has something concrete to reference.
	pub(crate) fn encode_path_error(&self, error: PathError) -> ValueDescription {
		let host_error = match error {
			PathError::Thrown(h) => h,
			PathError::Protocol(p) => HostError::with_name("ProtocolError", p.to_string()),
			PathError::UnknownId(u) => HostError::with_name("ReferenceError", u.to_string()),
		};
		self.encode_host_error(host_error)
	}

	pub(crate) fn encode_host_error(&self, error: HostError) -> ValueDescription {
		let value = error.value.clone().unwrap_or_else(|| {
			let obj = PlainObject::new()
				.with("name", Value::from(error.name.clone()))
				.with("message", Value::from(error.message.clone()));
			Value::Object(Arc::new(obj))
		});
		let reference = match self.encode_value(&value) {
			ValueDescription::Reference(r) => r,
			ValueDescription::Typed(TypedDescription::Object(shape)) => {
				Reference { id: shape.id, path: vec![] }
			}
			ValueDescription::Typed(TypedDescription::Function(shape)) => {
				Reference { id: shape.id, path: vec![] }
			}
			_ => unreachable!("object/function values always encode to a reference"),
		};
		ValueDescription::Typed(TypedDescription::Error(ErrorDescription {
			value: reference,
			message: Some(error.message),
			stack: error.stack,
			name: Some(error.name),
		}))
	}
}
