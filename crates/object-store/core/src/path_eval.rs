//! Component E (spec.md §4.E): replays a recorded path against a root value.
//! Runs on whichever side owns the root — usually the request owner, but also
//! locally when decoding resolves a path-bearing reference against this
//! peer's own Local Table (spec.md's round-trip law).
//!
//! Each step may itself need to decode its key/argument descriptions, which
//! can recurse into a sub-request (spec.md §4.A) — so evaluation is async
//! start to finish. There is no distinct "await the intermediate result"
//! step: every read/call/construct here is already awaited inline, so a
//! promise-like intermediate never actually occurs in this representation.

use std::sync::Arc;

use objectstore_wire::Segment;

use crate::{
	error::{PathError, ProtocolError},
	store::StoreInner,
	value::{PropertyKey, Value},
};

async fn decode_key(store: &Arc<StoreInner>, key: objectstore_wire::ValueDescription) -> Result<PropertyKey, PathError> {
	match store.clone().decode_value(key).await.map_err(path_error_from_codec)? {
		Value::Str(s) => Ok(PropertyKey::Str(s)),
		Value::Symbol(s) => Ok(PropertyKey::Symbol(s)),
		other => Err(PathError::Protocol(ProtocolError::Malformed(format!(
			"property key must be a string or symbol, got {other:?}"
		)))),
	}
}

fn path_error_from_codec(err: crate::error::CodecError) -> PathError {
	match err {
		crate::error::CodecError::Protocol(p) => PathError::Protocol(p),
		crate::error::CodecError::UnknownId(u) => PathError::UnknownId(u),
		crate::error::CodecError::Remote(h) => PathError::Thrown(h),
		crate::error::CodecError::Transport(t) => {
			PathError::Protocol(ProtocolError::Malformed(t.to_string()))
		}
	}
}

async fn decode_args(
	store: &Arc<StoreInner>,
	args: Vec<objectstore_wire::ValueDescription>,
) -> Result<Vec<Value>, PathError> {
	let mut out = Vec::with_capacity(args.len());
	for arg in args {
		out.push(store.clone().decode_value(arg).await.map_err(path_error_from_codec)?);
	}
	Ok(out)
}

fn get_property(current: &Value, key: &PropertyKey) -> Option<Value> {
	match current {
		Value::Object(o) => o.get(key),
		Value::Function(f) => f.get(key),
		_ => None,
	}
}

/// Evaluates `segments` against `root`, the way the owner's Path Evaluator
/// replays an unbound proxy's recorded path (spec.md §4.E).
pub(crate) async fn evaluate_path(
	store: &Arc<StoreInner>,
	root: Value,
	segments: Vec<Segment>,
) -> Result<Value, PathError> {
	let mut current = root;
	let mut receiver: Option<Value> = None;

	for segment in segments {
		match segment {
			Segment::Get { key } => {
				let key = decode_key(store, key).await?;
				if let Value::Proxy(p) = &current {
					let next = p.get_key(key).recv().await.map_err(store_error_into_path)?;
					receiver = Some(current.clone());
					current = next;
					continue;
				}
				receiver = Some(current.clone());
				current = get_property(&current, &key).unwrap_or(Value::Undefined);
			}
			Segment::Set { key, value } => {
				let key = decode_key(store, key).await?;
				let value = store.clone().decode_value(value).await.map_err(path_error_from_codec)?;
				match &current {
					Value::Object(o) => o.set(&key, value).map_err(PathError::Thrown)?,
					Value::Function(f) => f.set(&key, value).map_err(PathError::Thrown)?,
					Value::Proxy(p) => {
						p.get_key(key).set(value).map_err(store_error_into_path)?.recv().await.map_err(store_error_into_path)?;
					}
					other => {
						return Err(PathError::Protocol(ProtocolError::Malformed(format!(
							"cannot set a property on {other:?}"
						))))
					}
				}
				current = Value::Undefined;
				receiver = None;
			}
			Segment::Call { args } => {
				let args = decode_args(store, args).await?;
				let this = receiver.take();
				current = match &current {
					Value::Function(f) => f.call(this, args).await.map_err(PathError::Thrown)?,
					Value::Proxy(p) if p.is_function_hint() => {
						p.call(args).recv().await.map_err(store_error_into_path)?
					}
					other => {
						return Err(PathError::Protocol(ProtocolError::Malformed(format!(
							"{other:?} is not a function"
						))))
					}
				};
			}
			Segment::New { args } => {
				let args = decode_args(store, args).await?;
				receiver = None;
				current = match &current {
					Value::Function(f) => f.construct(args).await.map_err(PathError::Thrown)?,
					Value::Proxy(p) if p.is_function_hint() => {
						p.new_(args).recv().await.map_err(store_error_into_path)?
					}
					other => {
						return Err(PathError::Protocol(ProtocolError::Malformed(format!(
							"{other:?} is not a constructor"
						))))
					}
				};
			}
		}
	}

	Ok(current)
}

fn store_error_into_path(err: crate::error::StoreError) -> PathError {
	match err {
		crate::error::StoreError::Codec(c) => path_error_from_codec(c),
		crate::error::StoreError::Path(p) => p,
		other => PathError::Protocol(ProtocolError::Malformed(other.to_string())),
	}
}
