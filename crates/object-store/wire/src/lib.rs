//! Wire types for the ObjectStore remote-object protocol.
//!
//! This crate only has the shapes; the behavior that produces and consumes them
//! lives in `objectstore` (the Value Codec, Path Evaluator, and GC Coordinator).
//! Kept separate the way `replicate-common` is shared between
//! `replicate-client`/`replicate-server`, so both peers of an ObjectStore pair
//! agree on one protocol definition.

mod id;
mod message;
mod path;
mod value;

pub use self::{
	id::{Id, IdValue, Side},
	message::{Request, Response, SyncGcResponse},
	path::Segment,
	value::{
		ErrorDescription, KeyDescription, OwnKeyDescription, Reference, ShapeDescription,
		TypedDescription, ValueDescription,
	},
};

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn primitive_round_trips() {
		for (v, json) in [
			(ValueDescription::Str("hi".into()), r#""hi""#),
			(ValueDescription::Number(10.0), "10.0"),
			(ValueDescription::Bool(true), "true"),
		] {
			let encoded = serde_json::to_string(&v).unwrap();
			assert_eq!(encoded, json);
			let decoded: ValueDescription = serde_json::from_str(&encoded).unwrap();
			assert_eq!(decoded, v);
		}
	}

	#[test]
	fn bigint_round_trips_as_decimal_string() {
		let v = ValueDescription::Typed(TypedDescription::Bigint {
			value: "123456789012345678901234567890".into(),
		});
		let encoded = serde_json::to_string(&v).unwrap();
		let decoded: ValueDescription = serde_json::from_str(&encoded).unwrap();
		assert_eq!(decoded, v);
	}

	#[test]
	fn reference_distinguishes_from_typed_shapes() {
		let id = Id::local(IdValue::Numeric(7));
		let v = ValueDescription::reference(id.clone());
		let encoded = serde_json::to_value(&v).unwrap();
		assert_eq!(encoded["side"], "local");
		assert_eq!(encoded["id"], 7);
		assert!(encoded.get("type").is_none());

		let decoded: ValueDescription = serde_json::from_value(encoded).unwrap();
		assert_eq!(decoded, v);
	}

	#[test]
	fn set_segment_is_terminal_by_construction() {
		let seg = Segment::Set {
			key: ValueDescription::Str("a".into()),
			value: ValueDescription::Number(1.0),
		};
		assert!(seg.is_set());
		assert!(!Segment::Call { args: vec![] }.is_set());
	}

	#[test]
	fn named_id_round_trips() {
		let id = Id::remote(IdValue::Named("api".into()));
		let encoded = serde_json::to_string(&id).unwrap();
		let decoded: Id = serde_json::from_str(&encoded).unwrap();
		assert_eq!(decoded, id);
		assert_eq!(id.to_string(), "remote:\"api\"");
	}

	#[test]
	fn request_remote_round_trips_with_nested_path() {
		let req = Request::Remote {
			root: Id::local(IdValue::Numeric(1)),
			path: vec![
				Segment::Get { key: ValueDescription::Str("a".into()) },
				Segment::Call { args: vec![ValueDescription::Number(5.0)] },
			],
		};
		let encoded = serde_json::to_string(&req).unwrap();
		let decoded: Request = serde_json::from_str(&encoded).unwrap();
		match decoded {
			Request::Remote { root, path } => {
				assert_eq!(root, Id::local(IdValue::Numeric(1)));
				assert_eq!(path.len(), 2);
			}
			_ => panic!("expected Remote"),
		}
	}
}
