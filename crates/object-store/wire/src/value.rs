use serde::{Deserialize, Serialize};

use crate::{id::Id, path::Segment};

/// A reference to a gc-tracked value, optionally carrying a path that must be
/// evaluated against it to produce the value actually being described (spec.md
/// §3's `{root id, segments}` lazily-computed ValueDescription).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
	#[serde(flatten)]
	pub id: Id,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub path: Vec<Segment>,
}

impl From<Id> for Reference {
	fn from(id: Id) -> Self {
		Self { id, path: Vec::new() }
	}
}

/// A key in an object's own-keys list: either a plain string, or a reference to a
/// symbol (spec.md §4.A: "keys that are symbols are encoded by reference").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyDescription {
	Str(String),
	Symbol(Reference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnKeyDescription {
	pub key: KeyDescription,
	pub enumerable: bool,
}

/// Shape description shared by objects and functions (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescription {
	pub id: Id,
	pub own_keys: Vec<OwnKeyDescription>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub has_keys: Vec<KeyDescription>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub prototype: Option<Reference>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub function_prototype: Option<Box<ValueDescription>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescription {
	pub value: Reference,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// The shapes of [`ValueDescription`] that carry an explicit `"type"` tag on the
/// wire (spec.md §6). Kept separate from the untagged primitives and bare
/// [`Reference`] so serde can try those cheaply before falling back to this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TypedDescription {
	Bigint { value: String },
	Undefined,
	Null,
	Object(ShapeDescription),
	Function(ShapeDescription),
	Symbol { id: Id },
	Error(ErrorDescription),
}

/// Everything that can cross the wire in place of a value (spec.md §3, §6).
///
/// Primitives other than big integers are inlined as ordinary JSON scalars.
/// Gc-tracked values are either a bare [`Reference`] (an id the receiver already
/// has, or will resolve through its Remote Table) or, the first time an id is
/// described, a full [`TypedDescription::Object`]/[`TypedDescription::Function`]
/// shape. `serde(untagged)` tries variants top to bottom, so cheap scalar shapes
/// are attempted before the struct shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDescription {
	Str(String),
	Number(f64),
	Bool(bool),
	Reference(Reference),
	Typed(TypedDescription),
}

impl ValueDescription {
	pub fn undefined() -> Self {
		ValueDescription::Typed(TypedDescription::Undefined)
	}

	pub fn null() -> Self {
		ValueDescription::Typed(TypedDescription::Null)
	}

	pub fn reference(id: Id) -> Self {
		ValueDescription::Reference(Reference::from(id))
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, ValueDescription::Typed(TypedDescription::Undefined))
	}
}
