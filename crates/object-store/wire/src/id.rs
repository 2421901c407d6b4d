use std::fmt;

use serde::{Deserialize, Serialize};

/// Which peer's table an [`Id`] resolves in, from the perspective of whoever is
/// about to decode the message that carries it.
///
/// `Local` means "this id lives in the sender's Local Table" (the common case: a
/// freshly-described or previously-described value the sender owns). `Remote`
/// means "the sender is handing back an id that originated with the receiver" —
/// the round-trip case in spec.md's round-trip laws, e.g. passing a proxy back to
/// the peer that owns the underlying value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Local,
	Remote,
}

/// The id payload: either a numeric id from a peer's monotonically-wrapping
/// counter, or a stable user-exposed name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
	Numeric(u64),
	Named(String),
}

impl fmt::Display for IdValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IdValue::Numeric(n) => write!(f, "{n}"),
			IdValue::Named(name) => write!(f, "{name:?}"),
		}
	}
}

/// A gc-tracked value's wire identity: which side owns it, plus the id itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
	pub side: Side,
	#[serde(rename = "id")]
	pub value: IdValue,
}

impl Id {
	pub fn local(value: IdValue) -> Self {
		Self { side: Side::Local, value }
	}

	pub fn remote(value: IdValue) -> Self {
		Self { side: Side::Remote, value }
	}
}

impl fmt::Display for Id {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let side = match self.side {
			Side::Local => "local",
			Side::Remote => "remote",
		};
		write!(f, "{side}:{}", self.value)
	}
}
