use serde::{Deserialize, Serialize};

use crate::value::ValueDescription;

/// One step of a deferred access path, recorded by an unbound proxy and replayed
/// by the owner's Path Evaluator (spec.md §3, §4.E).
///
/// `Set` is only ever the terminal segment of a path (spec.md invariant 5); the
/// Proxy Engine enforces this before a path ever reaches the wire (spec.md §4.D's
/// path-collapse rule), so this type does not re-validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Segment {
	Get { key: ValueDescription },
	Set { key: ValueDescription, value: ValueDescription },
	Call { args: Vec<ValueDescription> },
	New { args: Vec<ValueDescription> },
}

impl Segment {
	pub fn is_set(&self) -> bool {
		matches!(self, Segment::Set { .. })
	}
}
