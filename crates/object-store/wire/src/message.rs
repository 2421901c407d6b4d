use serde::{Deserialize, Serialize};

use crate::{id::Id, path::Segment, value::ValueDescription};

/// A message sent unilaterally or as a request from one peer's ObjectStore to the
/// other's (spec.md §6). `Close` is unilateral; `Request` and `SyncGc` expect a
/// [`Response`]/[`SyncGcResponse`] in return, correlated by whatever id scheme the
/// out-of-scope request multiplexer (spec.md §1) uses — that correlation never
/// appears in this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
	/// Evaluate `path` against `root` on the owner and return the result.
	Remote {
		root: Id,
		path: Vec<Segment>,
	},
	/// Reconcile pending releases and recently-introduced ids (spec.md §4.F).
	SyncGc {
		deleted_items: Vec<Id>,
		new_items: Vec<Id>,
	},
	Close,
}

/// The result of evaluating a [`Request::Remote`]. An error path evaluation is
/// not a transport-level failure: it is encoded as an ordinary
/// [`ValueDescription::Typed`] of kind `error` (spec.md §7, "user error").
pub type Response = ValueDescription;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncGcResponse {
	/// The subset of `deletedItems` the owner actually released.
	pub deleted_items: Vec<Id>,
	/// Ids in `newItems` the owner never heard of (already released, or a
	/// namespace mismatch); the coordinator must treat these as needing
	/// re-introduction on next use.
	pub unknown_new_items: Vec<Id>,
}
