//! The five error kinds of spec.md §7, composed bottom-up into [`StoreError`].

use objectstore_wire::Id;

use crate::value::HostError;

/// A malformed inbound payload or a path that violates well-formedness
/// (spec.md §3 invariant 5, §7 kind 1).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
	#[error("malformed payload: {0}")]
	Malformed(String),
	#[error("`set` may only be preceded by a `get` segment")]
	SetWithoutGet,
}

/// A request referenced an id absent from the owner's Local Table: released,
/// never seen, or in the wrong namespace (spec.md §7 kind 2).
#[derive(Debug, thiserror::Error)]
#[error("unknown id: {0}")]
pub struct UnknownIdError(pub Id);

/// Transport-level failure, propagated as-is from the `Transport` the caller
/// supplied (spec.md §7 kind 5). The out-of-scope multiplexer is responsible for
/// giving this a real cause (timeout, disconnect); this crate only forwards it.
#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Errors evaluating a path against the owner's Local Table (spec.md §4.E).
#[derive(Debug, thiserror::Error)]
pub enum PathError {
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	#[error(transparent)]
	UnknownId(#[from] UnknownIdError),
	/// The evaluated expression itself threw (spec.md §7 kind 3). Carried, not
	/// wrapped further: the Path Evaluator turns this into an
	/// [`objectstore_wire::ErrorDescription`] for the response.
	#[error("evaluation threw: {0}")]
	Thrown(#[from] HostError),
}

/// Errors encoding or decoding a [`crate::value::Value`]/`ValueDescription` pair
/// (spec.md §4.A).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	#[error(transparent)]
	UnknownId(#[from] UnknownIdError),
	/// A decoded error description, reconstructed per the `remoteError` policy
	/// (spec.md §7 kind 3, §6).
	#[error("remote threw: {0}")]
	Remote(HostError),
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// GC Coordinator failures (spec.md §4.G's `syncGc` row).
#[derive(Debug, thiserror::Error)]
pub enum GcError {
	#[error("gc sync is disabled by configuration")]
	Disabled,
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error("object store is closed")]
	Closed,
}

/// Every public [`crate::store::ObjectStore`] operation returns this (spec.md §7
/// kind 4 folds in here as `Closed`).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("object store is closed")]
	Closed,
	#[error("name {0:?} is already exposed")]
	DuplicateName(String),
	#[error("value is already exposed under a different name")]
	ValueAlreadyExposed,
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error(transparent)]
	Path(#[from] PathError),
	#[error(transparent)]
	Gc(#[from] GcError),
	#[error(transparent)]
	Transport(#[from] TransportError),
}
