//! Component G (spec.md §4.G): the facade wiring every other component
//! together, the way the teacher's `Client`/`Server` types wrap `Framed` +
//! `InstanceManager` (`crates/replicate/{client,server}/src/lib.rs`) around a
//! shared protocol core.

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use objectstore_wire::{Id, IdValue, Request, SyncGcResponse};
use tokio::sync::Mutex as AsyncMutex;

use crate::{
	error::{GcError, StoreError},
	local_table::LocalTable,
	proxy::Proxy,
	remote_table::RemoteTable,
	transport::{Payload, Transport},
	value::Value,
};

/// How much of an object/function's prototype chain rides along in its shape
/// description (spec.md §4.A, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrototypePolicy {
	/// Ship a reference to the prototype, enabling a decoded `instanceof`.
	Full,
	/// Ship a flattened list of keys reachable through the prototype chain
	/// (`hasKeys`) instead of the chain itself, enabling `has` but not a
	/// walkable prototype.
	KeysOnly,
	/// Ship neither; `has`/`instanceof` only see `ownKeys`.
	None,
}

/// How a decoded error description (spec.md §7 kind 3) is turned back into a
/// [`crate::value::HostError`] on the receiving side (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorPolicy {
	/// Reconstruct a fresh error carrying the remote's message/name/stack,
	/// with the remote error object attached as `value` (comlink's default).
	NewError,
	/// Surface the remote error's own proxy directly rather than
	/// synthesizing a local wrapper.
	RemoteObject,
}

/// Tuning knobs for the GC Coordinator and error reconstruction (spec.md §6,
/// ambient configuration per SPEC_FULL §3).
#[derive(Debug, Clone)]
pub struct ObjectStoreOptions {
	/// How long a freshly-sent or freshly-received id is protected from
	/// release by a racing `syncGc` round (spec.md §4.F robustness
	/// requirement 1).
	pub request_latency: Duration,
	/// If set, a background task triggers a `syncGc` round on this cadence.
	pub schedule_gc_after_time: Option<Duration>,
	/// If set, a `syncGc` round is triggered as soon as this many ids are
	/// queued for release, without waiting for the time-based schedule.
	pub schedule_gc_after_object_count: Option<usize>,
	pub remote_error: RemoteErrorPolicy,
	/// How much prototype information a shape description carries (spec.md
	/// §6's `remoteObjectPrototype`). `functionPrototype` is shipped
	/// regardless of this setting (spec.md §9's resolved Open Question).
	pub remote_object_prototype: PrototypePolicy,
	/// Disables automatic and explicit `syncGc` rounds entirely. Exposed
	/// values accumulate for the life of the store — the same trade-off the
	/// "doNotSyncGc" mode in spec.md §6 documents, for embedders that would
	/// rather leak than pay for GC chatter.
	pub skip_sync_gc: bool,
}

impl Default for ObjectStoreOptions {
	fn default() -> Self {
		Self {
			request_latency: Duration::from_millis(500),
			schedule_gc_after_time: None,
			schedule_gc_after_object_count: None,
			remote_error: RemoteErrorPolicy::NewError,
			remote_object_prototype: PrototypePolicy::Full,
			skip_sync_gc: false,
		}
	}
}

/// Point-in-time counts, for introspection/metrics (SPEC_FULL §4's
/// supplemented `stats()`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
	pub local_entries: usize,
	pub remote_entries: usize,
}

pub(crate) struct StoreInner {
	pub(crate) local: LocalTable,
	pub(crate) remote: RemoteTable,
	pub(crate) transport: Arc<dyn Transport>,
	pub(crate) options: ObjectStoreOptions,
	pub(crate) closed: AtomicBool,
	pub(crate) gc_in_flight: AtomicBool,
	pub(crate) gc_retrigger: AtomicBool,
}

impl StoreInner {
	pub(crate) fn check_open(&self) -> Result<(), StoreError> {
		if self.closed.load(Ordering::Acquire) {
			return Err(StoreError::Closed);
		}
		Ok(())
	}

	async fn send(&self, request: Request) -> Result<Payload, StoreError> {
		let payload = serde_json::to_value(&request)
			.map_err(|e| crate::error::ProtocolError::Malformed(e.to_string()))?;
		self.transport.request(payload).await.map_err(StoreError::from)
	}

	/// Resolves a [`Proxy`]'s path against its owner — the network-touching
	/// half of `.recv()` (spec.md's Design Note §9).
	pub(crate) async fn evaluate_remote(
		self: Arc<Self>,
		root: IdValue,
		path: Vec<objectstore_wire::Segment>,
	) -> Result<Value, StoreError> {
		self.check_open()?;
		let response = self.send(Request::Remote { root: Id::remote(root), path }).await?;
		let description: objectstore_wire::Response = serde_json::from_value(response)
			.map_err(|e| crate::error::ProtocolError::Malformed(e.to_string()))?;
		Ok(self.decode_value(description).await?)
	}

	/// Dispatches one inbound wire message, the symmetric counterpart to
	/// [`Self::send`] on the side that owns the value being asked about
	/// (spec.md §4.E/§4.F).
	pub(crate) async fn handle_request(
		self: Arc<Self>,
		payload: Payload,
	) -> Result<Option<Payload>, StoreError> {
		let request: Request = serde_json::from_value(payload)
			.map_err(|e| crate::error::ProtocolError::Malformed(e.to_string()))?;
		match request {
			Request::Remote { root, path } => {
				let response = self.handle_remote_request(root, path).await;
				Ok(Some(
					serde_json::to_value(&response)
						.map_err(|e| crate::error::ProtocolError::Malformed(e.to_string()))?,
				))
			}
			Request::SyncGc { deleted_items, new_items } => {
				let outcome =
					self.local.handle_sync_gc(&deleted_items, &new_items, self.options.request_latency);
				let response = SyncGcResponse {
					deleted_items: outcome.deleted_items,
					unknown_new_items: outcome.unknown_new_items,
				};
				Ok(Some(
					serde_json::to_value(&response)
						.map_err(|e| crate::error::ProtocolError::Malformed(e.to_string()))?,
				))
			}
			Request::Close => {
				self.closed.store(true, Ordering::Release);
				Ok(None)
			}
		}
	}

	async fn handle_remote_request(
		self: Arc<Self>,
		root: Id,
		path: Vec<objectstore_wire::Segment>,
	) -> objectstore_wire::Response {
		let Some(root_value) = self.local.lookup(&root.value, true) else {
			return self.encode_path_error(crate::error::PathError::UnknownId(
				crate::error::UnknownIdError(root),
			));
		};
		match crate::path_eval::evaluate_path(&self, root_value, path).await {
			Ok(value) => self.encode_value(&value),
			Err(err) => self.encode_path_error(err),
		}
	}
}

/// Component G's public surface: the two-peer transparent remote-object
/// protocol (spec.md §1).
pub struct ObjectStore {
	pub(crate) inner: Arc<StoreInner>,
	gc_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ObjectStore {
	pub fn new(transport: Arc<dyn Transport>, options: ObjectStoreOptions) -> Self {
		let inner = Arc::new(StoreInner {
			local: LocalTable::new(),
			remote: RemoteTable::new(),
			transport,
			options,
			closed: AtomicBool::new(false),
			gc_in_flight: AtomicBool::new(false),
			gc_retrigger: AtomicBool::new(false),
		});

		let gc_task = inner.options.schedule_gc_after_time.filter(|_| !inner.options.skip_sync_gc).map(
			|period| {
				let inner = inner.clone();
				tokio::spawn(async move {
					let mut ticker = tokio::time::interval(period);
					loop {
						ticker.tick().await;
						if inner.closed.load(Ordering::Acquire) {
							break;
						}
						if let Err(error) = crate::gc::run_sync(&inner).await {
							tracing::warn!(%error, "scheduled syncGc round failed");
						}
					}
				})
			},
		);

		Self { inner, gc_task: AsyncMutex::new(gc_task) }
	}

	/// Exposes `value` under `name` for the remote peer to [`Self::get`]
	/// (spec.md §4.B, §4.G).
	#[tracing::instrument(skip(self, value))]
	pub fn expose(&self, name: impl Into<String>, value: Value) -> Result<(), StoreError> {
		self.inner.check_open()?;
		let name = name.into();
		self.inner.local.expose(name.clone(), value)?;
		tracing::debug!(name, "exposed value");
		Ok(())
	}

	pub fn exposed_names(&self) -> Vec<String> {
		self.inner.local.exposed_names()
	}

	/// Returns a proxy for a value the remote peer is expected to have
	/// exposed under `name`. Constructing the proxy never touches the
	/// network — only [`Proxy::recv`] does (spec.md's Design Note §9).
	pub fn get(&self, name: impl Into<String>) -> Proxy {
		self.inner.remote.resolve(&self.inner, IdValue::Named(name.into()))
	}

	/// Convenience for the common `get(name).recv().await` round trip
	/// (SPEC_FULL §4's supplemented facade helper).
	pub async fn request(&self, name: impl Into<String>) -> Result<Value, StoreError> {
		self.get(name).recv().await
	}

	/// Delivers one inbound wire message to this store, returning the
	/// payload to send back (`None` for unilateral messages like `close`).
	/// The out-of-scope request multiplexer (spec.md §1) is responsible for
	/// correlating the returned payload with whatever transport-level
	/// request produced it.
	pub async fn handle_request(&self, payload: Payload) -> Result<Option<Payload>, StoreError> {
		self.inner.clone().handle_request(payload).await
	}

	/// Explicitly triggers a `syncGc` round (spec.md §4.G). A round already
	/// in flight makes this a no-op rather than an error.
	pub async fn sync_gc(&self) -> Result<(), GcError> {
		if self.inner.options.skip_sync_gc {
			return Err(GcError::Disabled);
		}
		if self.inner.closed.load(Ordering::Acquire) {
			return Err(GcError::Closed);
		}
		crate::gc::run_sync(&self.inner).await
	}

	/// Sends a unilateral `close` and marks this side closed; further calls
	/// return [`StoreError::Closed`] (spec.md §7 kind 4).
	pub async fn close(&self) -> Result<(), StoreError> {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		if let Some(task) = self.gc_task.lock().await.take() {
			task.abort();
		}
		let payload = serde_json::to_value(Request::Close)
			.map_err(|e| crate::error::ProtocolError::Malformed(e.to_string()))?;
		self.inner.transport.request(payload).await.ok();
		Ok(())
	}

	pub fn stats(&self) -> Stats {
		Stats { local_entries: self.inner.local.len(), remote_entries: self.inner.remote.live_count() }
	}
}
