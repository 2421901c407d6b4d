//! Component F (spec.md §4.F/§4.G): the GC Coordinator. Runs on the *holder*
//! side — the peer sitting on proxies for someone else's values — and is
//! responsible for telling the owner which ids it has finished with, and
//! which recently-introduced ids are still in use.
//!
//! Only one round runs at a time; a trigger that arrives mid-round doesn't
//! queue a pile of redundant requests, it just asks for one more round once
//! the current one finishes (spec.md §4.G: coalescing).

use std::sync::{atomic::Ordering, Arc};

use objectstore_wire::{Request, SyncGcResponse};

use crate::{error::GcError, store::StoreInner};

/// Runs a `syncGc` round now, or — if one is already in flight — arranges for
/// exactly one more round to run once it finishes.
pub(crate) async fn run_sync(store: &Arc<StoreInner>) -> Result<(), GcError> {
	if store.options.skip_sync_gc {
		return Err(GcError::Disabled);
	}
	if store.gc_in_flight.swap(true, Ordering::AcqRel) {
		store.gc_retrigger.store(true, Ordering::Release);
		return Ok(());
	}

	let result = run_one_round(store).await;
	store.gc_in_flight.store(false, Ordering::Release);

	if store.gc_retrigger.swap(false, Ordering::AcqRel) {
		Box::pin(run_sync(store)).await?;
	}
	result
}

async fn run_one_round(store: &Arc<StoreInner>) -> Result<(), GcError> {
	if store.closed.load(Ordering::Acquire) {
		return Err(GcError::Closed);
	}

	let deleted_items = store.remote.snapshot_deleted().await;
	let new_items = store.remote.snapshot_new_items(store.options.request_latency);
	if deleted_items.is_empty() && new_items.is_empty() {
		return Ok(());
	}

	let payload = serde_json::to_value(Request::SyncGc {
		deleted_items: deleted_items.clone(),
		new_items,
	})
	.map_err(|e| GcError::Transport(crate::error::TransportError(e.to_string())))?;
	let response = store.transport.request(payload).await?;
	let response: SyncGcResponse = serde_json::from_value(response)
		.map_err(|e| GcError::Transport(crate::error::TransportError(e.to_string())))?;

	store.remote.acknowledge_deleted(&response.deleted_items);
	if !response.unknown_new_items.is_empty() {
		tracing::debug!(
			count = response.unknown_new_items.len(),
			"owner does not recognize some recently-held ids"
		);
	}
	Ok(())
}

/// Opportunistic trigger called after the Remote Table grows: if
/// `scheduleGcAfterObjectCount` is configured and crossed, kicks off a round
/// in the background rather than making the caller wait for one (spec.md
/// §4.G).
pub(crate) fn maybe_trigger(store: &Arc<StoreInner>) {
	let Some(threshold) = store.options.schedule_gc_after_object_count else { return };
	if store.options.skip_sync_gc || store.closed.load(Ordering::Acquire) {
		return;
	}
	if store.remote.live_count() < threshold || store.gc_in_flight.load(Ordering::Acquire) {
		return;
	}
	let store = store.clone();
	tokio::spawn(async move {
		if let Err(error) = run_sync(&store).await {
			tracing::warn!(%error, "threshold-triggered syncGc round failed");
		}
	});
}
