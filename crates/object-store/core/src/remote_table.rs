//! Component C (spec.md §4.C): the registry of values the remote peer owns
//! that this peer currently holds a proxy for. Numeric ids are cached weakly
//! — once every [`Proxy`] for an id is dropped, [`ProxyShared`]'s `Drop` queues
//! the id for release — mirroring the teacher's `DashMap`-keyed session table
//! (`crates/replicate/server/src/instance/manager.rs`) but with the entries
//! held by [`std::sync::Weak`] instead of strongly, since nothing here is
//! supposed to keep a remote value alive past the last live proxy. Named
//! (exposed) ids are held strongly and never queued (spec.md §4.C).

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use objectstore_wire::{Id, IdValue, ShapeDescription};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::{
	proxy::{Proxy, ProxyShared},
	store::StoreInner,
	value::SymbolHandle,
};

pub struct RemoteTable {
	entries: DashMap<u64, std::sync::Weak<ProxyShared>>,
	named: DashMap<String, Arc<ProxyShared>>,
	queued_for_deletion: DashMap<u64, ()>,
	/// Remote symbols, cached by id for identity (spec.md invariant 3) but
	/// held strongly: a bare identity-only value has no reflection surface
	/// to make weak tracking worth the `Drop`-queue plumbing, so unlike
	/// `entries` these simply accumulate for the life of the store. Noted as
	/// a deliberate simplification in DESIGN.md.
	symbols: DashMap<u64, SymbolHandle>,
	pub(crate) cleanup_tx: mpsc::UnboundedSender<u64>,
	cleanup_rx: AsyncMutex<mpsc::UnboundedReceiver<u64>>,
}

impl Default for RemoteTable {
	fn default() -> Self {
		let (cleanup_tx, cleanup_rx) = mpsc::unbounded_channel();
		Self {
			entries: DashMap::new(),
			named: DashMap::new(),
			queued_for_deletion: DashMap::new(),
			symbols: DashMap::new(),
			cleanup_tx,
			cleanup_rx: AsyncMutex::new(cleanup_rx),
		}
	}
}

impl RemoteTable {
	pub fn new() -> Self {
		Self::default()
	}

	fn get_or_create(&self, store: &Arc<StoreInner>, id: IdValue) -> Arc<ProxyShared> {
		match &id {
			IdValue::Numeric(n) => {
				// A fresh use cancels any pending release (robustness
				// requirement: re-sending an id the remote queued for
				// deletion must dequeue it).
				self.queued_for_deletion.remove(n);
				if let Some(existing) = self.entries.get(n).and_then(|w| w.upgrade()) {
					return existing;
				}
				let shared = Arc::new(ProxyShared::new(store.clone(), id));
				self.entries.insert(*n, Arc::downgrade(&shared));
				shared
			}
			IdValue::Named(name) => self
				.named
				.entry(name.clone())
				.or_insert_with(|| Arc::new(ProxyShared::new(store.clone(), id.clone())))
				.clone(),
		}
	}

	/// Resolves a bare (shapeless) reference into a proxy, creating one if
	/// this is the first time the id has been seen (spec.md §4.A: "a bare id
	/// the receiver already has, or will resolve through its Remote Table").
	pub(crate) fn resolve(&self, store: &Arc<StoreInner>, id: IdValue) -> Proxy {
		Proxy::new_root(self.get_or_create(store, id))
	}

	/// Attaches a freshly-received shape to the proxy for its id, creating the
	/// proxy if necessary (spec.md §4.A's first-time `Object`/`Function`
	/// description).
	pub(crate) fn install_shape(
		&self,
		store: &Arc<StoreInner>,
		shape: ShapeDescription,
		is_function: bool,
	) -> Proxy {
		let shared = self.get_or_create(store, shape.id.value.clone());
		shared.bind(shape, is_function);
		Proxy::new_root(shared)
	}

	/// Drains finalization notifications from dropped [`ProxyShared`]s into
	/// the pending-deletion set, then returns everything currently queued —
	/// the `deletedItems` half of a `syncGc` round (spec.md §4.F, §4.G).
	pub(crate) async fn snapshot_deleted(&self) -> Vec<Id> {
		let mut rx = self.cleanup_rx.lock().await;
		while let Ok(n) = rx.try_recv() {
			self.queued_for_deletion.insert(n, ());
		}
		drop(rx);
		self.queued_for_deletion.iter().map(|e| Id::local(IdValue::Numeric(*e.key()))).collect()
	}

	/// Commits the subset of `deletedItems` the owner actually acknowledged
	/// releasing, dropping the last local bookkeeping for those ids.
	pub(crate) fn acknowledge_deleted(&self, ids: &[Id]) {
		for id in ids {
			if let IdValue::Numeric(n) = &id.value {
				self.queued_for_deletion.remove(n);
				self.entries.remove(n);
			}
		}
	}

	/// The `newItems` half of a `syncGc` round: ids introduced within
	/// `window` of now, whose liveness the owner should reconfirm (spec.md
	/// §4.F's robustness requirement 1, from the holder's side).
	pub(crate) fn snapshot_new_items(&self, window: Duration) -> Vec<Id> {
		let now = std::time::Instant::now();
		self.entries
			.iter()
			.filter_map(|e| {
				let shared = e.value().upgrade()?;
				(now.duration_since(shared.created_at) < window)
					.then(|| Id::local(IdValue::Numeric(*e.key())))
			})
			.collect()
	}

	/// Resolves a remote symbol id to a stable local stand-in, minting one on
	/// first sight (spec.md §3, invariant 3).
	pub(crate) fn resolve_symbol(&self, id: IdValue) -> SymbolHandle {
		let IdValue::Numeric(n) = id else {
			// Symbols are never exposed under a stable name in this protocol.
			return SymbolHandle::new(None);
		};
		self.symbols.entry(n).or_insert_with(|| SymbolHandle::new(None)).clone()
	}

	pub fn live_count(&self) -> usize {
		self.entries.len() + self.named.len() + self.symbols.len()
	}
}
