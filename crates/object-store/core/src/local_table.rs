//! Component B (spec.md §4.B): the registry of values this peer has exposed or
//! described to the remote. Backed by `dashmap` the way the teacher's
//! `InstanceManager` keys live sessions by id — see
//! `crates/replicate/server/src/instance/manager.rs` in the retrieval pack.

use std::{
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Mutex, OnceLock,
	},
	time::{Duration, Instant},
};

use dashmap::DashMap;
use objectstore_wire::{Id, IdValue, ShapeDescription};

use crate::{error::StoreError, value::Value};

/// A cached shape plus the once-per-id "have we sent it yet" flag (spec.md
/// invariant 2). Shared between numeric and named (exposed) entries so both
/// get the same "describe once, reference thereafter" treatment.
#[derive(Default)]
struct ShapeCache {
	shape: OnceLock<ShapeDescription>,
	sent: AtomicBool,
}

struct OwnerEntry {
	value: Value,
	shapes: ShapeCache,
	last_sent: Mutex<Instant>,
}

struct ExposedEntry {
	value: Value,
	shapes: ShapeCache,
}

/// Identity key used to deduplicate re-registration of the same value (spec.md
/// invariant 1). Objects/functions dedupe by `Arc` pointer, symbols by their
/// own identity pointer; primitives are never registered here.
fn identity_key(value: &Value) -> Option<usize> {
	match value {
		Value::Object(o) => Some(std::sync::Arc::as_ptr(o) as *const () as usize),
		Value::Function(f) => Some(std::sync::Arc::as_ptr(f) as *const () as usize),
		Value::Symbol(s) => Some(s.identity()),
		_ => None,
	}
}

/// Outcome of an inbound `syncGcRequest` (spec.md §6).
#[derive(Debug, Default)]
pub struct SyncGcOutcome {
	pub deleted_items: Vec<Id>,
	pub unknown_new_items: Vec<Id>,
}

#[derive(Default)]
pub struct LocalTable {
	next_id: AtomicU64,
	entries: DashMap<u64, OwnerEntry>,
	by_identity: DashMap<usize, u64>,
	exposed: DashMap<String, ExposedEntry>,
	exposed_identity: DashMap<usize, String>,
}

impl LocalTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `value`, reusing the existing id if it was already registered
	/// (spec.md invariant 1). Numeric ids wrap monotonically, skipping ids
	/// still occupied (spec.md §4.B).
	pub fn register(&self, value: Value) -> Id {
		if let Some(key) = identity_key(&value) {
			if let Some(existing) = self.by_identity.get(&key) {
				return Id::local(IdValue::Numeric(*existing));
			}
		}
		let numeric = self.allocate();
		if let Some(key) = identity_key(&value) {
			self.by_identity.insert(key, numeric);
		}
		self.entries.insert(
			numeric,
			OwnerEntry { value, shapes: ShapeCache::default(), last_sent: Mutex::new(Instant::now()) },
		);
		Id::local(IdValue::Numeric(numeric))
	}

	/// Resolves `value`'s addressable [`Id`]: its exposed name if it was
	/// handed to [`Self::expose`], otherwise a registered numeric id. Lets an
	/// exposed object keep being described by the same stable name a caller
	/// already knows, instead of minting a second, numeric identity for the
	/// same value (spec.md invariant 3: same value, same id).
	pub fn identity_id(&self, value: &Value) -> Id {
		if let Some(key) = identity_key(value) {
			if let Some(name) = self.exposed_identity.get(&key) {
				return Id::local(IdValue::Named(name.clone()));
			}
		}
		self.register(value.clone())
	}

	fn allocate(&self) -> u64 {
		loop {
			let candidate = self.next_id.fetch_add(1, Ordering::Relaxed);
			if !self.entries.contains_key(&candidate) {
				return candidate;
			}
		}
	}

	/// Exposes `value` under a stable user-facing `name` (spec.md's "Exposed
	/// value" lifecycle). Enforces invariant 4: a name binds one value, a value
	/// is exposed under at most one name.
	pub fn expose(&self, name: String, value: Value) -> Result<(), StoreError> {
		if self.exposed.contains_key(&name) {
			return Err(StoreError::DuplicateName(name));
		}
		if let Some(key) = identity_key(&value) {
			if self.exposed_identity.contains_key(&key) {
				return Err(StoreError::ValueAlreadyExposed);
			}
			self.exposed_identity.insert(key, name.clone());
		}
		self.exposed.insert(name, ExposedEntry { value, shapes: ShapeCache::default() });
		Ok(())
	}

	pub fn exposed_names(&self) -> Vec<String> {
		self.exposed.iter().map(|e| e.key().clone()).collect()
	}

	/// Resolves an id to its value, marking it as freshly sent (refreshing the
	/// GC latency window) when `touch` is true. Exposed (named) values never
	/// expire, so `touch` is a no-op for them.
	pub fn lookup(&self, id: &IdValue, touch: bool) -> Option<Value> {
		match id {
			IdValue::Named(name) => self.exposed.get(name).map(|e| e.value.clone()),
			IdValue::Numeric(n) => {
				let entry = self.entries.get(n)?;
				if touch {
					*entry.last_sent.lock().expect("poisoned") = Instant::now();
				}
				Some(entry.value.clone())
			}
		}
	}

	/// Returns the cached shape for `id`, building it with `f` on first use
	/// (spec.md invariant 2: shape stability).
	pub fn shape_or_insert_with(
		&self,
		id: &IdValue,
		f: impl FnOnce() -> ShapeDescription,
	) -> Option<ShapeDescription> {
		match id {
			IdValue::Numeric(n) => {
				let entry = self.entries.get(n)?;
				Some(entry.shapes.shape.get_or_init(f).clone())
			}
			IdValue::Named(name) => {
				let entry = self.exposed.get(name)?;
				Some(entry.shapes.shape.get_or_init(f).clone())
			}
		}
	}

	/// Reports whether `id`'s shape still needs to go out on the wire, and
	/// marks it sent. A shape goes out at most once per id (spec.md invariant
	/// 2); every later reference to the same id is a bare [`Id`] because the
	/// remote is assumed to have cached it from the first description.
	pub fn take_needs_shape(&self, id: &IdValue) -> bool {
		match id {
			IdValue::Numeric(n) => match self.entries.get(n) {
				Some(entry) => !entry.shapes.sent.swap(true, Ordering::AcqRel),
				None => false,
			},
			IdValue::Named(name) => match self.exposed.get(name) {
				Some(entry) => !entry.shapes.sent.swap(true, Ordering::AcqRel),
				None => false,
			},
		}
	}

	/// Refreshes the last-sent time for `id` without changing its value
	/// (used when the remote acknowledges it via `syncGcRequest.newItems`).
	pub fn touch(&self, id: &IdValue) {
		if let IdValue::Numeric(n) = id {
			if let Some(entry) = self.entries.get(n) {
				*entry.last_sent.lock().expect("poisoned") = Instant::now();
			}
		}
	}

	/// Owner-side reconciliation of an inbound `syncGcRequest` (spec.md §4.F).
	///
	/// An id in `deleted` is released unless it was sent to the remote within
	/// `protect_within` of now — that race is exactly robustness requirement 1:
	/// a request that introduced the id may still be in flight, so a fresh
	/// `last_sent` is treated as "the remote might not know about this yet".
	/// Ids in `new_items` are acknowledged by refreshing their `last_sent`;
	/// ids the owner doesn't recognize are reported back as unknown so the
	/// holder re-introduces them on next use.
	pub fn handle_sync_gc(
		&self,
		deleted: &[Id],
		new_items: &[Id],
		protect_within: Duration,
	) -> SyncGcOutcome {
		let now = Instant::now();
		let mut outcome = SyncGcOutcome::default();

		for id in deleted {
			let IdValue::Numeric(n) = &id.value else {
				// Exposed (named) values are never released by GC.
				continue;
			};
			let Some(entry) = self.entries.get(n) else { continue };
			let last_sent = *entry.last_sent.lock().expect("poisoned");
			if now.duration_since(last_sent) < protect_within {
				continue;
			}
			drop(entry);
			self.entries.remove(n);
			// by_identity is keyed by pointer, not numeric id; sweep the reverse entry.
			self.by_identity.retain(|_, v| v != n);
			outcome.deleted_items.push(id.clone());
		}

		for id in new_items {
			match &id.value {
				IdValue::Numeric(n) if self.entries.contains_key(n) => self.touch(&id.value),
				_ => outcome.unknown_new_items.push(id.clone()),
			}
		}

		outcome
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::value::PlainObject;

	#[test]
	fn register_dedupes_same_object() {
		let table = LocalTable::new();
		let obj: Arc<dyn crate::value::RemoteObject> = Arc::new(PlainObject::new());
		let id1 = table.register(Value::Object(obj.clone()));
		let id2 = table.register(Value::Object(obj));
		assert_eq!(id1, id2);
		assert_eq!(table.len(), 1);
	}

	#[test]
	fn expose_enforces_name_and_value_uniqueness() {
		let table = LocalTable::new();
		let obj: Arc<dyn crate::value::RemoteObject> = Arc::new(PlainObject::new());
		table.expose("a".into(), Value::Object(obj.clone())).unwrap();
		assert!(matches!(
			table.expose("a".into(), Value::Object(Arc::new(PlainObject::new()))),
			Err(StoreError::DuplicateName(_))
		));
		assert!(matches!(
			table.expose("b".into(), Value::Object(obj)),
			Err(StoreError::ValueAlreadyExposed)
		));
	}

	#[test]
	fn allocate_skips_still_live_ids() {
		let table = LocalTable::new();
		table.next_id.store(0, Ordering::Relaxed);
		table.entries.insert(
			0,
			OwnerEntry {
				value: Value::Number(1.0),
				shapes: ShapeCache::default(),
				last_sent: Mutex::new(Instant::now()),
			},
		);
		let id = table.allocate();
		assert_eq!(id, 1);
	}

	#[test]
	fn sync_gc_releases_stale_ids_and_protects_fresh_ones() {
		let table = LocalTable::new();
		let id = table.register(Value::Number(1.0));
		let IdValue::Numeric(n) = id.value.clone() else { unreachable!() };

		// Freshly registered: protected by the latency window.
		let outcome = table.handle_sync_gc(
			&[Id::local(IdValue::Numeric(n))],
			&[],
			Duration::from_secs(60),
		);
		assert!(outcome.deleted_items.is_empty());
		assert!(table.lookup(&IdValue::Numeric(n), false).is_some());

		// With a zero-width window, the id is released.
		let outcome =
			table.handle_sync_gc(&[Id::local(IdValue::Numeric(n))], &[], Duration::ZERO);
		assert_eq!(outcome.deleted_items.len(), 1);
		assert!(table.lookup(&IdValue::Numeric(n), false).is_none());
	}

	#[test]
	fn sync_gc_reports_unknown_new_items() {
		let table = LocalTable::new();
		let bogus = Id::local(IdValue::Numeric(999));
		let outcome = table.handle_sync_gc(&[], std::slice::from_ref(&bogus), Duration::ZERO);
		assert_eq!(outcome.unknown_new_items, vec![bogus]);
	}

	#[test]
	fn exposed_values_get_a_once_per_name_shape_flag() {
		let table = LocalTable::new();
		table.expose("api".into(), Value::Number(1.0)).unwrap();
		let id = IdValue::Named("api".into());
		assert!(table.take_needs_shape(&id));
		assert!(!table.take_needs_shape(&id));
	}
}
