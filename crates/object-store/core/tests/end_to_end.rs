//! Two-peer scenarios from spec.md §8, driven over an in-memory duplex
//! transport: each side's `Transport::request` calls straight into the other
//! side's `ObjectStore::handle_request`, skipping the out-of-scope wire and
//! multiplexer entirely.

use std::sync::{Arc, OnceLock, Weak};

use objectstore::{
	HostError, NativeFunction, ObjectStore, ObjectStoreOptions, Payload, PlainObject,
	PrototypePolicy, RemoteErrorPolicy, TransportError, Value,
};

struct PeerTransport {
	peer: OnceLock<Weak<ObjectStore>>,
}

impl PeerTransport {
	fn new() -> Arc<Self> {
		Arc::new(Self { peer: OnceLock::new() })
	}

	fn bind(&self, peer: &Arc<ObjectStore>) {
		let _ = self.peer.set(Arc::downgrade(peer));
	}
}

#[async_trait::async_trait]
impl objectstore::Transport for PeerTransport {
	async fn request(&self, payload: Payload) -> Result<Payload, TransportError> {
		let peer = self.peer.get().and_then(Weak::upgrade).expect("peer not bound");
		match peer.handle_request(payload).await {
			Ok(Some(response)) => Ok(response),
			Ok(None) => Ok(serde_json::Value::Null),
			Err(err) => Err(TransportError(err.to_string())),
		}
	}
}

fn build_pair(options: ObjectStoreOptions) -> (Arc<ObjectStore>, Arc<ObjectStore>) {
	let transport_a = PeerTransport::new();
	let transport_b = PeerTransport::new();
	let a = Arc::new(ObjectStore::new(transport_a.clone(), options.clone()));
	let b = Arc::new(ObjectStore::new(transport_b.clone(), options));
	transport_a.bind(&b);
	transport_b.bind(&a);
	(a, b)
}

#[tokio::test]
async fn expose_and_request_a_primitive() {
	let (a, b) = build_pair(ObjectStoreOptions::default());
	a.expose("answer", Value::from(42.0)).unwrap();

	let value = b.request("answer").await.unwrap();
	match value {
		Value::Number(n) => assert_eq!(n, 42.0),
		other => panic!("unexpected {other:?}"),
	}
}

#[tokio::test]
async fn own_keys_reflects_a_remote_object() {
	let (a, b) = build_pair(ObjectStoreOptions::default());
	let obj = PlainObject::new().with("x", Value::from(1.0)).with("y", Value::from(2.0));
	a.expose("point", Value::Object(Arc::new(obj))).unwrap();

	let proxy = b.get("point");
	// Force the shape to resolve before reflecting on it.
	proxy.clone().recv().await.ok();
	let x = proxy.get_key("x".into()).recv().await.unwrap();
	match x {
		Value::Number(n) => assert_eq!(n, 1.0),
		other => panic!("unexpected {other:?}"),
	}
}

#[tokio::test]
async fn keys_only_policy_flattens_the_prototype_chain_into_has_keys() {
	let options = ObjectStoreOptions {
		remote_object_prototype: PrototypePolicy::KeysOnly,
		..ObjectStoreOptions::default()
	};
	let (a, b) = build_pair(options);
	let base = PlainObject::new().with("greeting", Value::from("hi"));
	let child =
		PlainObject::with_prototype(Some(Value::Object(Arc::new(base)))).with("name", Value::from("leaf"));
	a.expose("thing", Value::Object(Arc::new(child))).unwrap();

	let proxy = b.get("thing");
	proxy.clone().recv().await.ok();

	let own_keys = proxy.own_keys().unwrap();
	assert!(!own_keys.contains(&"greeting".into()), "prototype key must not appear in ownKeys");
	assert!(own_keys.contains(&"name".into()));

	assert!(proxy.has(&"name".into()).unwrap());
	assert!(proxy.has(&"greeting".into()).unwrap(), "inherited key should be visible via hasKeys");
	assert!(!proxy.has(&"nope".into()).unwrap());
	assert!(proxy.prototype().unwrap().is_none(), "keysOnly ships no prototype reference");
}

#[tokio::test]
async fn stringifying_a_proxy_is_synchronous_and_does_not_touch_the_network() {
	let (a, b) = build_pair(ObjectStoreOptions::default());
	a.expose("orphan", Value::Object(Arc::new(PlainObject::new()))).unwrap();
	let proxy = b.get("orphan");
	assert_eq!(proxy.to_string(), "[object RemoteObject]");
}

#[tokio::test]
async fn property_set_round_trips_through_the_owner() {
	let (a, b) = build_pair(ObjectStoreOptions::default());
	let obj = PlainObject::new().with("count", Value::from(0.0));
	let handle: Arc<dyn objectstore::RemoteObject> = Arc::new(obj);
	a.expose("counter", Value::Object(handle.clone())).unwrap();

	let proxy = b.get("counter");
	proxy.get_key("count".into()).set(Value::from(7.0)).unwrap().recv().await.unwrap();

	match handle.get(&"count".into()) {
		Some(Value::Number(n)) => assert_eq!(n, 7.0),
		other => panic!("unexpected {other:?}"),
	}
}

#[tokio::test]
async fn constructor_builds_a_remote_instance() {
	let (a, b) = build_pair(ObjectStoreOptions::default());
	let ctor = NativeFunction::new(|_this, _args| async { unreachable!("not called") })
		.with_construct(|args| async move {
			let Some(Value::Str(name)) = args.into_iter().next() else {
				return Err(HostError::new("expected a name"));
			};
			Ok(Value::Object(Arc::new(PlainObject::new().with("name", Value::Str(name)))))
		});
	a.expose("Widget", Value::Function(Arc::new(ctor))).unwrap();

	let widget = b.get("Widget").new_(vec![Value::from("gadget")]).recv().await.unwrap();
	let Value::Proxy(widget) = widget else { panic!("expected a proxy back") };
	let name = widget.get_key("name".into()).recv().await.unwrap();
	match name {
		Value::Str(s) => assert_eq!(&*s, "gadget"),
		other => panic!("unexpected {other:?}"),
	}
}

#[tokio::test]
async fn callbacks_pass_through_as_remote_functions() {
	let (a, b) = build_pair(ObjectStoreOptions::default());
	let apply = NativeFunction::new(|_this, args| async move {
		let mut args = args.into_iter();
		let Some(Value::Proxy(callback)) = args.next() else {
			return Err(HostError::new("expected a callback"));
		};
		callback.call(vec![Value::from(5.0)]).recv().await.map_err(|e| HostError::new(e.to_string()))
	});
	a.expose("apply", Value::Function(Arc::new(apply))).unwrap();

	let doubled = Arc::new(
		NativeFunction::new(|_this, args| async move {
			let Some(Value::Number(n)) = args.into_iter().next() else {
				return Err(HostError::new("expected a number"));
			};
			Ok(Value::from(n * 2.0))
		}),
	);
	// Pass B's own function value directly (not a `get()`-minted proxy): that
	// encodes a `Side::Local` reference B owns, so A decodes it into a proxy
	// pointing back at B — the actual cross-peer callback round trip.
	let result =
		b.get("apply").call(vec![Value::Function(doubled)]).recv().await.unwrap();
	match result {
		Value::Number(n) => assert_eq!(n, 10.0),
		other => panic!("unexpected {other:?}"),
	}
}

#[tokio::test]
async fn a_thrown_error_reconstructs_on_the_caller() {
	let (a, b) = build_pair(ObjectStoreOptions {
		remote_error: RemoteErrorPolicy::NewError,
		..ObjectStoreOptions::default()
	});
	let boom = NativeFunction::new(|_this, _args| async {
		Err(HostError::with_name("RangeError", "out of bounds"))
	});
	a.expose("boom", Value::Function(Arc::new(boom))).unwrap();

	let err = b.get("boom").call(vec![]).recv().await.unwrap_err();
	let message = err.to_string();
	assert!(message.contains("out of bounds"), "unexpected message: {message}");
}

#[tokio::test]
async fn sync_gc_releases_ids_after_proxies_drop() {
	// Exposed (named) ids are held strongly for the store's lifetime; only
	// the numeric id minted for the nested `child` object is GC-eligible.
	let (a, b) = build_pair(ObjectStoreOptions {
		request_latency: std::time::Duration::ZERO,
		..ObjectStoreOptions::default()
	});
	let child = PlainObject::new().with("name", Value::from("leaf"));
	let container = PlainObject::new().with("child", Value::Object(Arc::new(child)));
	a.expose("thing", Value::Object(Arc::new(container))).unwrap();

	{
		let child_value = b.get("thing").get_key("child".into()).recv().await.unwrap();
		assert!(matches!(child_value, Value::Proxy(_)));
	}
	assert_eq!(a.stats().local_entries, 1, "the owner registered the nested child");

	// The proxy above is dropped; its finalization queues the id for release.
	b.sync_gc().await.unwrap();
	assert_eq!(a.stats().local_entries, 0, "the owner released it after the sync round");
}
