//! A transparent remote-object protocol: two peers expose arbitrary
//! in-process values to each other over a bidirectional message channel, and
//! read, call, construct, and mutate them as if they were local.
//!
//! Transport, request multiplexing, and wire serialization of the messages
//! this crate builds are out of scope (spec.md §1) — bring your own
//! [`Transport`] and hand its inbound messages to [`ObjectStore::handle_request`].
//! Everything else — the Value Codec, Local/Remote Tables, the Proxy Engine,
//! the Path Evaluator, and the GC Coordinator — lives here.
//!
//! ```no_run
//! use std::sync::Arc;
//! use objectstore::{ObjectStore, ObjectStoreOptions, Transport};
//!
//! # struct LoopbackTransport;
//! # #[async_trait::async_trait]
//! # impl Transport for LoopbackTransport {
//! #     async fn request(&self, payload: objectstore::Payload) -> Result<objectstore::Payload, objectstore::TransportError> {
//! #         Ok(payload)
//! #     }
//! # }
//! # async fn run() {
//! let store = ObjectStore::new(Arc::new(LoopbackTransport), ObjectStoreOptions::default());
//! store.expose("greet", objectstore::Value::from("hello")).unwrap();
//! # }
//! ```

mod codec;
mod error;
mod gc;
mod local_table;
mod path_eval;
mod proxy;
mod remote_table;
mod store;
mod transport;
mod value;

pub use error::{CodecError, GcError, PathError, ProtocolError, StoreError, TransportError, UnknownIdError};
pub use objectstore_wire as wire;
pub use proxy::Proxy;
pub use store::{ObjectStore, ObjectStoreOptions, PrototypePolicy, RemoteErrorPolicy, Stats};
pub use transport::{Payload, Transport};
pub use value::{
	BigIntLiteral, HostError, NativeFunction, OwnKey, PlainObject, PropertyKey, RemoteFunction,
	RemoteObject, SymbolHandle, Value,
};
