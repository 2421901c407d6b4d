//! The external collaborator boundary (spec.md §1, §6): a thin request/response
//! adapter this crate treats as a black box. Correlating requests with
//! responses, timeouts, and reconnection are the multiplexer's job, not ours.

use crate::error::TransportError;

/// Opaque, JSON-representable message content (spec.md §6: "at least
/// JSON-representable").
pub type Payload = serde_json::Value;

/// What spec.md §6 calls the `RequestHandler` contract: deliver an opaque
/// payload to the remote peer and resolve with its reply.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
	async fn request(&self, payload: Payload) -> Result<Payload, TransportError>;
}
