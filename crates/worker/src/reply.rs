//! Live stand-ins for caller-side callbacks.

use bytes::Bytes;
use tokio::sync::mpsc;

use tether_proto::{CallbackToken, ReplyEnvelope, RequestId};

/// One encoded reply, tagged with the routing frame it must travel under.
#[derive(Debug)]
pub(crate) struct OutboundReply {
	pub(crate) route: Bytes,
	pub(crate) payload: Vec<u8>,
}

/// A re-materialized callback: invoking it sends a reply envelope back over
/// the worker connection, tagged with the routing frame captured from the
/// originating request.
///
/// Handles are cheap to clone and may be called zero, one, or many times;
/// whether repeated calls reach the caller depends on the client's retention
/// mode. Distinct placeholders in one request yield independent handles.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
	request_id: RequestId,
	callback_id: CallbackToken,
	route: Bytes,
	tx: mpsc::UnboundedSender<OutboundReply>,
}

impl ReplyHandle {
	pub(crate) fn new(
		request_id: RequestId,
		callback_id: CallbackToken,
		route: Bytes,
		tx: mpsc::UnboundedSender<OutboundReply>,
	) -> Self {
		Self {
			request_id,
			callback_id,
			route,
			tx,
		}
	}

	/// Id of the request this handle answers.
	pub fn request_id(&self) -> &RequestId {
		&self.request_id
	}

	/// Which of the request's callbacks this handle targets.
	pub fn callback_id(&self) -> &CallbackToken {
		&self.callback_id
	}

	/// Sends one reply carrying `data` as the callback's positional
	/// arguments. Fire-and-forget: delivery problems are logged, never
	/// returned to module code.
	pub fn call(&self, data: Vec<serde_json::Value>) {
		let envelope = ReplyEnvelope {
			request_id: self.request_id.clone(),
			callback_id: self.callback_id.clone(),
			data,
		};
		let payload = match envelope.encode() {
			Ok(payload) => payload,
			Err(error) => {
				tracing::error!(request_id = %self.request_id, %error, "failed to encode reply");
				return;
			}
		};
		let reply = OutboundReply {
			route: self.route.clone(),
			payload,
		};
		if self.tx.send(reply).is_err() {
			tracing::warn!(request_id = %self.request_id, "worker loop gone, dropping reply");
		}
	}
}
