//! Request channel: one logical connection per module instance.
//!
//! A single loop task owns both the DEALER socket and the pending-call
//! registry, so registration, transmission, reply resolution, and expiry all
//! happen on one thread of control. Submitting a call registers its callback
//! map strictly before the envelope is transmitted; a reply can never race
//! its own registration.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use tether_proto::{ReplyEnvelope, RequestEnvelope, RequestId};

use crate::error::{CallError, ClientError, Result};
use crate::registry::{CallbackFn, CallbackRegistry, ErrorFn, Retention};

/// How often the loop sweeps the registry for expired calls.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// An envelope plus the caller-side state that must be registered before it
/// is sent.
pub struct PreparedCall {
	/// The request to transmit.
	pub envelope: RequestEnvelope,
	/// Token → closure map for the call's function arguments.
	pub callbacks: std::collections::HashMap<tether_proto::CallbackToken, CallbackFn>,
	/// Error path for timeout, rejection, and encode failures.
	pub on_error: Option<ErrorFn>,
	/// Per-call retention override.
	pub retention: Option<Retention>,
}

impl std::fmt::Debug for PreparedCall {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PreparedCall")
			.field("envelope", &self.envelope)
			.field("callbacks", &self.callbacks.len())
			.finish_non_exhaustive()
	}
}

/// Commands accepted by the channel loop.
#[derive(Debug)]
pub(crate) enum ChannelCmd {
	/// Register and transmit one call.
	Submit(Box<PreparedCall>),
	/// Drop a pending call's resources without invoking anything.
	Release(RequestId),
}

/// Cloneable submission port onto a channel loop.
#[derive(Clone)]
pub struct ChannelHandle {
	tx: mpsc::UnboundedSender<ChannelCmd>,
}

impl ChannelHandle {
	/// Enqueues a call. Fire-and-forget: a closed channel is logged, not
	/// surfaced.
	pub(crate) fn submit(&self, call: PreparedCall) {
		if self.tx.send(ChannelCmd::Submit(Box::new(call))).is_err() {
			tracing::warn!("request channel closed, dropping call");
		}
	}

	/// Releases a pending call's resources (retain-mode disposal).
	pub fn release(&self, request_id: RequestId) {
		if self.tx.send(ChannelCmd::Release(request_id)).is_err() {
			tracing::warn!("request channel closed, dropping release");
		}
	}

	/// A handle wired to a bare receiver instead of a loop. For tests.
	pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<ChannelCmd>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}
}

/// Client transport for one module instance.
pub struct RequestChannel {
	handle: ChannelHandle,
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

impl RequestChannel {
	/// Connects to the module's front endpoint and starts the channel loop.
	///
	/// # Errors
	///
	/// Returns an error if the transport connection cannot be established;
	/// the role does not start.
	pub async fn connect(endpoint: &str, registry: CallbackRegistry) -> Result<Self> {
		let mut socket = DealerSocket::new();
		socket.connect(endpoint).await.map_err(|source| ClientError::Connect {
			endpoint: endpoint.to_string(),
			source,
		})?;
		tracing::info!(%endpoint, "request channel connected");

		let (tx, rx) = mpsc::unbounded_channel();
		let cancel = CancellationToken::new();
		let task = tokio::spawn(run_loop(socket, registry, rx, cancel.clone()));
		Ok(Self {
			handle: ChannelHandle { tx },
			cancel,
			task,
		})
	}

	/// Returns a cloneable submission port for proxies.
	pub fn handle(&self) -> ChannelHandle {
		self.handle.clone()
	}

	/// Stops the channel loop and waits for it to finish.
	pub async fn shutdown(self) {
		self.cancel.cancel();
		let _ = self.task.await;
	}
}

async fn run_loop(
	mut socket: DealerSocket,
	mut registry: CallbackRegistry,
	mut rx: mpsc::UnboundedReceiver<ChannelCmd>,
	cancel: CancellationToken,
) {
	let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
	sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
	loop {
		tokio::select! {
			_ = cancel.cancelled() => break,
			cmd = rx.recv() => match cmd {
				None => break,
				Some(ChannelCmd::Submit(call)) => submit(&mut socket, &mut registry, *call).await,
				Some(ChannelCmd::Release(request_id)) => {
					registry.release(&request_id);
				}
			},
			incoming = socket.recv() => match incoming {
				Ok(message) => deliver(&mut registry, &message),
				Err(error) => {
					tracing::warn!(%error, pending = registry.len(), "request channel receive failed, stopping loop");
					break;
				}
			},
			_ = sweep.tick() => {
				registry.sweep(Instant::now());
			}
		}
	}
}

/// Registers, then transmits. Registration first: the reply path shares this
/// loop, so an answer observed after `send` always finds its entry.
async fn submit(socket: &mut DealerSocket, registry: &mut CallbackRegistry, call: PreparedCall) {
	let PreparedCall {
		envelope,
		callbacks,
		on_error,
		retention,
	} = call;
	let request_id = envelope.request_id.clone();
	let payload = match envelope.encode() {
		Ok(payload) => payload,
		Err(source) => {
			tracing::error!(request_id = %request_id, error = %source, "failed to encode request");
			if let Some(on_error) = on_error {
				on_error(CallError::Encode { request_id, source });
			}
			return;
		}
	};
	if !registry.register(request_id.clone(), callbacks, on_error, retention, Instant::now()) {
		return;
	}
	if let Err(error) = socket.send(ZmqMessage::from(payload)).await {
		// Fire-and-forget at this layer: the entry stays pending and will
		// expire through the sweep.
		tracing::warn!(request_id = %request_id, %error, "failed to transmit request");
	}
}

/// Parses a reply frame set and resolves it against the registry.
fn deliver(registry: &mut CallbackRegistry, message: &ZmqMessage) {
	// The router consumed the routing frame; frame 0 is the JSON payload.
	let Some(payload) = message.get(0) else {
		tracing::warn!("dropping empty reply message");
		return;
	};
	match ReplyEnvelope::decode(payload) {
		Ok(reply) => {
			registry.resolve(&reply.request_id, &reply.callback_id, reply.data, Instant::now());
		}
		Err(error) => {
			tracing::warn!(%error, "dropping undecodable reply");
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use serde_json::json;
	use tether_proto::{CallbackToken, Value};
	use zeromq::RouterSocket;

	use super::*;

	const RECV_TIMEOUT: Duration = Duration::from_secs(5);

	async fn fake_router() -> (RouterSocket, String) {
		let mut router = RouterSocket::new();
		let endpoint = router
			.bind("tcp://127.0.0.1:0")
			.await
			.expect("bind fake router")
			.to_string();
		(router, endpoint)
	}

	fn call_with_callback(
		operation: &str,
	) -> (PreparedCall, CallbackToken, tokio::sync::mpsc::UnboundedReceiver<Vec<serde_json::Value>>) {
		let (data_tx, data_rx) = mpsc::unbounded_channel();
		let token = CallbackToken::mint();
		let callback: CallbackFn = Box::new(move |data| {
			let _ = data_tx.send(data);
		});
		let envelope = RequestEnvelope {
			request_id: RequestId::mint(operation),
			callee: operation.to_string(),
			args: vec![Value::Data(json!(2)), Value::Data(json!(3)), Value::Callback(token.clone())],
		};
		let call = PreparedCall {
			envelope,
			callbacks: HashMap::from([(token.clone(), callback)]),
			on_error: None,
			retention: None,
		};
		(call, token, data_rx)
	}

	fn test_registry() -> CallbackRegistry {
		CallbackRegistry::new(64, Duration::from_secs(30), Retention::SingleShot)
	}

	#[tokio::test]
	async fn connect_failure_is_explicit() {
		let result = RequestChannel::connect("not-an-endpoint", test_registry()).await;
		assert!(matches!(result, Err(ClientError::Connect { .. })));
	}

	#[tokio::test]
	async fn request_reaches_the_wire_and_reply_resolves() {
		let (mut router, endpoint) = fake_router().await;
		let channel = RequestChannel::connect(&endpoint, test_registry()).await.unwrap();
		let (call, token, mut data_rx) = call_with_callback("add");
		let request_id = call.envelope.request_id.clone();
		channel.handle().submit(call);

		// The fake router sees [identity, payload].
		let message = tokio::time::timeout(RECV_TIMEOUT, router.recv()).await.unwrap().unwrap();
		let mut frames = message.into_vecdeque();
		assert_eq!(frames.len(), 2);
		let identity = frames.pop_front().unwrap();
		let request = RequestEnvelope::decode(&frames.pop_front().unwrap()).unwrap();
		assert_eq!(request.request_id, request_id);
		assert_eq!(request.callee, "add");

		// Reply [identity, payload]; the identity routes it back.
		let reply = ReplyEnvelope {
			request_id,
			callback_id: token,
			data: vec![json!(5)],
		};
		let mut frames = std::collections::VecDeque::new();
		frames.push_back(identity);
		frames.push_back(bytes::Bytes::from(reply.encode().unwrap()));
		router.send(ZmqMessage::try_from(frames).unwrap()).await.unwrap();

		let data = tokio::time::timeout(RECV_TIMEOUT, data_rx.recv()).await.unwrap().unwrap();
		assert_eq!(data, vec![json!(5)]);
		channel.shutdown().await;
	}

	#[tokio::test]
	async fn undecodable_reply_is_dropped_and_the_loop_survives() {
		let (mut router, endpoint) = fake_router().await;
		let channel = RequestChannel::connect(&endpoint, test_registry()).await.unwrap();
		let (call, token, mut data_rx) = call_with_callback("add");
		let request_id = call.envelope.request_id.clone();
		channel.handle().submit(call);

		let message = tokio::time::timeout(RECV_TIMEOUT, router.recv()).await.unwrap().unwrap();
		let identity = message.into_vecdeque().pop_front().unwrap();

		// Garbage first; the loop must log, drop, and keep serving.
		let mut garbage = std::collections::VecDeque::new();
		garbage.push_back(identity.clone());
		garbage.push_back(bytes::Bytes::from_static(b"{not json"));
		router.send(ZmqMessage::try_from(garbage).unwrap()).await.unwrap();

		let reply = ReplyEnvelope {
			request_id,
			callback_id: token,
			data: vec![json!("ok")],
		};
		let mut frames = std::collections::VecDeque::new();
		frames.push_back(identity);
		frames.push_back(bytes::Bytes::from(reply.encode().unwrap()));
		router.send(ZmqMessage::try_from(frames).unwrap()).await.unwrap();

		let data = tokio::time::timeout(RECV_TIMEOUT, data_rx.recv()).await.unwrap().unwrap();
		assert_eq!(data, vec![json!("ok")]);
		channel.shutdown().await;
	}
}
