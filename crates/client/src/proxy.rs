//! Remote proxy generation.
//!
//! Consumes a module's capability descriptor and yields one forwarding
//! stand-in per declared operation. A stand-in keeps the operation's name and
//! positional calling convention; invoking it marshals the arguments, swaps
//! each function-typed argument for a freshly minted token, and hands the
//! envelope plus token→closure map to the request channel as one unit. The
//! call never returns a result; completion arrives through the supplied
//! callbacks, or through the error path for timeouts and rejections.

use std::collections::HashMap;

use tether_proto::{CallbackToken, ModuleDescriptor, RequestEnvelope, RequestId, Value};

use crate::channel::{ChannelHandle, PreparedCall};
use crate::error::ProxyError;
use crate::registry::{CallbackFn, ErrorFn, Retention};

/// One positional argument to a remote call.
pub enum CallArg {
	/// A wire-representable value, passed through unchanged.
	Data(serde_json::Value),
	/// A function argument, to be replaced by a placeholder token.
	Callback(CallbackFn),
}

impl CallArg {
	/// Wraps a wire-representable value.
	pub fn data(value: impl Into<serde_json::Value>) -> Self {
		CallArg::Data(value.into())
	}

	/// Wraps a completion closure.
	pub fn callback(callback: impl FnMut(Vec<serde_json::Value>) + Send + 'static) -> Self {
		CallArg::Callback(Box::new(callback))
	}
}

/// Per-call knobs beyond the positional arguments.
#[derive(Default)]
pub struct CallOptions {
	/// Error path for timeout, rejection, and encode failures.
	pub on_error: Option<ErrorFn>,
	/// Overrides the channel's default retention for this call.
	pub retention: Option<Retention>,
}

impl CallOptions {
	/// Options with an error-path closure.
	pub fn with_error(on_error: impl FnOnce(crate::error::CallError) + Send + 'static) -> Self {
		Self {
			on_error: Some(Box::new(on_error)),
			retention: None,
		}
	}
}

/// Remote stand-in for a whole module.
pub struct RemoteModule {
	descriptor: ModuleDescriptor,
	channel: ChannelHandle,
}

impl RemoteModule {
	/// Builds proxies for every operation the descriptor declares.
	pub fn new(descriptor: ModuleDescriptor, channel: ChannelHandle) -> Self {
		Self { descriptor, channel }
	}

	/// The descriptor the proxies were generated from.
	pub fn descriptor(&self) -> &ModuleDescriptor {
		&self.descriptor
	}

	/// Returns the forwarding stand-in for one declared operation.
	pub fn op(&self, operation: &str) -> Result<RemoteOp, ProxyError> {
		if !self.descriptor.contains(operation) {
			return Err(ProxyError::UnknownOperation {
				module: self.descriptor.name().to_string(),
				operation: operation.to_string(),
			});
		}
		Ok(RemoteOp {
			name: operation.to_string(),
			channel: self.channel.clone(),
		})
	}

	/// Stand-ins for every declared operation, in declaration order.
	pub fn ops(&self) -> Vec<RemoteOp> {
		self.descriptor
			.operations()
			.map(|name| RemoteOp {
				name: name.to_string(),
				channel: self.channel.clone(),
			})
			.collect()
	}

	/// Releases a pending call's resources (retain-mode disposal).
	pub fn release(&self, request_id: RequestId) {
		self.channel.release(request_id);
	}
}

/// Forwarding stand-in for one operation.
pub struct RemoteOp {
	name: String,
	channel: ChannelHandle,
}

impl RemoteOp {
	/// Operation name, as declared by the module.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Invokes the operation remotely. Fire-and-forget; completion arrives
	/// only through callback arguments. Returns the minted request id.
	pub fn invoke(&self, args: Vec<CallArg>) -> RequestId {
		self.invoke_with(args, CallOptions::default())
	}

	/// Invokes the operation with per-call options.
	pub fn invoke_with(&self, args: Vec<CallArg>, options: CallOptions) -> RequestId {
		let request_id = RequestId::mint(&self.name);
		let mut wire_args = Vec::with_capacity(args.len());
		let mut callbacks: HashMap<CallbackToken, CallbackFn> = HashMap::new();
		for arg in args {
			match arg {
				CallArg::Data(value) => wire_args.push(Value::Data(value)),
				CallArg::Callback(callback) => {
					let token = CallbackToken::mint();
					callbacks.insert(token.clone(), callback);
					wire_args.push(Value::Callback(token));
				}
			}
		}
		let envelope = RequestEnvelope {
			request_id: request_id.clone(),
			callee: self.name.clone(),
			args: wire_args,
		};
		self.channel.submit(PreparedCall {
			envelope,
			callbacks,
			on_error: options.on_error,
			retention: options.retention,
		});
		request_id
	}
}
