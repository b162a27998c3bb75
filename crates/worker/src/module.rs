//! The contract between the dispatcher and pluggable module code.

use crate::error::ModuleError;
use crate::reply::ReplyHandle;

/// One positional argument as seen by a callee.
///
/// The dispatcher has already re-marshaled the wire form: data passes
/// through unchanged, callback placeholders arrive as live [`ReplyHandle`]s.
#[derive(Debug, Clone)]
pub enum CallArg {
	/// A wire-representable value, exactly as the caller sent it.
	Data(serde_json::Value),
	/// A live stand-in for one of the caller's function arguments.
	Callback(ReplyHandle),
}

impl CallArg {
	/// The contained data value, if any.
	pub fn as_data(&self) -> Option<&serde_json::Value> {
		match self {
			CallArg::Data(value) => Some(value),
			CallArg::Callback(_) => None,
		}
	}

	/// The contained reply handle, if any.
	pub fn as_callback(&self) -> Option<&ReplyHandle> {
		match self {
			CallArg::Callback(handle) => Some(handle),
			CallArg::Data(_) => None,
		}
	}

	/// Consumes the argument, returning the reply handle if it is one.
	pub fn into_callback(self) -> Option<ReplyHandle> {
		match self {
			CallArg::Callback(handle) => Some(handle),
			CallArg::Data(_) => None,
		}
	}
}

/// A unit of business logic served by a worker.
///
/// Operations are bound to the module's own internal state through
/// `&mut self`; the dispatch loop owns the module exclusively, so no
/// synchronization is needed. Invocation is fire-and-forget: nothing is
/// returned to the caller except through the reply handles.
pub trait Module: Send + 'static {
	/// One-shot initialization hook, invoked once at worker start.
	///
	/// A failure here is logged loudly and tolerated; the dispatcher
	/// continues serving.
	fn start(&mut self) -> Result<(), ModuleError> {
		Ok(())
	}

	/// Invokes one operation with re-marshaled arguments.
	///
	/// Only operations declared in the module's descriptor are routed here.
	/// An error is caught and logged per request; the dispatch loop never
	/// terminates because a callee failed.
	fn invoke(&mut self, operation: &str, args: Vec<CallArg>) -> Result<(), ModuleError>;
}
