//! Client role for tether RPC.
//!
//! Three pieces, wired together by [`RequestChannel`]:
//! * [`CallbackRegistry`] — correlates outstanding requests with the
//!   caller-side closures able to complete them; bounded and sweep-expired.
//! * [`RemoteModule`] / [`RemoteOp`] — transparent stand-ins generated from a
//!   module's capability descriptor.
//! * [`RequestChannel`] — one DEALER connection per module instance; a
//!   single loop task owns socket and registry, so no locking anywhere.
//!
//! A proxy call never returns a result synchronously: completion arrives by
//! invocation of the caller-supplied callbacks, or of the per-call error
//! path for timeouts and rejections.

#![warn(missing_docs)]

pub mod channel;
pub mod error;
pub mod proxy;
pub mod registry;

pub use channel::{ChannelHandle, PreparedCall, RequestChannel};
pub use error::{CallError, ClientError, ProxyError, Result};
pub use proxy::{CallArg, CallOptions, RemoteModule, RemoteOp};
pub use registry::{CallbackFn, CallbackRegistry, ErrorFn, Resolution, Retention};
