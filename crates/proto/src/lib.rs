//! Wire protocol types for tether RPC.
//!
//! This crate is the leaf of the workspace: it defines the request/reply
//! envelopes exchanged between protocol peers, the tagged argument [`Value`]
//! that carries either plain JSON data or a callback correlation token, and
//! the [`ModuleDescriptor`] a module supplies to declare its callable
//! operations. All wire payloads are JSON; the multipart transport framing
//! around them lives with the roles, not here.

#![warn(missing_docs)]

pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod value;

pub use descriptor::{ModuleDescriptor, RESERVED_OPS};
pub use envelope::{ReplyEnvelope, RequestEnvelope, RequestId};
pub use error::{ProtoError, Result};
pub use value::{CallbackToken, Value};
