//! Worker role for tether RPC.
//!
//! A worker connects to a broker's back endpoint as one of a pool of
//! equivalent instances and serves one module: the [`Module`] trait is the
//! contract with pluggable business logic, [`ReplyHandle`] re-materializes
//! the caller's function arguments as live stand-ins, and
//! [`WorkerDispatcher`] is the event loop tying them together.

#![warn(missing_docs)]

pub mod dispatcher;
pub mod error;
pub mod module;
pub mod reply;

pub use dispatcher::WorkerDispatcher;
pub use error::{ModuleError, Result, WorkerError};
pub use module::{CallArg, Module};
pub use reply::ReplyHandle;
