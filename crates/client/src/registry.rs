//! Pending-call registry.
//!
//! Tracks the correlation between outstanding requests and the caller-side
//! closures able to complete them. The registry is owned exclusively by its
//! channel's loop task, so it needs no locking; every method takes `&mut`.
//!
//! The store is bounded two ways: an explicit capacity checked at
//! registration, and a time-to-live enforced by [`CallbackRegistry::sweep`].
//! Both bounds report through the call's error path rather than leaking
//! entries silently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tether_proto::{CallbackToken, RequestId};

use crate::error::CallError;

/// Caller-side completion closure. Invoked with the reply's positional data.
pub type CallbackFn = Box<dyn FnMut(Vec<serde_json::Value>) + Send>;

/// Caller-side error path. Invoked at most once, with the reason the call
/// can no longer complete.
pub type ErrorFn = Box<dyn FnOnce(CallError) + Send>;

/// What happens to a pending call after its first successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
	/// Remove the entry after the first delivery; later replies are dropped.
	#[default]
	SingleShot,
	/// Keep the entry for repeated deliveries (progress then completion).
	///
	/// Each delivery refreshes the entry's deadline, so a live stream never
	/// expires but an idle one still does. Callers release retained entries
	/// explicitly with [`CallbackRegistry::release`].
	Retain,
}

/// Outcome of a resolution attempt. Returned for observability; the registry
/// has already logged and discarded on the non-delivered paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// A callback was invoked with the reply data.
	Delivered,
	/// No pending call matched the request id.
	UnknownRequest,
	/// The pending call had no callback under that token.
	UnknownCallback,
}

struct PendingCall {
	callbacks: HashMap<CallbackToken, CallbackFn>,
	on_error: Option<ErrorFn>,
	deadline: Instant,
	retention: Retention,
}

/// Bounded, sweep-expired store of pending calls.
pub struct CallbackRegistry {
	pending: HashMap<RequestId, PendingCall>,
	capacity: usize,
	ttl: Duration,
	default_retention: Retention,
}

impl CallbackRegistry {
	/// Creates a registry with the given bounds and default retention.
	pub fn new(capacity: usize, ttl: Duration, default_retention: Retention) -> Self {
		Self {
			pending: HashMap::new(),
			capacity,
			ttl,
			default_retention,
		}
	}

	/// Number of pending calls.
	pub fn len(&self) -> usize {
		self.pending.len()
	}

	/// Returns true if no calls are pending.
	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Registers the callback map for a request.
	///
	/// Returns false if the registry is at capacity; the rejection has
	/// already been delivered to `on_error` and the request must not be
	/// sent.
	pub fn register(
		&mut self,
		request_id: RequestId,
		callbacks: HashMap<CallbackToken, CallbackFn>,
		on_error: Option<ErrorFn>,
		retention: Option<Retention>,
		now: Instant,
	) -> bool {
		if self.pending.len() >= self.capacity {
			tracing::warn!(
				request_id = %request_id,
				capacity = self.capacity,
				"pending-call registry full, rejecting call"
			);
			if let Some(on_error) = on_error {
				on_error(CallError::RegistryFull {
					capacity: self.capacity,
				});
			}
			return false;
		}
		self.pending.insert(
			request_id,
			PendingCall {
				callbacks,
				on_error,
				deadline: now + self.ttl,
				retention: retention.unwrap_or(self.default_retention),
			},
		);
		true
	}

	/// Resolves one reply against the pending store.
	///
	/// Unknown request or callback ids are logged and discarded; they are
	/// never an error. A delivered single-shot entry is removed; a delivered
	/// retained entry stays, its deadline refreshed.
	pub fn resolve(
		&mut self,
		request_id: &RequestId,
		callback_id: &CallbackToken,
		data: Vec<serde_json::Value>,
		now: Instant,
	) -> Resolution {
		let Some(call) = self.pending.get_mut(request_id) else {
			tracing::warn!(request_id = %request_id, "no pending call for reply, dropping");
			return Resolution::UnknownRequest;
		};
		if !call.callbacks.contains_key(callback_id) {
			tracing::warn!(
				request_id = %request_id,
				callback_id = %callback_id,
				"no callback under that id, dropping reply"
			);
			return Resolution::UnknownCallback;
		}
		match call.retention {
			Retention::SingleShot => {
				// Remove before invoking so the entry is gone even if the
				// callback submits new calls through the same channel.
				let mut call = self
					.pending
					.remove(request_id)
					.unwrap_or_else(|| unreachable!("checked above"));
				let mut callback = call
					.callbacks
					.remove(callback_id)
					.unwrap_or_else(|| unreachable!("checked above"));
				callback(data);
			}
			Retention::Retain => {
				let callback = call
					.callbacks
					.get_mut(callback_id)
					.unwrap_or_else(|| unreachable!("checked above"));
				callback(data);
				call.deadline = now + self.ttl;
			}
		}
		Resolution::Delivered
	}

	/// Removes a pending call without invoking anything.
	///
	/// The explicit disposal path for retained entries. Returns true if an
	/// entry existed.
	pub fn release(&mut self, request_id: &RequestId) -> bool {
		self.pending.remove(request_id).is_some()
	}

	/// Removes every entry whose deadline has passed, delivering a timeout
	/// to each call's error path. Returns the number of expired entries.
	pub fn sweep(&mut self, now: Instant) -> usize {
		let expired: Vec<RequestId> = self
			.pending
			.iter()
			.filter(|(_, call)| call.deadline <= now)
			.map(|(id, _)| id.clone())
			.collect();
		for request_id in &expired {
			if let Some(call) = self.pending.remove(request_id) {
				tracing::warn!(request_id = %request_id, "pending call expired");
				if let Some(on_error) = call.on_error {
					on_error(CallError::Expired {
						request_id: request_id.clone(),
					});
				}
			}
		}
		expired.len()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use super::*;

	fn capture() -> (Arc<Mutex<Vec<Vec<serde_json::Value>>>>, CallbackFn) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let callback: CallbackFn = Box::new(move |data| sink.lock().unwrap().push(data));
		(seen, callback)
	}

	fn capture_error() -> (Arc<Mutex<Vec<String>>>, ErrorFn) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let on_error: ErrorFn = Box::new(move |error| sink.lock().unwrap().push(error.to_string()));
		(seen, on_error)
	}

	fn registry(retention: Retention) -> CallbackRegistry {
		CallbackRegistry::new(8, Duration::from_secs(30), retention)
	}

	#[test]
	fn resolve_invokes_the_matching_callback() {
		let mut registry = registry(Retention::SingleShot);
		let id = RequestId::mint("add");
		let first = CallbackToken::mint();
		let second = CallbackToken::mint();
		let (seen_first, cb_first) = capture();
		let (seen_second, cb_second) = capture();
		let callbacks = HashMap::from([(first.clone(), cb_first), (second.clone(), cb_second)]);
		let now = Instant::now();
		assert!(registry.register(id.clone(), callbacks, None, None, now));

		let outcome = registry.resolve(&id, &second, vec![serde_json::json!(5)], now);
		assert_eq!(outcome, Resolution::Delivered);
		assert!(seen_first.lock().unwrap().is_empty());
		assert_eq!(*seen_second.lock().unwrap(), vec![vec![serde_json::json!(5)]]);
	}

	#[test]
	fn unknown_request_is_a_logged_no_op() {
		let mut registry = registry(Retention::SingleShot);
		let outcome = registry.resolve(
			&RequestId::mint("add"),
			&CallbackToken::mint(),
			Vec::new(),
			Instant::now(),
		);
		assert_eq!(outcome, Resolution::UnknownRequest);
	}

	#[test]
	fn unknown_callback_keeps_the_entry() {
		let mut registry = registry(Retention::SingleShot);
		let id = RequestId::mint("add");
		let token = CallbackToken::mint();
		let (seen, callback) = capture();
		let now = Instant::now();
		registry.register(id.clone(), HashMap::from([(token.clone(), callback)]), None, None, now);

		let outcome = registry.resolve(&id, &CallbackToken::mint(), Vec::new(), now);
		assert_eq!(outcome, Resolution::UnknownCallback);
		assert!(seen.lock().unwrap().is_empty());

		// The real token still resolves afterwards.
		assert_eq!(registry.resolve(&id, &token, Vec::new(), now), Resolution::Delivered);
	}

	#[test]
	fn single_shot_drops_duplicate_replies() {
		let mut registry = registry(Retention::SingleShot);
		let id = RequestId::mint("add");
		let token = CallbackToken::mint();
		let (seen, callback) = capture();
		let now = Instant::now();
		registry.register(id.clone(), HashMap::from([(token.clone(), callback)]), None, None, now);

		assert_eq!(registry.resolve(&id, &token, vec![serde_json::json!(1)], now), Resolution::Delivered);
		assert_eq!(registry.resolve(&id, &token, vec![serde_json::json!(2)], now), Resolution::UnknownRequest);
		assert_eq!(seen.lock().unwrap().len(), 1);
	}

	#[test]
	fn retain_mode_delivers_repeatedly_until_released() {
		let mut registry = registry(Retention::Retain);
		let id = RequestId::mint("watch");
		let token = CallbackToken::mint();
		let (seen, callback) = capture();
		let now = Instant::now();
		registry.register(id.clone(), HashMap::from([(token.clone(), callback)]), None, None, now);

		for _ in 0..3 {
			assert_eq!(registry.resolve(&id, &token, Vec::new(), now), Resolution::Delivered);
		}
		assert_eq!(seen.lock().unwrap().len(), 3);

		assert!(registry.release(&id));
		assert_eq!(registry.resolve(&id, &token, Vec::new(), now), Resolution::UnknownRequest);
	}

	#[test]
	fn capacity_rejection_reaches_the_error_path() {
		let mut registry = CallbackRegistry::new(1, Duration::from_secs(30), Retention::SingleShot);
		let now = Instant::now();
		registry.register(RequestId::mint("a"), HashMap::new(), None, None, now);

		let (errors, on_error) = capture_error();
		let accepted = registry.register(RequestId::mint("b"), HashMap::new(), Some(on_error), None, now);
		assert!(!accepted);
		assert_eq!(registry.len(), 1);
		let errors = errors.lock().unwrap();
		assert_eq!(errors.len(), 1);
		assert!(errors[0].contains("full"));
	}

	#[test]
	fn sweep_expires_entries_onto_the_error_path() {
		let ttl = Duration::from_secs(5);
		let mut registry = CallbackRegistry::new(8, ttl, Retention::SingleShot);
		let now = Instant::now();
		let id = RequestId::mint("slow");
		let (errors, on_error) = capture_error();
		registry.register(id.clone(), HashMap::new(), Some(on_error), None, now);

		assert_eq!(registry.sweep(now + Duration::from_secs(1)), 0);
		assert_eq!(registry.sweep(now + Duration::from_secs(6)), 1);
		assert!(registry.is_empty());
		let errors = errors.lock().unwrap();
		assert_eq!(errors.len(), 1);
		assert!(errors[0].contains("expired"));
	}

	#[test]
	fn retained_delivery_refreshes_the_deadline() {
		let ttl = Duration::from_secs(5);
		let mut registry = CallbackRegistry::new(8, ttl, Retention::Retain);
		let now = Instant::now();
		let id = RequestId::mint("watch");
		let token = CallbackToken::mint();
		let (_seen, callback) = capture();
		registry.register(id.clone(), HashMap::from([(token.clone(), callback)]), None, None, now);

		// Delivery at t+4 pushes the deadline to t+9.
		let later = now + Duration::from_secs(4);
		assert_eq!(registry.resolve(&id, &token, Vec::new(), later), Resolution::Delivered);
		assert_eq!(registry.sweep(now + Duration::from_secs(6)), 0);
		assert_eq!(registry.sweep(now + Duration::from_secs(10)), 1);
	}
}
