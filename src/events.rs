//! Event system for connection-establishment observability.
//!
//! Listeners observe the failover state machine without being able to steer
//! it: attempts, retries, pass boundaries, and the terminal outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Events emitted while establishing a connection.
#[derive(Debug, Clone)]
pub enum ConnectEvent {
    /// An attempt against one endpoint is starting.
    AttemptStarted {
        /// Configured factory name.
        factory: String,
        /// Endpoint being attempted, rendered `host:port`.
        address: String,
        /// 1-based pass over the address list.
        pass: u32,
        /// 1-based attempt number against this endpoint within the pass.
        attempt: u32,
        /// When the attempt started.
        timestamp: Instant,
    },

    /// An attempt failed.
    AttemptFailed {
        /// Configured factory name.
        factory: String,
        /// Endpoint that failed.
        address: String,
        /// 1-based pass over the address list.
        pass: u32,
        /// 1-based attempt number against this endpoint within the pass.
        attempt: u32,
        /// Whether the failover loop may retry this endpoint.
        retryable: bool,
        /// When the failure was observed.
        timestamp: Instant,
    },

    /// The same endpoint will be retried after a delay.
    RetryScheduled {
        /// Configured factory name.
        factory: String,
        /// Endpoint that will be retried.
        address: String,
        /// Configured wait before the retry.
        delay: Duration,
        /// When the retry was scheduled.
        timestamp: Instant,
    },

    /// A connection was established.
    Connected {
        /// Configured factory name.
        factory: String,
        /// Endpoint the connection is bound to.
        address: String,
        /// Total attempts made across all endpoints and passes.
        total_attempts: u32,
        /// When the connection came up.
        timestamp: Instant,
    },

    /// Every endpoint in every pass failed.
    Exhausted {
        /// Configured factory name.
        factory: String,
        /// Number of full passes that were made.
        passes: u32,
        /// Total attempts made.
        total_attempts: u32,
        /// When the loop gave up.
        timestamp: Instant,
    },

    /// The caller's cancellation signal was honored.
    Cancelled {
        /// Configured factory name.
        factory: String,
        /// Attempts made before cancellation.
        total_attempts: u32,
        /// When cancellation was observed.
        timestamp: Instant,
    },
}

impl ConnectEvent {
    /// The type of event, for coarse routing in listeners.
    pub fn event_type(&self) -> &'static str {
        match self {
            ConnectEvent::AttemptStarted { .. } => "attempt_started",
            ConnectEvent::AttemptFailed { .. } => "attempt_failed",
            ConnectEvent::RetryScheduled { .. } => "retry_scheduled",
            ConnectEvent::Connected { .. } => "connected",
            ConnectEvent::Exhausted { .. } => "exhausted",
            ConnectEvent::Cancelled { .. } => "cancelled",
        }
    }

    /// The name of the factory that emitted this event.
    pub fn factory(&self) -> &str {
        match self {
            ConnectEvent::AttemptStarted { factory, .. }
            | ConnectEvent::AttemptFailed { factory, .. }
            | ConnectEvent::RetryScheduled { factory, .. }
            | ConnectEvent::Connected { factory, .. }
            | ConnectEvent::Exhausted { factory, .. }
            | ConnectEvent::Cancelled { factory, .. } => factory,
        }
    }
}

/// Trait for listening to connection events.
pub trait EventListener: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &ConnectEvent);
}

/// A collection of event listeners.
#[derive(Clone, Default)]
pub struct EventListeners {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventListeners {
    /// Creates a new empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// If a listener panics, the panic is caught so the remaining listeners
    /// still observe the event.
    pub fn emit(&self, event: &ConnectEvent) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns `true` if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A simple function-based event listener.
pub struct FnListener<F>
where
    F: Fn(&ConnectEvent) + Send + Sync,
{
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&ConnectEvent) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&ConnectEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectEvent) {
        (self.f)(event)
    }
}
