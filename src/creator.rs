//! The resilient connection creator.
//!
//! One uniform contract produces connections in any of the three shapes and
//! derives transactional resources from established connections, while the
//! failover state machine walks the configured address list:
//!
//! ```text
//! SELECTING -> ATTEMPTING -> CONNECTED
//!                 |
//!                 v
//!             RETRYING -> ATTEMPTING -> ... -> EXHAUSTED
//! ```
//!
//! The pass/retry schedule itself is a pure state machine ([`plan`]); this
//! module's async driver only executes its decisions: call the connector,
//! sleep the configured interval, honor cancellation at attempt boundaries.

use crate::config::{ConnectConfig, Credentials, SharedConfig};
use crate::connector::{ConnectionShape, Connector};
use crate::error::{AttemptFailure, ConnectError, ResourceError};
use crate::events::ConnectEvent;
use crate::xa::{TransactionalResource, XaConnector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Caller-supplied cancellation signal.
///
/// Checked at every attempt boundary: before starting an endpoint attempt and
/// before starting a retry wait. Cancelling does not interrupt an attempt
/// already in flight on the protocol layer.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every creation call sharing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

pub(crate) mod plan {
    //! Pure failover schedule.
    //!
    //! A [`FailoverPlan`] is a value machine: [`next`](FailoverPlan::next)
    //! says what to do, [`record_failure`](FailoverPlan::record_failure)
    //! advances it and reports how long to wait before the next attempt.
    //! No clocks, no sockets; trivially unit-testable.

    use crate::address::AddressListBehavior;
    use crate::config::ConnectConfig;
    use rand::seq::SliceRandom;
    use std::time::Duration;

    /// The next thing the driver should do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum NextAction {
        /// Attempt the endpoint at `endpoint` (index into the configured
        /// address list). `attempt` is 1-based within the current pass.
        Attempt {
            endpoint: usize,
            pass: u32,
            attempt: u32,
        },
        /// Every pass is exhausted.
        GiveUp { passes: u32 },
    }

    pub(crate) struct FailoverPlan {
        iterations: u32,
        reconnect_enabled: bool,
        reconnect_attempts: u32,
        reconnect_interval: Duration,
        behavior: AddressListBehavior,
        endpoint_count: usize,
        order: Vec<usize>,
        pass: u32,
        slot: usize,
        retries_used: u32,
    }

    impl FailoverPlan {
        pub(crate) fn new(config: &ConnectConfig) -> Self {
            Self {
                iterations: config.address_list_iterations,
                reconnect_enabled: config.reconnect_enabled,
                reconnect_attempts: config.reconnect_attempts,
                reconnect_interval: config.reconnect_interval,
                behavior: config.behavior,
                endpoint_count: config.addresses.len(),
                order: config.behavior.pass_order(&config.addresses),
                pass: 1,
                slot: 0,
                retries_used: 0,
            }
        }

        pub(crate) fn next(&self) -> NextAction {
            if self.pass > self.iterations {
                NextAction::GiveUp {
                    passes: self.iterations,
                }
            } else {
                NextAction::Attempt {
                    endpoint: self.order[self.slot],
                    pass: self.pass,
                    attempt: self.retries_used + 1,
                }
            }
        }

        /// Records a failed attempt and returns the wait to apply before the
        /// next one.
        ///
        /// A retryable failure with reconnection enabled and retries left
        /// stays on the same endpoint and waits the configured interval.
        /// Anything else moves on immediately: next endpoint, or next pass
        /// once the sequence is exhausted (re-permuting under `Random`).
        pub(crate) fn record_failure(&mut self, retryable: bool) -> Option<Duration> {
            if retryable && self.reconnect_enabled && self.retries_used < self.reconnect_attempts {
                self.retries_used += 1;
                return Some(self.reconnect_interval);
            }

            self.retries_used = 0;
            self.slot += 1;
            if self.slot == self.endpoint_count {
                self.slot = 0;
                self.pass += 1;
                if self.pass <= self.iterations {
                    if let AddressListBehavior::Random = self.behavior {
                        self.order.shuffle(&mut rand::rng());
                    }
                }
            }
            None
        }
    }

}

use plan::{FailoverPlan, NextAction};

/// Capability-polymorphic factory for live broker connections.
///
/// Four operations behind one contract: create a generic, queue-scoped, or
/// topic-scoped connection, and derive a transactional resource from an
/// established connection. The first three drive the endpoint-selection and
/// reconnection state machine; concurrent calls each run an independent
/// attempt sequence against a shared read-mostly configuration.
pub struct ConnectionCreator<C> {
    connector: C,
    config: SharedConfig,
    cancel: CancelToken,
}

impl<C> ConnectionCreator<C> {
    /// Creates a factory from a connector and a validated configuration.
    pub fn new(connector: C, config: ConnectConfig) -> Self {
        Self::with_shared(connector, SharedConfig::new(config))
    }

    /// Creates a factory sharing an externally-owned configuration handle.
    pub fn with_shared(connector: C, config: SharedConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "broker_connect_attempts_total",
                "Total connection attempts against individual broker endpoints"
            );
            describe_counter!(
                "broker_connect_attempt_failures_total",
                "Total failed connection attempts"
            );
            describe_counter!(
                "broker_connect_established_total",
                "Total connections successfully established"
            );
            describe_counter!(
                "broker_connect_exhausted_total",
                "Total creation calls that exhausted every endpoint"
            );
        });

        Self {
            connector,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// The shared configuration handle, for runtime updates.
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// A handle to this factory's cancellation signal.
    ///
    /// Cancelling aborts in-flight and future creation calls at their next
    /// attempt boundary, the way closing the owning factory does.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl<C: Connector> ConnectionCreator<C> {
    /// Creates a generic connection.
    ///
    /// Empty credentials fall back to the configuration defaults.
    pub async fn create_connection(
        &self,
        credentials: Credentials,
    ) -> Result<C::Connection, ConnectError> {
        self.establish(ConnectionShape::Generic, credentials).await
    }

    /// Creates a queue-scoped connection.
    pub async fn create_queue_connection(
        &self,
        credentials: Credentials,
    ) -> Result<C::Connection, ConnectError> {
        self.establish(ConnectionShape::Queue, credentials).await
    }

    /// Creates a topic-scoped connection.
    pub async fn create_topic_connection(
        &self,
        credentials: Credentials,
    ) -> Result<C::Connection, ConnectError> {
        self.establish(ConnectionShape::Topic, credentials).await
    }

    async fn establish(
        &self,
        shape: ConnectionShape,
        credentials: Credentials,
    ) -> Result<C::Connection, ConnectError> {
        // One snapshot per call; a concurrent configuration update never
        // tears an in-flight attempt sequence.
        let config = self.config.snapshot();
        let credentials = credentials.or_config_defaults(&config);

        let mut plan = FailoverPlan::new(&config);
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut total_attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&config, total_attempts, failures));
            }

            let (endpoint, pass, attempt) = match plan.next() {
                NextAction::GiveUp { passes } => {
                    config.event_listeners.emit(&ConnectEvent::Exhausted {
                        factory: config.name.clone(),
                        passes,
                        total_attempts,
                        timestamp: Instant::now(),
                    });

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        factory = %config.name,
                        passes,
                        total_attempts,
                        "all broker endpoints exhausted"
                    );

                    #[cfg(feature = "metrics")]
                    counter!("broker_connect_exhausted_total", "factory" => config.name.clone())
                        .increment(1);

                    return Err(ConnectError::Exhausted { passes, failures });
                }
                NextAction::Attempt {
                    endpoint,
                    pass,
                    attempt,
                } => (endpoint, pass, attempt),
            };

            let address = &config.addresses[endpoint];
            total_attempts += 1;

            config.event_listeners.emit(&ConnectEvent::AttemptStarted {
                factory: config.name.clone(),
                address: address.to_string(),
                pass,
                attempt,
                timestamp: Instant::now(),
            });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                factory = %config.name,
                address = %address,
                %shape,
                pass,
                attempt,
                "attempting broker connection"
            );

            #[cfg(feature = "metrics")]
            counter!("broker_connect_attempts_total", "factory" => config.name.clone())
                .increment(1);

            let outcome = self
                .connector
                .connect(shape, address, &credentials, config.client_id.as_deref())
                .await;
            match outcome {
                Ok(connection) => {
                    config.event_listeners.emit(&ConnectEvent::Connected {
                        factory: config.name.clone(),
                        address: address.to_string(),
                        total_attempts,
                        timestamp: Instant::now(),
                    });

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        factory = %config.name,
                        address = %address,
                        %shape,
                        total_attempts,
                        "broker connection established"
                    );

                    #[cfg(feature = "metrics")]
                    counter!("broker_connect_established_total", "factory" => config.name.clone())
                        .increment(1);

                    return Ok(connection);
                }
                Err(cause) => {
                    let retryable = cause.is_retryable();

                    config.event_listeners.emit(&ConnectEvent::AttemptFailed {
                        factory: config.name.clone(),
                        address: address.to_string(),
                        pass,
                        attempt,
                        retryable,
                        timestamp: Instant::now(),
                    });

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        factory = %config.name,
                        address = %address,
                        pass,
                        attempt,
                        retryable,
                        error = %cause,
                        "broker connection attempt failed"
                    );

                    #[cfg(feature = "metrics")]
                    counter!("broker_connect_attempt_failures_total", "factory" => config.name.clone())
                        .increment(1);

                    failures.push(AttemptFailure {
                        address: address.to_string(),
                        pass,
                        attempt,
                        cause,
                    });

                    if let Some(delay) = plan.record_failure(retryable) {
                        config.event_listeners.emit(&ConnectEvent::RetryScheduled {
                            factory: config.name.clone(),
                            address: address.to_string(),
                            delay,
                            timestamp: Instant::now(),
                        });

                        if self.cancel.is_cancelled() {
                            return Err(self.cancelled(&config, total_attempts, failures));
                        }
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn cancelled(
        &self,
        config: &ConnectConfig,
        total_attempts: u32,
        failures: Vec<AttemptFailure>,
    ) -> ConnectError {
        config.event_listeners.emit(&ConnectEvent::Cancelled {
            factory: config.name.clone(),
            total_attempts,
            timestamp: Instant::now(),
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            factory = %config.name,
            total_attempts,
            "connection establishment cancelled"
        );

        ConnectError::Cancelled { failures }
    }
}

impl<C: XaConnector> ConnectionCreator<C> {
    /// Derives a transactional resource from an established connection.
    ///
    /// `owner` is the connection wrapper that owns the physical connection;
    /// it is carried as an opaque correlation key. Fails with
    /// [`ResourceError`] when the protocol layer reports the connection
    /// unsuitable; the connection itself stays live.
    pub async fn create_transactional_resource<W>(
        &self,
        owner: W,
        connection: &C::Connection,
    ) -> Result<TransactionalResource<C::Branch, W>, ResourceError> {
        let branch = self.connector.open_transaction_branch(connection).await?;
        Ok(TransactionalResource::new(branch, owner))
    }
}
