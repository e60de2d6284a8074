//! Connection factory configuration.
//!
//! Configuration is an immutable snapshot ([`ConnectConfig`]) built through a
//! validating builder. Runtime mutation goes through [`SharedConfig`], which
//! swaps a fully-validated snapshot in as a unit so a concurrent reader never
//! observes a half-updated configuration (new address list with the old
//! behavior, or vice versa).

use crate::address::{parse_address_list, AddressListBehavior, BrokerAddress};
use crate::error::ConfigError;
use crate::events::{ConnectEvent, EventListeners, FnListener};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A username/password pair forwarded verbatim to the protocol layer.
///
/// An empty pair means "use the configuration defaults"; if the configuration
/// has none either, empty values are forwarded and the protocol layer decides
/// whether anonymous connection is permitted.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// An empty pair, deferring to configuration defaults.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The password, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns `true` if neither field is set.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }

    /// Falls back to the configuration's default credentials when the caller
    /// supplied none.
    pub(crate) fn or_config_defaults(self, config: &ConnectConfig) -> Credentials {
        if self.is_empty() {
            Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
            }
        } else {
            self
        }
    }
}

// Credentials are never logged; Debug keeps the password out of any output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Immutable configuration snapshot for a connection factory.
///
/// Built through [`ConnectConfig::builder`]; every invariant is enforced at
/// build time, so holding a `ConnectConfig` means holding a valid one.
#[derive(Clone)]
pub struct ConnectConfig {
    pub(crate) name: String,
    pub(crate) address_list: String,
    pub(crate) addresses: Vec<BrokerAddress>,
    pub(crate) behavior: AddressListBehavior,
    pub(crate) address_list_iterations: u32,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) client_id: Option<String>,
    pub(crate) reconnect_enabled: bool,
    pub(crate) reconnect_attempts: u32,
    pub(crate) reconnect_interval: Duration,
    pub(crate) options: String,
    pub(crate) event_listeners: EventListeners,
}

impl ConnectConfig {
    /// Creates a new builder.
    pub fn builder() -> ConnectConfigBuilder {
        ConnectConfigBuilder::new()
    }

    /// The factory name used in events, logs, and metrics labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw address-list string this snapshot was parsed from.
    pub fn address_list(&self) -> &str {
        &self.address_list
    }

    /// The parsed endpoint sequence, in configured order.
    pub fn addresses(&self) -> &[BrokerAddress] {
        &self.addresses
    }

    /// The endpoint selection behavior.
    pub fn behavior(&self) -> AddressListBehavior {
        self.behavior
    }

    /// Bound on full passes over the endpoint sequence. Always >= 1.
    pub fn address_list_iterations(&self) -> u32 {
        self.address_list_iterations
    }

    /// Optional client identity, stable across reconnects.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Whether failed attempts are retried on the same endpoint.
    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    /// Extra tries on a failing endpoint before moving to the next one.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Wait between retries on the same endpoint.
    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    /// Opaque protocol-specific options, not interpreted here.
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Rebuilds a builder seeded with this snapshot's values, for
    /// read-modify-write updates.
    pub fn to_builder(&self) -> ConnectConfigBuilder {
        ConnectConfigBuilder {
            name: self.name.clone(),
            address_list: self.address_list.clone(),
            behavior: self.behavior,
            address_list_iterations: self.address_list_iterations,
            username: self.username.clone(),
            password: self.password.clone(),
            client_id: self.client_id.clone(),
            reconnect_enabled: self.reconnect_enabled,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_interval: self.reconnect_interval,
            options: self.options.clone(),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl std::fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("name", &self.name)
            .field("address_list", &self.address_list)
            .field("behavior", &self.behavior)
            .field("address_list_iterations", &self.address_list_iterations)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("reconnect_enabled", &self.reconnect_enabled)
            .field("reconnect_attempts", &self.reconnect_attempts)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("options", &self.options)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`ConnectConfig`].
///
/// `build()` validates everything at once: the address list must parse to at
/// least one endpoint and the iteration bound must be at least 1. Nothing is
/// silently coerced.
pub struct ConnectConfigBuilder {
    name: String,
    address_list: String,
    behavior: AddressListBehavior,
    address_list_iterations: u32,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    reconnect_enabled: bool,
    reconnect_attempts: u32,
    reconnect_interval: Duration,
    options: String,
    event_listeners: EventListeners,
}

impl Default for ConnectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - behavior: `Ordered`
    /// - address_list_iterations: 1
    /// - reconnect_enabled: false
    /// - reconnect_attempts: 0
    /// - reconnect_interval: 3 seconds
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            address_list: String::new(),
            behavior: AddressListBehavior::Ordered,
            address_list_iterations: 1,
            username: None,
            password: None,
            client_id: None,
            reconnect_enabled: false,
            reconnect_attempts: 0,
            reconnect_interval: Duration::from_secs(3),
            options: String::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the factory name (used in events, logs, and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the comma-separated broker address list.
    ///
    /// Parsed and validated at `build()` time.
    pub fn address_list<S: Into<String>>(mut self, address_list: S) -> Self {
        self.address_list = address_list.into();
        self
    }

    /// Sets the endpoint selection behavior.
    pub fn behavior(mut self, behavior: AddressListBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Sets the bound on full passes over the address list. Must be >= 1.
    pub fn address_list_iterations(mut self, iterations: u32) -> Self {
        self.address_list_iterations = iterations;
        self
    }

    /// Sets the default credentials forwarded when a caller supplies none.
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the client identity handed to the broker on every attempt.
    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Enables or disables same-endpoint retries.
    pub fn reconnect_enabled(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = enabled;
        self
    }

    /// Sets the number of extra tries on a failing endpoint.
    pub fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Sets the wait between retries on the same endpoint.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the opaque protocol-specific options string.
    pub fn options<S: Into<String>>(mut self, options: S) -> Self {
        self.options = options.into();
        self
    }

    /// Registers a raw event listener.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: crate::events::EventListener + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback invoked when a retry on the same endpoint is
    /// scheduled, with the endpoint and the delay before the retry.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ConnectEvent::RetryScheduled { address, delay, .. } = event {
                f(address, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when an attempt fails, with the endpoint
    /// and whether the failure is retryable.
    pub fn on_attempt_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ConnectEvent::AttemptFailed {
                address, retryable, ..
            } = event
            {
                f(address, *retryable);
            }
        }));
        self
    }

    /// Registers a callback invoked when a connection is established, with
    /// the bound endpoint and the total number of attempts it took.
    pub fn on_connected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ConnectEvent::Connected {
                address,
                total_attempts,
                ..
            } = event
            {
                f(address, *total_attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when every endpoint in every pass has
    /// failed, with the number of passes made.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let ConnectEvent::Exhausted { passes, .. } = event {
                f(*passes);
            }
        }));
        self
    }

    /// Validates and builds the configuration snapshot.
    pub fn build(self) -> Result<ConnectConfig, ConfigError> {
        if self.address_list_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        let addresses = parse_address_list(&self.address_list)?;

        Ok(ConnectConfig {
            name: self.name,
            address_list: self.address_list,
            addresses,
            behavior: self.behavior,
            address_list_iterations: self.address_list_iterations,
            username: self.username,
            password: self.password,
            client_id: self.client_id,
            reconnect_enabled: self.reconnect_enabled,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_interval: self.reconnect_interval,
            options: self.options,
            event_listeners: self.event_listeners,
        })
    }
}

/// Read-mostly shared handle to a [`ConnectConfig`].
///
/// Many in-flight creation calls read the configuration concurrently; each
/// call takes one snapshot at entry and works from it for its whole attempt
/// sequence. Updates rebuild and revalidate a snapshot under the write lock
/// and swap it in whole.
#[derive(Clone, Debug)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<ConnectConfig>>>,
}

impl SharedConfig {
    /// Wraps an initial configuration.
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Takes the current snapshot.
    pub fn snapshot(&self) -> Arc<ConnectConfig> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replaces the configuration with an already-built snapshot.
    pub fn replace(&self, config: ConnectConfig) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(config);
    }

    /// Applies a read-modify-write update.
    ///
    /// The closure receives a builder seeded from the current snapshot; the
    /// rebuilt configuration is validated before it replaces the old one, so
    /// a failed update leaves the previous snapshot in effect.
    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(ConnectConfigBuilder) -> ConnectConfigBuilder,
    {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let rebuilt = f(guard.to_builder()).build()?;
        *guard = Arc::new(rebuilt);
        Ok(())
    }
}
