//! Resilient broker connection establishment for messaging clients.
//!
//! Given a client identity, credentials, and a list of candidate broker
//! endpoints, this crate produces a live, correctly-shaped connection while
//! tolerating individual endpoint failures. The protocol layer, connection
//! pooling, and transport security live behind narrow seams ([`Connector`],
//! [`XaConnector`]) and are not provided here.
//!
//! # Features
//!
//! - **Address-list failover**: ordered or randomized traversal of the
//!   endpoint list, bounded by a configurable number of full passes
//! - **Reconnect policy**: per-endpoint retry bound and retry interval,
//!   with authentication rejections never retried
//! - **Three connection shapes**: generic, queue-scoped, and topic-scoped
//!   creation behind one uniform contract
//! - **Transactional resources**: derive a transaction-branch handle from an
//!   established connection
//! - **Atomic configuration snapshots**: runtime updates swap a
//!   fully-validated configuration in as a unit
//! - **Event system**: observability through connection events, plus
//!   optional `tracing` and `metrics` integration
//!
//! # Examples
//!
//! ```rust
//! use broker_connect::{AddressListBehavior, ConnectConfig};
//! use std::time::Duration;
//!
//! let config = ConnectConfig::builder()
//!     .name("orders")
//!     .address_list("broker1:7676,broker2:7676")
//!     .behavior(AddressListBehavior::Random)
//!     .address_list_iterations(3)
//!     .reconnect_enabled(true)
//!     .reconnect_attempts(2)
//!     .reconnect_interval(Duration::from_millis(500))
//!     .on_retry(|address, delay| {
//!         println!("retrying {} after {:?}", address, delay);
//!     })
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.addresses().len(), 2);
//! ```
//!
//! A [`ConnectionCreator`] pairs such a configuration with a [`Connector`]
//! implementation supplied by the protocol layer:
//!
//! ```rust,ignore
//! let creator = ConnectionCreator::new(protocol_connector, config);
//! let connection = creator.create_queue_connection(Credentials::anonymous()).await?;
//! let resource = creator.create_transactional_resource(wrapper, &connection).await?;
//! ```

mod address;
mod config;
mod connector;
mod creator;
mod error;
mod events;
mod xa;

pub use address::{parse_address_list, AddressListBehavior, BrokerAddress};
pub use config::{ConnectConfig, ConnectConfigBuilder, Credentials, SharedConfig};
pub use connector::{ConnectionShape, Connector};
pub use creator::{CancelToken, ConnectionCreator};
pub use error::{AttemptError, AttemptFailure, ConfigError, ConnectError, ResourceError};
pub use events::{ConnectEvent, EventListener, EventListeners, FnListener};
pub use xa::{TransactionalResource, XaConnector};
