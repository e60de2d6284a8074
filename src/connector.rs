//! The protocol-layer seam.
//!
//! The failover machinery never opens sockets itself; it asks a [`Connector`]
//! to open a connection of a given [`ConnectionShape`] against one endpoint
//! with resolved credentials. Injecting this capability keeps the failover
//! loop unit-testable without a broker.

use crate::address::BrokerAddress;
use crate::config::Credentials;
use crate::error::AttemptError;
use futures::future::BoxFuture;

/// The connection flavor requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionShape {
    /// A generic connection.
    Generic,
    /// A queue-scoped (point-to-point) connection.
    Queue,
    /// A topic-scoped (publish-subscribe) connection.
    Topic,
}

impl std::fmt::Display for ConnectionShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionShape::Generic => write!(f, "generic"),
            ConnectionShape::Queue => write!(f, "queue"),
            ConnectionShape::Topic => write!(f, "topic"),
        }
    }
}

/// Protocol-layer capability to open a broker connection.
///
/// Contract for implementors:
/// - a returned `Err` means the attempt left no network resource behind; any
///   partially-opened connection must be released before reporting failure,
/// - the shape, endpoint, credentials, and client identity are forwarded
///   verbatim; this crate never interprets them beyond the
///   retryable/non-retryable split on the error.
pub trait Connector: Send + Sync {
    /// The live connection handle produced on success.
    type Connection: Send + 'static;

    /// Opens a connection of `shape` against `address` with `credentials`.
    ///
    /// `client_id` is the configured client identity, identical on every
    /// attempt of a call so reconnects present a stable identity to the
    /// broker.
    fn connect<'a>(
        &'a self,
        shape: ConnectionShape,
        address: &'a BrokerAddress,
        credentials: &'a Credentials,
        client_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Self::Connection, AttemptError>>;
}

impl<C: Connector + ?Sized> Connector for std::sync::Arc<C> {
    type Connection = C::Connection;

    fn connect<'a>(
        &'a self,
        shape: ConnectionShape,
        address: &'a BrokerAddress,
        credentials: &'a Credentials,
        client_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Self::Connection, AttemptError>> {
        (**self).connect(shape, address, credentials, client_id)
    }
}
