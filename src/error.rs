//! Error taxonomy for connection establishment.
//!
//! Three surfaces reach the caller: [`ConfigError`] for invalid settings
//! (never retried), [`ConnectError`] when the failover loop gives up, and
//! [`ResourceError`] when transactional-resource derivation fails against an
//! otherwise-live connection. Individual attempt failures ([`AttemptError`])
//! are recovered by the failover loop and only surface in aggregate through
//! [`ConnectError`].

/// Invalid configuration value, raised at the offending set/validate call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The address list contained no usable entries.
    #[error("address list is empty")]
    EmptyAddressList,

    /// An address-list entry could not be parsed as `host:port`.
    #[error("malformed broker address: {entry:?}")]
    MalformedAddress {
        /// The offending entry, as written in the list.
        entry: String,
    },

    /// `address_list_iterations` must be at least 1.
    #[error("address list iterations must be at least 1")]
    ZeroIterations,

    /// An address-list behavior string was not recognized.
    #[error("unknown address list behavior: {value:?} (expected \"ordered\" or \"random\")")]
    UnknownBehavior {
        /// The unrecognized value.
        value: String,
    },
}

/// One failed connection attempt, as reported by the protocol layer.
///
/// The failover loop only distinguishes retryable from non-retryable kinds;
/// everything else about the failure is carried verbatim for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// The broker endpoint could not be reached.
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    /// The attempt timed out before the broker answered.
    #[error("connection attempt timed out: {0}")]
    TimedOut(String),

    /// The broker rejected the supplied credentials.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The broker speaks an incompatible protocol version.
    #[error("protocol incompatible: {0}")]
    ProtocolMismatch(String),

    /// Any other broker-reported failure.
    #[error("broker error: {0}")]
    Broker(String),
}

impl AttemptError {
    /// Whether the same endpoint is worth retrying.
    ///
    /// Authentication rejections and protocol mismatches will not resolve by
    /// retrying the same endpoint; a different endpoint may still accept the
    /// request (e.g. a broker running a different version).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttemptError::Unreachable(_) | AttemptError::TimedOut(_) | AttemptError::Broker(_)
        )
    }
}

/// One entry in the recorded failure history of a creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// The endpoint that was attempted, rendered as `host:port`.
    pub address: String,
    /// 1-based pass over the address list.
    pub pass: u32,
    /// 1-based attempt number against this endpoint within the pass.
    pub attempt: u32,
    /// What the protocol layer reported.
    pub cause: AttemptError,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pass {} attempt {} against {}: {}",
            self.pass, self.attempt, self.address, self.cause
        )
    }
}

/// Terminal failure of a connection-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Every endpoint in every configured pass failed.
    Exhausted {
        /// Number of full passes over the address list that were made.
        passes: u32,
        /// Ordered per-attempt failure history.
        failures: Vec<AttemptFailure>,
    },

    /// The caller's cancellation signal was honored at an attempt boundary.
    Cancelled {
        /// Failures recorded before cancellation.
        failures: Vec<AttemptFailure>,
    },
}

impl ConnectError {
    /// The ordered per-attempt failure history recorded before giving up.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            ConnectError::Exhausted { failures, .. } => failures,
            ConnectError::Cancelled { failures } => failures,
        }
    }

    /// Returns `true` if the call was cancelled rather than exhausted.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectError::Cancelled { .. })
    }
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Exhausted { passes, failures } => {
                write!(
                    f,
                    "unable to connect to any broker endpoint after {} pass(es) ({} failed attempt(s))",
                    passes,
                    failures.len()
                )?;
                for failure in failures {
                    write!(f, "\n  {}", failure)?;
                }
                Ok(())
            }
            ConnectError::Cancelled { failures } => {
                write!(
                    f,
                    "connection establishment cancelled after {} failed attempt(s)",
                    failures.len()
                )
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// Transactional-resource derivation failed against a live connection.
///
/// Terminal for the derivation call only; the underlying connection stays
/// usable unless the error says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The connection does not support transactional enlistment.
    #[error("connection does not support transactional enlistment")]
    NotXaCapable,

    /// The connection was already closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The connection is already bound to a different active branch.
    ///
    /// At most one active transaction branch per physical connection.
    #[error("connection already has an active transaction branch")]
    BranchActive,

    /// Any other protocol-layer failure during derivation.
    #[error("transaction branch error: {0}")]
    Protocol(String),
}
