//! Broker address-list parsing and endpoint selection order.
//!
//! The address list is a comma-separated sequence of `host:port` locators.
//! Parsing happens eagerly whenever a list string is set, so an invalid list
//! fails at configuration time rather than at the first connection attempt.

use crate::error::ConfigError;
use rand::seq::SliceRandom;
use std::fmt;
use std::str::FromStr;

/// One broker endpoint from the configured address list.
///
/// Immutable once parsed; `position` is the entry's index in the configured
/// list and is kept so failure diagnostics can name the original ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    host: String,
    port: u16,
    position: usize,
}

impl BrokerAddress {
    /// The broker host name or IP.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The broker port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Zero-based position of this entry in the configured list.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses one `host:port` entry.
fn parse_entry(entry: &str, position: usize) -> Result<BrokerAddress, ConfigError> {
    let malformed = || ConfigError::MalformedAddress {
        entry: entry.to_string(),
    };

    let (host, port) = entry.rsplit_once(':').ok_or_else(malformed)?;
    if host.is_empty() {
        return Err(malformed());
    }
    let port: u16 = port.parse().map_err(|_| malformed())?;

    Ok(BrokerAddress {
        host: host.to_string(),
        port,
        position,
    })
}

/// Parses a comma-separated address list into an ordered endpoint sequence.
///
/// Entries are trimmed; blank entries (e.g. a trailing comma) are dropped.
/// Fails with [`ConfigError::EmptyAddressList`] when nothing usable remains
/// and [`ConfigError::MalformedAddress`] for an unparsable entry. Pure and
/// deterministic for a given input string.
///
/// # Examples
///
/// ```
/// use broker_connect::parse_address_list;
///
/// let addresses = parse_address_list("broker1:7676, broker2:7677").unwrap();
/// assert_eq!(addresses.len(), 2);
/// assert_eq!(addresses[0].to_string(), "broker1:7676");
/// assert_eq!(addresses[1].position(), 1);
/// ```
pub fn parse_address_list(list: &str) -> Result<Vec<BrokerAddress>, ConfigError> {
    let mut addresses = Vec::new();

    for entry in list.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        addresses.push(parse_entry(entry, addresses.len())?);
    }

    if addresses.is_empty() {
        return Err(ConfigError::EmptyAddressList);
    }

    Ok(addresses)
}

/// Policy governing endpoint traversal order during failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressListBehavior {
    /// Preserve the configured list order.
    #[default]
    Ordered,

    /// Permute the full list once per pass, so repeated calls spread their
    /// first attempt across endpoints while every pass still touches each
    /// endpoint exactly once.
    Random,
}

impl AddressListBehavior {
    /// Produces the index order for one pass over `addresses`.
    pub(crate) fn pass_order(&self, addresses: &[BrokerAddress]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..addresses.len()).collect();
        if let AddressListBehavior::Random = self {
            order.shuffle(&mut rand::rng());
        }
        order
    }
}

impl FromStr for AddressListBehavior {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ordered") {
            Ok(AddressListBehavior::Ordered)
        } else if s.eq_ignore_ascii_case("random") {
            Ok(AddressListBehavior::Random)
        } else {
            Err(ConfigError::UnknownBehavior {
                value: s.to_string(),
            })
        }
    }
}
