//! Connection string parsing
//!
//! A connection string names one symbol on one device:
//!
//! ```text
//! <host>[:<port>]/[@<poll_rate>/]<symbol>
//! ```
//!
//! where `<host>` is one of
//! - an IPv4 address (`10.0.0.5`), the AMS Net ID is derived by appending `.1.1`
//! - an AMS Net ID ending in `.1.1` (`10.0.0.5.1.1`), the IP address is the Net ID without that suffix
//! - `<net_id>@<ip>`, both taken verbatim
//!
//! Without a poll segment the symbol is delivered through device notifications.

use crate::error::{AdsError, AdsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default ADS port of the first PLC runtime
pub const DEFAULT_ADS_PORT: u16 = 851;

/// Suffix shared by AMS Net IDs derived from an IP address
pub const AMS_NET_ID_SUFFIX: &str = ".1.1";

/// Parsed connection string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAddress {
    /// IP address used to reach the device
    pub ip_address: String,
    /// Host segment as written in the connection string
    pub host: String,
    /// AMS Net ID of the device (always six dotted octets)
    pub ams_net_id: String,
    /// ADS port
    pub port: u16,
    /// Poll period in seconds; `None` selects push notifications
    pub poll_rate: Option<f64>,
    /// Symbol path, e.g. `MAIN.counter`
    pub symbol: String,
    /// Whether values are delivered by device notifications
    pub use_push: bool,
}

impl TargetAddress {
    /// Identity of the device this address points at
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.ip_address, &self.ams_net_id, self.port)
    }

    /// Poll period as a `Duration`, `None` in push mode
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_rate
            .and_then(|rate| Duration::try_from_secs_f64(rate).ok())
    }
}

impl FromStr for TargetAddress {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
    }
}

/// Parse a connection string into a [`TargetAddress`]
///
/// # Errors
///
/// Returns [`AdsError::Address`] when the host is neither a 4-octet IP address,
/// a 6-octet Net ID ending in `.1.1`, nor `net_id@ip`; when the port or poll rate
/// is not numeric; or when no symbol is given.
pub fn parse_address(addr: &str) -> AdsResult<TargetAddress> {
    let (host_info, remainder) = addr.split_once('/').unwrap_or((addr, ""));

    let (host, port) = match host_info.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                AdsError::Address(format!("Invalid port {:?} in {:?}", port, addr))
            })?;
            (host, port)
        }
        None => (host_info, DEFAULT_ADS_PORT),
    };

    let (ams_net_id, ip_address) = if let Some((net_id, ip)) = host.split_once('@') {
        (net_id.to_string(), ip.to_string())
    } else {
        match host.matches('.').count() {
            3 => (format!("{}{}", host, AMS_NET_ID_SUFFIX), host.to_string()),
            5 => {
                let ip = host.strip_suffix(AMS_NET_ID_SUFFIX).ok_or_else(|| {
                    AdsError::Address(format!(
                        "Cannot assume IP address without an AMS Net ID that ends with {}: {:?}",
                        AMS_NET_ID_SUFFIX, host
                    ))
                })?;
                (host.to_string(), ip.to_string())
            }
            _ => {
                return Err(AdsError::Address(format!(
                    "Cannot parse host string: {:?}",
                    host
                )));
            }
        }
    };

    let (poll_rate, symbol) = match remainder.strip_prefix('@').and_then(|r| r.split_once('/')) {
        Some((poll, symbol)) => (Some(parse_poll_rate(poll)?), symbol),
        None => (None, remainder),
    };

    if symbol.is_empty() {
        return Err(AdsError::Address(format!("No symbol given in {:?}", addr)));
    }

    Ok(TargetAddress {
        ip_address,
        host: host.to_string(),
        ams_net_id,
        port,
        poll_rate,
        symbol: symbol.to_string(),
        use_push: poll_rate.is_none(),
    })
}

fn parse_poll_rate(poll: &str) -> AdsResult<f64> {
    let rate = poll
        .trim()
        .parse::<f64>()
        .map_err(|_| AdsError::Address(format!("Invalid poll rate: {:?}", poll)))?;
    if Duration::try_from_secs_f64(rate).is_err() {
        return Err(AdsError::Address(format!(
            "Poll rate must be a non-negative number of seconds: {:?}",
            poll
        )));
    }
    Ok(rate)
}

/// Identity of a physical controller: network address, AMS Net ID and port
///
/// Used to share one transport and one worker thread between every logical
/// connection to the same device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub ip_address: String,
    pub ams_net_id: String,
    pub port: u16,
}

impl DeviceIdentity {
    pub fn new(ip_address: &str, ams_net_id: &str, port: u16) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            ams_net_id: ams_net_id.to_string(),
            port,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.ip_address, self.ams_net_id, self.port)
    }
}
