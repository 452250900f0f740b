//! Subnet ranges and probe bookkeeping for network device discovery.
//!
//! A scan always covers host octets 1..=254 of a `/24`.  The range string a
//! client supplies is CIDR-like (`192.168.1.0/24`), but only the first three
//! octets of the base address are used; the prefix length is accepted for
//! familiarity and otherwise ignored.  This is an approximation of the real
//! netmask, not a netmask-aware computation.

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Number of host addresses probed per range (`.1` through `.254`).
pub const HOSTS_PER_RANGE: u32 = 254;

/// Errors from parsing a client-supplied range string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The part before `/` is not a dotted-quad IPv4 address.
    #[error("invalid base address: {0}")]
    InvalidAddress(String),

    /// The part after `/` is not a prefix length in 0..=32.
    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
}

/// A `/24` network identified by its first three octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanRange {
    network: [u8; 3],
}

impl ScanRange {
    /// Parses `a.b.c.d` or `a.b.c.d/n`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError`] if the address or prefix length is malformed.
    pub fn parse(range: &str) -> Result<Self, RangeError> {
        let range = range.trim();
        let (base, prefix) = match range.split_once('/') {
            Some((base, prefix)) => (base, Some(prefix)),
            None => (range, None),
        };

        if let Some(prefix) = prefix {
            match prefix.parse::<u8>() {
                Ok(n) if n <= 32 => {}
                _ => return Err(RangeError::InvalidPrefix(prefix.to_string())),
            }
        }

        let addr: Ipv4Addr = base
            .parse()
            .map_err(|_| RangeError::InvalidAddress(base.to_string()))?;
        Ok(Self::from_interface(addr))
    }

    /// The `/24` containing `addr`, i.e. `addr` with its last octet dropped.
    pub fn from_interface(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Self { network: [a, b, c] }
    }

    /// Host addresses `.1` through `.254`, in ascending order.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        let [a, b, c] = self.network;
        (1..=HOSTS_PER_RANGE as u8).map(move |d| Ipv4Addr::new(a, b, c, d))
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.network;
        write!(f, "{a}.{b}.{c}.0/24")
    }
}

/// Progress after one probe has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyUpdate {
    /// `round(completed / total * 100)`.
    pub progress: u8,
    /// `true` on exactly one update: the one where `completed == total`.
    pub complete: bool,
}

/// Serial tally of resolved probes for one scan.
///
/// The tally is owned by a single aggregating task; probes report into it one
/// at a time, so each resolution increments the counter exactly once and the
/// completion update is produced exactly once.
#[derive(Debug)]
pub struct ScanTally {
    total: u32,
    completed: u32,
    found: Vec<String>,
}

impl ScanTally {
    /// Creates a tally expecting `total` probe resolutions.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: 0,
            found: Vec::new(),
        }
    }

    /// Records one resolved probe; `open` is the `ip:port` of an open port.
    pub fn record(&mut self, open: Option<String>) -> TallyUpdate {
        self.completed += 1;
        if let Some(target) = open {
            self.found.push(target);
        }

        let progress = if self.total == 0 {
            100
        } else {
            let pct = (f64::from(self.completed) / f64::from(self.total) * 100.0).round();
            pct.min(100.0) as u8
        };

        TallyUpdate {
            progress,
            complete: self.completed == self.total,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Open targets in the order their probes resolved.
    pub fn found(&self) -> &[String] {
        &self.found
    }

    pub fn into_found(self) -> Vec<String> {
        self.found
    }
}
