//! Parsing of the bridge's device listing.
//!
//! `adb devices` prints one header line followed by one `id<TAB>status` line
//! per attached device:
//!
//! ```text
//! List of devices attached
//! emulator-5554	device
//! 192.168.1.20:5555	offline
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One attached device as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device selector (serial number or `ip:port`).
    pub id: String,
    /// Connection state, e.g. `device`, `offline`, `unauthorized`.
    pub status: String,
}

/// Parses listing output into records, in output order.
///
/// The first line is treated as a header and discarded.  Lines that do not
/// split into at least two tab-separated fields are dropped; duplicates are
/// kept as reported.
pub fn parse_device_list(output: &str) -> Vec<DeviceRecord> {
    output
        .trim()
        .split('\n')
        .skip(1)
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let mut fields = line.split('\t');
            match (fields.next(), fields.next()) {
                (Some(id), Some(status)) => Some(DeviceRecord {
                    id: id.to_string(),
                    status: status.to_string(),
                }),
                _ => {
                    debug!("dropping malformed device listing line: {line:?}");
                    None
                }
            }
        })
        .collect()
}
