//! # droid-remote-core
//!
//! Shared, I/O-free building blocks for Droid-Remote: the server that lets a
//! browser drive an Android device through the `adb` bridge.
//!
//! This crate has zero dependencies on sockets, processes, or async runtimes.
//! Everything here is a pure function or a plain state machine, so the
//! authorization boundary and the scan bookkeeping can be tested exhaustively
//! without a device attached.
//!
//! - **`command`** – The allow-list of instruction prefixes and the closed set
//!   of [`DeviceCommand`] shapes that may be sent to a device.  This is the
//!   only path by which client input becomes a device shell instruction.
//!
//! - **`keycode`** – The fixed set of Android key events a client may inject.
//!
//! - **`device`** – Parsing of the bridge's `devices` listing into
//!   [`DeviceRecord`]s.
//!
//! - **`scan`** – Subnet range handling and the serial probe tally that
//!   decides when a network scan is complete.

pub mod command;
pub mod device;
pub mod keycode;
pub mod scan;

pub use command::{
    escape_text, is_allowed, CommandError, DeviceCommand, PointerSource, ALLOWED_PREFIXES,
    DEFAULT_SWIPE_DURATION_MS,
};
pub use device::{parse_device_list, DeviceRecord};
pub use keycode::KeyCode;
pub use scan::{RangeError, ScanRange, ScanTally, TallyUpdate, HOSTS_PER_RANGE};
