//! Client configuration constants.
//!
//! Defaults for [`ClientConfig`](crate::ClientConfig) fields, kept in one
//! place so the config file format and the code agree.

use std::time::Duration;

/// Minimum spacing between outbound `setPath` frames while the user scrubs
/// through moves.
pub const SET_PATH_THROTTLE: Duration = Duration::from_millis(300);

/// Capacity of the session driver's inbound command channel.
pub const EVENT_BUFFER: usize = 256;

/// Capacity of the broadcast channel carrying render notices to observers.
pub const NOTICE_BUFFER: usize = 64;
