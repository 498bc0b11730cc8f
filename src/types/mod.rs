//! Core type definitions.
//!
//! Validated newtypes and parsing for ports and scan targets.

pub mod port;
pub mod target;

pub use port::{Port, PortError, PortRange, PortSpec};
pub use target::{host_count, parse_host, parse_net, TargetError, MAX_NET_HOSTS};
