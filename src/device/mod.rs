//! Read-only device probes and single-command operations.

pub mod probes;

pub use probes::{DeviceProbe, ProbeReply};
