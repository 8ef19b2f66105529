//! Out-of-band appliance status API.
//!
//! Heavy status commands on the main command channel are known to
//! destabilize the device, so license and image state is read through the
//! appliance's REST interface instead.

pub mod client;
pub mod types;

pub use client::{RestClient, StatusApi};
pub use types::{ImageStatus, LicenseEntry, SysInfo, SystemImage, VersionInfo};
