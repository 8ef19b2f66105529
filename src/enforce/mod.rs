//! State enforcement.
//!
//! The generic reconciliation loop and the domain-specific enforcers built on
//! it: verify current device state, apply corrective commands when it drifts
//! from the declared target, re-verify, and retry a bounded number of times
//! before reporting failure.

pub mod apply;
pub mod firmware;
pub mod licenses;
pub mod outcome;
pub mod patterndb;
pub mod reconciler;
pub mod registration;

pub use apply::{apply_spec, ApplyReport};
pub use firmware::FirmwareEnforcer;
pub use licenses::{LicenseEnforcer, LicenseState};
pub use outcome::{Changes, EnforceOutcome};
pub use patterndb::{parse_vendor_list, DownloadState, PatternDbEnforcer, PatternVendor, ALL_VENDORS};
pub use reconciler::Reconciler;
pub use registration::{RegistrationEnforcer, RegistrationState};
