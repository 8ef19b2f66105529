// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Modguard
//!
//! Idempotent state enforcement for MOD-family network security appliances.
//!
//! ## Overview
//!
//! Modguard lets an orchestration layer converge an appliance toward a
//! declared target state:
//!
//! - Enforce free-form CLI configuration from a command specification file
//! - Ensure licenses are loaded, the appliance is registered, pattern
//!   databases are current, and the firmware runs a target build
//! - Verify configuration drift without applying anything
//!
//! ## Architecture
//!
//! Every enforcer follows the same shape:
//!
//! 1. **Probe**: read the current state (command channel or status REST API)
//! 2. **Compare**: against the declarative expectation
//! 3. **Apply**: the corrective command batch when state drifts
//! 4. **Re-verify and retry**: up to a fixed bound before reporting failure
//!
//! Re-running any enforcer against an already-satisfied device is a no-op
//! that still reports success.
//!
//! ## Modules
//!
//! - [`spec`]: Command specifications and node configuration
//! - [`session`]: Session channel contract and scoped acquisition
//! - [`verify`]: Response normalization and drift verification
//! - [`enforce`]: The reconciliation loop and domain enforcers
//! - [`rest`]: Out-of-band appliance status API
//! - [`device`]: Read-only probes and single-command operations
//! - [`state`]: Advisory status markers
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "comment": "This configuration should match DOC-123456",
//!   "config": {
//!     "CLI_CONFIG": [
//!       {"cmd": "syslog [ UPDATE_OK UPDATE_ERROR REBOOT ]", "chk": ""},
//!       {"cmd": "services clam active", "chk": "true"}
//!     ]
//!   }
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod device;
pub mod enforce;
pub mod error;
pub mod rest;
pub mod session;
pub mod spec;
pub mod state;
pub mod verify;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use device::{DeviceProbe, ProbeReply};
pub use enforce::{
    Changes, EnforceOutcome, FirmwareEnforcer, LicenseEnforcer, PatternDbEnforcer, PatternVendor,
    Reconciler, RegistrationEnforcer,
};
pub use error::{ModGuardError, Result};
pub use rest::{RestClient, StatusApi};
pub use session::{ChannelFactory, CommandChannel, HelperChannelFactory, ScopedSession};
pub use spec::{CommandContext, CommandSpec, NodeConfig, SpecParser};
pub use verify::{DriftResult, DriftVerifier};
