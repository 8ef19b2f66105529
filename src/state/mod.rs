//! Persisted advisory state.
//!
//! The only state this crate persists is a one-line status marker per
//! node and context, overwritten on every run and never used to skip
//! verification.

pub mod marker;

pub use marker::StatusMarker;
