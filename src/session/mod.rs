//! Session channel to the device.
//!
//! One channel is used at a time; commands are strictly serialized. The
//! channel itself is an external collaborator reached through the
//! [`CommandChannel`] trait, with [`ScopedSession`] guaranteeing teardown on
//! every exit path.

pub mod channel;
pub mod helper;
pub mod scoped;

pub use channel::{ChannelFactory, CommandChannel};
pub use helper::{HelperChannel, HelperChannelFactory};
pub use scoped::ScopedSession;
