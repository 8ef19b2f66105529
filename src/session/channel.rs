//! Command channel trait definitions.
//!
//! These traits are the seam between the enforcement engine and the transport
//! that actually speaks the device's text dialect. Enforcers receive a factory
//! and open one channel per logical operation; tests inject fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::spec::{CommandContext, NodeConfig};

/// A stateful command channel to a single device.
///
/// Implementations must execute commands one at a time; callers never issue
/// concurrent commands against the same channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send {
    /// Executes a command on the device in the given context and returns the
    /// raw text response.
    async fn exec(&mut self, command: &str, context: CommandContext) -> Result<String>;

    /// Closes the channel. Idempotent, best-effort.
    async fn close(&mut self) -> Result<()>;
}

/// Factory that opens command channels from node connection parameters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Opens a new channel to the node's device.
    async fn open(&self, node: &NodeConfig) -> Result<Box<dyn CommandChannel>>;
}
