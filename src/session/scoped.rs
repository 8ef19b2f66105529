//! Scoped session acquisition.
//!
//! A [`ScopedSession`] owns a channel for the span of one logical operation:
//! acquired, used for a bounded burst of commands, and released before
//! control returns to the caller. Teardown runs the CLI exit sequence and
//! closes the channel, tolerating and logging failures without re-raising
//! them, so a close-time transport error never masks the primary outcome.

use tracing::{debug, warn};

use crate::error::Result;
use crate::spec::{CommandContext, NodeConfig};

use super::channel::{ChannelFactory, CommandChannel};

/// A channel scoped to a single logical operation.
pub struct ScopedSession {
    /// The owned channel.
    channel: Box<dyn CommandChannel>,
    /// Whether teardown has run.
    released: bool,
}

impl std::fmt::Debug for ScopedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("released", &self.released)
            .finish()
    }
}

impl ScopedSession {
    /// Opens a new session through the given factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be constructed. This is the one
    /// failure that is allowed to propagate to the orchestration layer, since
    /// no enforcement is meaningful without a channel.
    pub async fn open(factory: &dyn ChannelFactory, node: &NodeConfig) -> Result<Self> {
        let channel = factory.open(node).await?;
        debug!("Session opened to {}", node.mgmt.ip);
        Ok(Self {
            channel,
            released: false,
        })
    }

    /// Wraps an already-open channel.
    #[must_use]
    pub fn from_channel(channel: Box<dyn CommandChannel>) -> Self {
        Self {
            channel,
            released: false,
        }
    }

    /// Executes a command on the device in the given context.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    pub async fn exec(&mut self, command: &str, context: CommandContext) -> Result<String> {
        self.channel.exec(command, context).await
    }

    /// Borrows the underlying channel mutably.
    pub fn channel_mut(&mut self) -> &mut dyn CommandChannel {
        self.channel.as_mut()
    }

    /// Releases the session: runs the CLI exit sequence and closes the
    /// channel. Failures during teardown are logged, never re-raised.
    pub async fn finish(mut self) {
        self.release().await;
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        debug!("Closing session channel");
        if let Err(e) = self.channel.exec("", CommandContext::CliExit).await {
            warn!("Session exit sequence failed: {e}");
        }
        if let Err(e) = self.channel.close().await {
            warn!("Session close failed: {e}");
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if !self.released {
            // Async teardown cannot run here; the owner is expected to call
            // finish(). A handle dropped without release is a warning, not a
            // fatal error for subsequent operations.
            warn!("Session dropped without release; channel may be left open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::channel::MockCommandChannel;

    #[tokio::test]
    async fn finish_runs_exit_then_close() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_exec()
            .withf(|cmd, ctx| cmd.is_empty() && *ctx == CommandContext::CliExit)
            .times(1)
            .returning(|_, _| Ok(String::new()));
        channel.expect_close().times(1).returning(|| Ok(()));

        let session = ScopedSession::from_channel(Box::new(channel));
        session.finish().await;
    }

    #[tokio::test]
    async fn finish_swallows_teardown_failures() {
        let mut channel = MockCommandChannel::new();
        channel.expect_exec().times(1).returning(|_, _| {
            Err(crate::error::ModGuardError::Session(
                crate::error::SessionError::exec("", "connection reset"),
            ))
        });
        channel.expect_close().times(1).returning(|| Ok(()));

        let session = ScopedSession::from_channel(Box::new(channel));
        // Must not panic or propagate.
        session.finish().await;
    }
}
