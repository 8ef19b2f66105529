//! Transport bridge through an external helper program.
//!
//! The device's text dialect lives in a site-provided helper program; this
//! channel invokes it once per command and returns its standard output. The
//! helper receives the target host, user, and context on the command line and
//! the console password through the environment, so credentials never appear
//! in a process listing.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{ModGuardError, Result, SessionError};
use crate::spec::{CommandContext, NodeConfig};

use super::channel::{ChannelFactory, CommandChannel};

/// Environment variable carrying the console password to the helper.
const HELPER_PASSWORD_VAR: &str = "MODGUARD_HELPER_PASSWORD";

/// Channel that delegates each command to an external helper program.
#[derive(Debug)]
pub struct HelperChannel {
    /// Path to the helper program.
    program: PathBuf,
    /// Target host.
    host: String,
    /// Login user name.
    user: String,
    /// Console password, passed via the environment.
    password: String,
}

impl HelperChannel {
    /// Creates a channel for the given helper program and node.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, node: &NodeConfig) -> Self {
        Self {
            program: program.into(),
            host: node.mgmt.ip.clone(),
            user: node.deploy.user_name.clone(),
            password: node.deploy.console_password.clone(),
        }
    }
}

#[async_trait]
impl CommandChannel for HelperChannel {
    async fn exec(&mut self, command: &str, context: CommandContext) -> Result<String> {
        trace!("Helper exec in {context}: {command}");

        let output = Command::new(&self.program)
            .arg("--host")
            .arg(&self.host)
            .arg("--user")
            .arg(&self.user)
            .arg("--context")
            .arg(context.name())
            .arg(command)
            .env(HELPER_PASSWORD_VAR, &self.password)
            .output()
            .await
            .map_err(|e| {
                ModGuardError::Session(SessionError::exec(
                    command,
                    format!("failed to spawn helper {}: {e}", self.program.display()),
                ))
            })?;

        if !output.status.success() {
            return Err(ModGuardError::Session(SessionError::HelperFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn close(&mut self) -> Result<()> {
        // One helper invocation per command; there is no long-lived process
        // to tear down.
        debug!("Helper channel closed");
        Ok(())
    }
}

/// Factory that opens [`HelperChannel`]s from node configuration.
#[derive(Debug, Default)]
pub struct HelperChannelFactory;

impl HelperChannelFactory {
    /// Creates a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelFactory for HelperChannelFactory {
    async fn open(&self, node: &NodeConfig) -> Result<Box<dyn CommandChannel>> {
        let helper = node.transport.helper.as_ref().ok_or_else(|| {
            ModGuardError::Session(SessionError::NoTransport {
                component: node.node.component.clone(),
            })
        })?;

        Ok(Box::new(HelperChannel::new(helper, node)))
    }
}
