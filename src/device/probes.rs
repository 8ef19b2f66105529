//! Device probes.
//!
//! Each probe opens a scoped session, runs one command, and releases the
//! channel before returning. These are read-only except for `set`,
//! `set_hostname`, and `restart`, which are single-command operations with
//! no reconciliation loop around them.

use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::{ChannelFactory, ScopedSession};
use crate::spec::{CommandContext, NodeConfig};

/// Default settle time after a device restart.
const DEFAULT_RESTART_SETTLE: Duration = Duration::from_secs(40);

/// Reply from a single probe or command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeReply {
    /// Device output, possibly reduced to the relevant error line.
    pub message: String,
    /// Whether the probe considers the reply good.
    pub ok: bool,
}

/// Probe set over one node.
pub struct DeviceProbe<'a, F: ChannelFactory> {
    /// Node connection parameters.
    node: &'a NodeConfig,
    /// Channel factory.
    factory: &'a F,
}

impl<'a, F: ChannelFactory> DeviceProbe<'a, F> {
    /// Creates a probe set for the given node.
    #[must_use]
    pub const fn new(node: &'a NodeConfig, factory: &'a F) -> Self {
        Self { node, factory }
    }

    /// Runs one command over a fresh scoped session.
    async fn run(&self, command: &str, context: CommandContext) -> Result<String> {
        let mut session = ScopedSession::open(self.factory, self.node).await?;
        let result = session.exec(command, context).await;
        session.finish().await;
        result
    }

    /// Checks reachability by pinging the management address from the device.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn ping(&self) -> Result<ProbeReply> {
        let ip = &self.node.mgmt.ip;
        let message = self
            .run(&format!("ping repeat 1 {ip}"), CommandContext::Enable)
            .await?;

        let good = format!("108 bytes from {ip}:");
        let ok = message.contains(&good);
        debug!("ping result ok: {ok}");

        Ok(ProbeReply { message, ok })
    }

    /// Retrieves the version banner and checks the channel is really talking
    /// to an appliance.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn show_version(&self) -> Result<ProbeReply> {
        let message = self.run("show version", CommandContext::Cli).await?;
        let ok = message.replace('\n', " ").contains("Serial number");
        Ok(ProbeReply { message, ok })
    }

    /// Looks up the management interface address from the running config.
    ///
    /// Returns `"N/A"` when no address line is present.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn mgmt_ip(&self) -> Result<String> {
        let message = self
            .run("show running-config ip-address", CommandContext::Cli)
            .await?;

        // Expected shape:
        //   interface 1:0
        //    ip-address 172.27.178.85 255.255.255.0
        //   !
        for line in message.lines() {
            if line.contains("ip-address") {
                if let Some(ip) = line.trim_start().split(' ').nth(1) {
                    return Ok(ip.to_string());
                }
            }
        }

        debug!("ip-address not found, result: {message}");
        Ok(String::from("N/A"))
    }

    /// Runs a `show` command and reduces known failure shapes to their error
    /// line.
    ///
    /// Plain commands are prefixed with `show config`; the license listing
    /// uses bare `show`.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn get(&self, show_command: &str) -> Result<ProbeReply> {
        let cmd = if show_command == "licenses" {
            format!("show {show_command}")
        } else {
            format!("show config {show_command}")
        };
        debug!("get: {cmd}");

        let message = self.run(&cmd, CommandContext::Enable).await?;
        let mut lines = message.lines();
        let first_line = lines.next().unwrap_or("");

        // License failures arrive as:
        //   %  failed
        //   %  ErrorCode : -14203
        //   %  ErrorMessage : license is not installed
        if show_command == "licenses" {
            if first_line.contains("failed") {
                let error_msg = message
                    .lines()
                    .nth(2)
                    .and_then(|line| line.split(':').nth(1))
                    .unwrap_or("")
                    .trim()
                    .to_string();
                debug!("licenses cmd failed: {error_msg}");
                return Ok(ProbeReply {
                    message: error_msg,
                    ok: false,
                });
            }
            return Ok(ProbeReply { message, ok: true });
        }

        if first_line.contains("-----") {
            let error_msg = message.lines().nth(1).unwrap_or("").to_string();
            debug!("cmd failed: {error_msg}");
            return Ok(ProbeReply {
                message: error_msg,
                ok: false,
            });
        }

        Ok(ProbeReply { message, ok: true })
    }

    /// Runs one configuration command with an optional case-insensitive
    /// check against the response.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn set(&self, config_command: &str, check: &str) -> Result<ProbeReply> {
        let message = self.run(config_command, CommandContext::CliConfig).await?;

        if !check.is_empty() && !message.to_lowercase().contains(&check.to_lowercase()) {
            let mismatch = format!(
                "'{config_command}' resulted in '{}' and did not match check: '{check}'",
                message.trim()
            );
            debug!("mismatch: {mismatch}");
            return Ok(ProbeReply {
                message: mismatch,
                ok: false,
            });
        }

        Ok(ProbeReply { message, ok: true })
    }

    /// Sets the appliance name.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn set_hostname(&self, hostname: &str) -> Result<ProbeReply> {
        let message = self
            .run(
                &format!("appliance-name {hostname}"),
                CommandContext::CliConfig,
            )
            .await?;
        Ok(ProbeReply { message, ok: true })
    }

    /// Restarts the device and waits for it to settle.
    ///
    /// # Errors
    ///
    /// Returns an error on channel construction or transport failure.
    pub async fn restart(&self, settle: Option<Duration>) -> Result<ProbeReply> {
        let message = self.run("restart", CommandContext::Enable).await?;

        let settle = settle.unwrap_or(DEFAULT_RESTART_SETTLE);
        info!("Device restarting, sleeping {}s", settle.as_secs());
        tokio::time::sleep(settle).await;

        Ok(ProbeReply { message, ok: true })
    }
}
