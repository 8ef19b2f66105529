//! License enforcement.
//!
//! The probe goes through the out-of-band REST interface: issuing heavy
//! status commands on the main command channel is known to destabilize the
//! device. Before the first corrective load the enforcer persists a `false`
//! marker, so a concurrent or subsequent run can detect "load was in
//! progress" rather than re-reading stale success.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::rest::StatusApi;
use crate::session::{ChannelFactory, ScopedSession};
use crate::spec::{NodeConfig, SpecParser};
use crate::state::StatusMarker;

use super::apply::apply_spec;
use super::outcome::{Changes, EnforceOutcome};

/// Default bound on load attempts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between load attempts. Rapid succession of license loads
/// may cause instability on the device.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Marker kind for license status files.
const MARKER_KIND: &str = "lic";

/// Tagged license state, produced once at the probe boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    /// At least one valid license is present.
    Loaded,
    /// Licenses are installed but none is valid.
    NotLoaded,
    /// No license is installed at all.
    NotInstalled,
}

impl LicenseState {
    /// Returns true if the device needs no corrective load.
    #[must_use]
    pub const fn is_satisfied(self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// Enforcer that loads licenses onto the device.
pub struct LicenseEnforcer<'a, F: ChannelFactory> {
    /// Node connection parameters.
    node: &'a NodeConfig,
    /// Channel factory for the corrective load.
    factory: &'a F,
    /// Out-of-band status API for the probe.
    status: &'a dyn StatusApi,
    /// Advisory status marker.
    marker: StatusMarker,
    /// Specification parser.
    parser: SpecParser,
    /// Maximum load attempts.
    max_attempts: u32,
    /// Pause between load attempts.
    retry_delay: Duration,
}

impl<'a, F: ChannelFactory> LicenseEnforcer<'a, F> {
    /// Creates a new license enforcer.
    #[must_use]
    pub fn new(node: &'a NodeConfig, factory: &'a F, status: &'a dyn StatusApi) -> Self {
        Self {
            node,
            factory,
            status,
            marker: StatusMarker::new(node, MARKER_KIND),
            parser: SpecParser::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Overrides the status marker location.
    #[must_use]
    pub fn with_marker(mut self, marker: StatusMarker) -> Self {
        self.marker = marker;
        self
    }

    /// Overrides the pause between load attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Probes the current license state.
    ///
    /// # Errors
    ///
    /// Returns an error if the status API is unreachable.
    pub async fn probe(&self) -> Result<LicenseState> {
        self.status.login().await?;
        let info = self.status.sys_info().await?;

        if info.licenses.is_empty() {
            return Ok(LicenseState::NotInstalled);
        }
        if info.licenses.iter().any(|entry| entry.valid) {
            return Ok(LicenseState::Loaded);
        }
        Ok(LicenseState::NotLoaded)
    }

    /// Ensures licenses are loaded, applying the specification when they are
    /// not.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel itself cannot be constructed;
    /// every other failure is folded into the outcome.
    pub async fn ensure_loaded(&self, spec_path: &Path, dry_run: bool) -> Result<EnforceOutcome> {
        info!("Checking licenses on {}", self.node.mgmt.ip);

        let spec = match self.parser.load_spec(spec_path) {
            Ok(spec) => spec,
            Err(e) => return Ok(EnforceOutcome::failure(e.to_string())),
        };

        let state = match self.probe().await {
            Ok(state) => state,
            Err(e) => {
                return Ok(EnforceOutcome::failure(format!(
                    "execution failed retrieving license state: '{e}'"
                )))
            }
        };
        debug!("License probe: {state:?}");

        if state.is_satisfied() {
            if !dry_run {
                if let Err(e) = self.marker.write(true).await {
                    warn!("Failed to write license status marker: {e}");
                }
            }
            return Ok(EnforceOutcome::success("Licenses already loaded"));
        }

        if dry_run {
            return Ok(EnforceOutcome::planned(format!(
                "Licenses will be loaded from {}",
                spec_path.display()
            )));
        }

        // Persist "not loaded" before the corrective load starts.
        if let Err(e) = self.marker.write(false).await {
            warn!("Failed to write license status marker: {e}");
        }

        let changes = Changes::single("licenses", None, "valid");
        let mut comment = String::new();

        for attempt in 1..=self.max_attempts {
            debug!("License load attempt {attempt}/{}", self.max_attempts);

            let session = ScopedSession::open(self.factory, self.node).await?;
            let applied = self.apply_once(session, &spec).await;

            tokio::time::sleep(self.retry_delay).await;

            match applied {
                Ok(()) => match self.probe().await {
                    Ok(LicenseState::Loaded) => {
                        if let Err(e) = self.marker.write(true).await {
                            warn!("Failed to write license status marker: {e}");
                        }
                        return Ok(EnforceOutcome::success("Licenses loaded successfully")
                            .with_changes(changes.clone()));
                    }
                    Ok(state) => {
                        let _ = write!(
                            comment,
                            "Failed attempt: {attempt}, Result: licenses still {state:?}. "
                        );
                    }
                    Err(e) => {
                        let _ = write!(comment, "Failed attempt: {attempt}, Result: {e}. ");
                    }
                },
                Err(e) => {
                    let _ = write!(comment, "Failed attempt: {attempt}, Result: {e}. ");
                }
            }
        }

        Ok(EnforceOutcome::failure(comment).with_changes(changes))
    }

    /// Applies the load specification over one scoped session.
    async fn apply_once(
        &self,
        mut session: ScopedSession,
        spec: &crate::spec::CommandSpec,
    ) -> Result<()> {
        let result = apply_spec(session.channel_mut(), spec).await;
        session.finish().await;

        let report = result?;
        if report.is_clean() {
            Ok(())
        } else {
            Err(crate::error::ModGuardError::internal(format!(
                "{} check mismatch(es) during license load",
                report.mismatches.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::client::MockStatusApi;
    use crate::rest::types::{LicenseEntry, SysInfo};
    use crate::session::channel::{MockChannelFactory, MockCommandChannel};
    use std::io::Write as _;
    use tempfile::{NamedTempFile, TempDir};

    const LICENSE_SPEC: &str = r#"
{
  "config": {
    "CLI_CONFIG": [
      {"cmd": "licenses load local", "chk": ""}
    ]
  }
}
"#;

    fn node() -> NodeConfig {
        use crate::spec::{DeployCredentials, MgmtConfig, NodeIdentity, RestConfig, TransportConfig};
        NodeConfig {
            node: NodeIdentity {
                component: "mod1".into(),
                pod: "dp2".into(),
            },
            mgmt: MgmtConfig {
                ip: "10.0.0.5".into(),
            },
            deploy: DeployCredentials {
                user_name: "super".into(),
                console_password: "console".into(),
                enable_password: "enable".into(),
            },
            rest: RestConfig::default(),
            transport: TransportConfig::default(),
        }
    }

    fn spec_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(LICENSE_SPEC.as_bytes()).expect("write spec");
        file
    }

    fn sys_info(valid: bool) -> SysInfo {
        SysInfo {
            licenses: vec![LicenseEntry {
                vendor: "BASE".into(),
                valid,
                days_remaining: if valid { 200 } else { 0 },
            }],
        }
    }

    fn loadable_channel() -> MockCommandChannel {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_exec()
            .withf(|cmd, _| cmd == "licenses load local")
            .times(1)
            .returning(|_, _| Ok(String::from("ok")));
        channel
            .expect_exec()
            .withf(|cmd, _| cmd.is_empty())
            .times(1)
            .returning(|_, _| Ok(String::new()));
        channel.expect_close().times(1).returning(|| Ok(()));
        channel
    }

    #[tokio::test]
    async fn already_loaded_is_a_reported_noop() {
        let file = spec_file();
        let temp = TempDir::new().expect("temp dir");
        let config = node();

        let mut status = MockStatusApi::new();
        status.expect_login().times(1).returning(|| Ok(()));
        status
            .expect_sys_info()
            .times(1)
            .returning(|| Ok(sys_info(true)));

        let mut factory = MockChannelFactory::new();
        factory.expect_open().times(0);

        let marker = StatusMarker::with_dir(temp.path(), &config, "lic");
        let enforcer = LicenseEnforcer::new(&config, &factory, &status)
            .with_marker(marker.clone())
            .with_retry_delay(Duration::ZERO);

        let outcome = enforcer
            .ensure_loaded(file.path(), false)
            .await
            .expect("no channel needed");

        assert_eq!(outcome.result, Some(true));
        assert_eq!(outcome.comment, "Licenses already loaded");
        assert_eq!(marker.read().await, Some(true));
    }

    #[tokio::test]
    async fn loads_licenses_in_one_attempt() {
        let file = spec_file();
        let temp = TempDir::new().expect("temp dir");
        let config = node();

        let mut status = MockStatusApi::new();
        status.expect_login().times(2).returning(|| Ok(()));
        let mut probes = 0_u32;
        status.expect_sys_info().times(2).returning(move || {
            probes += 1;
            Ok(sys_info(probes > 1))
        });

        let mut factory = MockChannelFactory::new();
        let mut slot = Some(loadable_channel());
        factory
            .expect_open()
            .times(1)
            .returning(move |_| Ok(Box::new(slot.take().expect("single open"))));

        let marker = StatusMarker::with_dir(temp.path(), &config, "lic");
        let enforcer = LicenseEnforcer::new(&config, &factory, &status)
            .with_marker(marker.clone())
            .with_retry_delay(Duration::ZERO);

        let outcome = enforcer
            .ensure_loaded(file.path(), false)
            .await
            .expect("channel opens");

        assert_eq!(outcome.result, Some(true));
        assert_eq!(outcome.comment, "Licenses loaded successfully");
        assert_eq!(marker.read().await, Some(true));
    }

    #[tokio::test]
    async fn marker_records_false_before_the_load_runs() {
        let file = spec_file();
        let temp = TempDir::new().expect("temp dir");
        let config = node();

        let mut status = MockStatusApi::new();
        status.expect_login().returning(|| Ok(()));
        status
            .expect_sys_info()
            .returning(|| Ok(sys_info(false)));

        // The channel factory refuses, so the load never happens; the marker
        // must still say false.
        let mut factory = MockChannelFactory::new();
        factory.expect_open().times(1).returning(|_| {
            Err(crate::error::ModGuardError::Session(
                crate::error::SessionError::OpenFailed {
                    host: "10.0.0.5".into(),
                    message: "unreachable".into(),
                },
            ))
        });

        let marker = StatusMarker::with_dir(temp.path(), &config, "lic");
        let enforcer = LicenseEnforcer::new(&config, &factory, &status)
            .with_marker(marker.clone())
            .with_retry_delay(Duration::ZERO);

        let result = enforcer.ensure_loaded(file.path(), false).await;

        // Channel construction failures propagate.
        assert!(result.is_err());
        assert_eq!(marker.read().await, Some(false));
    }

    #[tokio::test]
    async fn never_loading_exhausts_attempts_with_notes() {
        let file = spec_file();
        let temp = TempDir::new().expect("temp dir");
        let config = node();

        let mut status = MockStatusApi::new();
        status.expect_login().returning(|| Ok(()));
        status
            .expect_sys_info()
            .times(4)
            .returning(|| Ok(sys_info(false)));

        let mut factory = MockChannelFactory::new();
        let mut channels = vec![loadable_channel(), loadable_channel(), loadable_channel()];
        factory
            .expect_open()
            .times(3)
            .returning(move |_| Ok(Box::new(channels.remove(0))));

        let marker = StatusMarker::with_dir(temp.path(), &config, "lic");
        let enforcer = LicenseEnforcer::new(&config, &factory, &status)
            .with_marker(marker)
            .with_retry_delay(Duration::ZERO);

        let outcome = enforcer
            .ensure_loaded(file.path(), false)
            .await
            .expect("channel opens");

        assert_eq!(outcome.result, Some(false));
        assert_eq!(outcome.comment.matches("Failed attempt").count(), 3);
    }

    #[tokio::test]
    async fn dry_run_reports_pending_load() {
        let file = spec_file();
        let temp = TempDir::new().expect("temp dir");
        let config = node();

        let mut status = MockStatusApi::new();
        status.expect_login().times(1).returning(|| Ok(()));
        status
            .expect_sys_info()
            .times(1)
            .returning(|| Ok(sys_info(false)));

        let mut factory = MockChannelFactory::new();
        factory.expect_open().times(0);

        let marker = StatusMarker::with_dir(temp.path(), &config, "lic");
        let enforcer = LicenseEnforcer::new(&config, &factory, &status).with_marker(marker.clone());

        let outcome = enforcer
            .ensure_loaded(file.path(), true)
            .await
            .expect("no channel needed");

        assert_eq!(outcome.result, None);
        assert!(outcome.comment.contains("will be loaded"));
        // Dry run leaves no marker behind.
        assert_eq!(marker.read().await, None);
    }
}
