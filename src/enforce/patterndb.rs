//! Pattern-database enforcement.
//!
//! Pattern databases are per-vendor: download state is probed on the command
//! channel, expiry through the out-of-band license listing. Vendor names are
//! validated against a fixed allow-list before any device interaction; an
//! unrecognized name is a caller error, not a device error.

use std::fmt::Write as _;
use tracing::{debug, error, info, warn};

use crate::error::{ModGuardError, Result, SpecError};
use crate::rest::StatusApi;
use crate::session::{ChannelFactory, ScopedSession};
use crate::spec::{CommandContext, NodeConfig};
use crate::state::StatusMarker;

use super::outcome::EnforceOutcome;

/// Marker kind for database status files.
const MARKER_KIND: &str = "db";

/// Empty-result marker in probe responses.
const NO_ENTRIES_MARKER: &str = "No entries found";

/// A pattern-database vendor on the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternVendor {
    /// The base signature database.
    Base,
    /// The ClamAV signature database.
    Clam,
}

/// Every allow-listed vendor.
pub const ALL_VENDORS: &[PatternVendor] = &[PatternVendor::Base, PatternVendor::Clam];

impl PatternVendor {
    /// Returns the vendor name as the license listing spells it.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::Clam => "CLAM",
        }
    }

    /// Returns the vendor token used in CLI service commands.
    #[must_use]
    pub const fn service(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Clam => "clam",
        }
    }

    /// Returns true if a license entry belongs to this vendor.
    #[must_use]
    pub fn matches(self, entry_vendor: &str) -> bool {
        entry_vendor.eq_ignore_ascii_case(self.name())
    }
}

impl std::fmt::Display for PatternVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PatternVendor {
    type Err = ModGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BASE" => Ok(Self::Base),
            "CLAM" => Ok(Self::Clam),
            _ => Err(ModGuardError::Spec(SpecError::UnknownVendor {
                name: s.to_string(),
                allowed: String::from("BASE, CLAM, ALL"),
            })),
        }
    }
}

/// Parses a vendor name list, expanding `ALL` to the full allow-list.
///
/// # Errors
///
/// Returns [`SpecError::UnknownVendor`] for any name off the allow-list.
pub fn parse_vendor_list(names: &[String]) -> Result<Vec<PatternVendor>> {
    let mut vendors = Vec::new();

    for name in names {
        if name.eq_ignore_ascii_case("all") {
            return Ok(ALL_VENDORS.to_vec());
        }
        vendors.push(name.parse()?);
    }

    if vendors.is_empty() {
        return Err(ModGuardError::Spec(SpecError::UnknownVendor {
            name: String::from("<none>"),
            allowed: String::from("BASE, CLAM, ALL"),
        }));
    }

    Ok(vendors)
}

/// Tagged download state, produced once at the probe boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// A database download is in progress.
    Downloading,
    /// No download is in progress.
    Idle,
    /// The status output matched no known marker.
    Unknown,
}

/// Enforcer for pattern-database download and freshness state.
pub struct PatternDbEnforcer<'a, F: ChannelFactory> {
    /// Node connection parameters.
    node: &'a NodeConfig,
    /// Channel factory for download probes.
    factory: &'a F,
    /// Out-of-band status API for the expiry check.
    status: &'a dyn StatusApi,
    /// Advisory status marker.
    marker: StatusMarker,
}

impl<'a, F: ChannelFactory> PatternDbEnforcer<'a, F> {
    /// Creates a new pattern-database enforcer.
    #[must_use]
    pub fn new(node: &'a NodeConfig, factory: &'a F, status: &'a dyn StatusApi) -> Self {
        Self {
            node,
            factory,
            status,
            marker: StatusMarker::new(node, MARKER_KIND),
        }
    }

    /// Overrides the status marker location.
    #[must_use]
    pub fn with_marker(mut self, marker: StatusMarker) -> Self {
        self.marker = marker;
        self
    }

    /// Checks whether the vendor's database has been downloaded.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel itself cannot be constructed.
    pub async fn ensure_downloaded(&self, vendor: PatternVendor) -> Result<EnforceOutcome> {
        info!("Checking {vendor} database download on {}", self.node.mgmt.ip);

        let cmd = format!("show services {} status", vendor.service());
        let service_ok = format!("services {} status", vendor.service());

        let mut session = ScopedSession::open(self.factory, self.node).await?;
        let result = session.exec(&cmd, CommandContext::Enable).await;
        session.finish().await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return Ok(EnforceOutcome::failure(format!(
                    "execution failed due to '{e}'"
                )))
            }
        };

        if response.contains(NO_ENTRIES_MARKER) {
            return Ok(EnforceOutcome::failure(response.trim().to_string()));
        }
        if response.contains(&service_ok) {
            return Ok(EnforceOutcome::success(response.trim().to_string()));
        }

        error!("'{cmd}' resulted in '{}' and did not match known checks", response.trim());
        Ok(EnforceOutcome::failure(format!(
            "'{cmd}' did not match known checks"
        )))
    }

    /// Probes whether a database download is actively in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be constructed or the probe
    /// command fails.
    pub async fn downloading(&self, vendor: PatternVendor) -> Result<DownloadState> {
        let cmd = format!("show services {} status", vendor.service());

        let mut session = ScopedSession::open(self.factory, self.node).await?;
        let result = session.exec(&cmd, CommandContext::Enable).await;
        session.finish().await;

        let response = result?;
        let state = if response.contains("downloading true") {
            DownloadState::Downloading
        } else if response.contains("downloading false") {
            DownloadState::Idle
        } else {
            warn!("'{cmd}' resulted in '{}' and did not match known checks", response.trim());
            DownloadState::Unknown
        };

        debug!("{vendor} download state: {state:?}");
        Ok(state)
    }

    /// Checks that every requested vendor's database is valid and will not
    /// expire within the given number of days.
    ///
    /// A "not valid" entry is always unsatisfied regardless of threshold.
    /// The final boolean is persisted to the advisory status marker.
    ///
    /// # Errors
    ///
    /// Never returns an error; all failures fold into the outcome.
    pub async fn ensure_not_expiring(
        &self,
        vendors: &[PatternVendor],
        days_from_now: i64,
    ) -> Result<EnforceOutcome> {
        info!(
            "Checking database expiry for {vendors:?} (threshold {days_from_now} days) on {}",
            self.node.mgmt.ip
        );

        if let Err(e) = self.status.login().await {
            return Ok(EnforceOutcome::failure(format!(
                "execution failed authenticating against the status API: '{e}'"
            )));
        }

        let info = match self.status.sys_info().await {
            Ok(info) => info,
            Err(e) => {
                return Ok(EnforceOutcome::failure(format!(
                    "execution failed retrieving the license listing, is the device fully booted? '{e}'"
                )))
            }
        };

        let mut result: Option<bool> = None;
        let mut message = String::new();

        for entry in &info.licenses {
            let Some(vendor) = vendors.iter().find(|v| v.matches(&entry.vendor)) else {
                continue;
            };

            let _ = write!(message, "\nVendor: {}", entry.vendor);
            if entry.valid {
                if entry.days_remaining > days_from_now {
                    let _ = write!(
                        message,
                        " Database \"{vendor}\" days_remaining is: {}, which is greater than {days_from_now} days from now",
                        entry.days_remaining
                    );
                    if result.is_none() {
                        result = Some(true);
                    }
                } else {
                    let _ = write!(
                        message,
                        " WARNING DATABASE \"{vendor}\" LICENSE WILL EXPIRE WITHIN {days_from_now} DAYS"
                    );
                    result = Some(false);
                }
            } else {
                let _ = write!(message, " Not Valid");
                result = Some(false);
            }
        }

        let satisfied = result == Some(true);
        if let Err(e) = self.marker.write(satisfied).await {
            warn!("Failed to write database status marker: {e}");
        }

        match result {
            Some(true) => Ok(EnforceOutcome::success(message.trim_start().to_string())),
            Some(false) => Ok(EnforceOutcome::failure(message.trim_start().to_string())),
            None => Ok(EnforceOutcome::failure(format!(
                "No license entry found for requested vendor(s) {vendors:?}"
            ))),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::client::MockStatusApi;
    use crate::rest::types::{LicenseEntry, SysInfo};
    use crate::session::channel::{MockChannelFactory, MockCommandChannel};
    use tempfile::TempDir;

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

    fn entry(vendor: &str, valid: bool, days: i64) -> LicenseEntry {
        LicenseEntry {
            vendor: vendor.into(),
            valid,
            days_remaining: days,
        }
    }

    fn status_with(licenses: Vec<LicenseEntry>) -> MockStatusApi {
        let mut status = MockStatusApi::new();
        status.expect_login().times(1).returning(|| Ok(()));
        status
            .expect_sys_info()
            .times(1)
            .returning(move || Ok(SysInfo { licenses: licenses.clone() }));
        status
    }

    fn probe_channel(response: &'static str) -> MockCommandChannel {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_exec()
            .withf(|cmd, ctx| cmd.starts_with("show services") && *ctx == CommandContext::Enable)
            .times(1)
            .returning(move |_, _| Ok(response.to_string()));
        channel
            .expect_exec()
            .withf(|_, ctx| *ctx == CommandContext::CliExit)
            .times(1)
            .returning(|_, _| Ok(String::new()));
        channel.expect_close().times(1).returning(|| Ok(()));
        channel
    }

    fn factory_with(channel: MockCommandChannel) -> MockChannelFactory {
        let mut factory = MockChannelFactory::new();
        let mut slot = Some(channel);
        factory
            .expect_open()
            .times(1)
            .returning(move |_| Ok(Box::new(slot.take().expect("single open"))));
        factory
    }

    fn idle_factory() -> MockChannelFactory {
        let mut factory = MockChannelFactory::new();
        factory.expect_open().times(0);
        factory
    }

    #[test]
    fn vendor_list_parses_known_names() {
        let vendors = parse_vendor_list(&["BASE".into(), "clam".into()]).expect("valid vendors");
        assert_eq!(vendors, vec![PatternVendor::Base, PatternVendor::Clam]);
    }

    #[test]
    fn vendor_list_expands_all() {
        let vendors = parse_vendor_list(&["ALL".into()]).expect("valid vendors");
        assert_eq!(vendors, ALL_VENDORS.to_vec());
    }

    #[test]
    fn unknown_vendor_is_a_caller_error() {
        let result = parse_vendor_list(&["ACME".into()]);
        assert!(matches!(
            result,
            Err(ModGuardError::Spec(SpecError::UnknownVendor { .. }))
        ));
    }

    #[tokio::test]
    async fn fresh_database_is_satisfied() {
        let temp = TempDir::new().expect("temp dir");
        let config = node();
        let status = status_with(vec![entry("BASE", true, 120)]);
        let factory = idle_factory();

        let marker = StatusMarker::with_dir(temp.path(), &config, "db");
        let enforcer =
            PatternDbEnforcer::new(&config, &factory, &status).with_marker(marker.clone());

        let outcome = enforcer
            .ensure_not_expiring(&[PatternVendor::Base], 90)
            .await
            .expect("runs");

        assert_eq!(outcome.result, Some(true));
        assert!(outcome.comment.contains("days_remaining is: 120"));
        assert_eq!(marker.read().await, Some(true));
    }

    #[tokio::test]
    async fn expiring_database_is_unsatisfied() {
        let temp = TempDir::new().expect("temp dir");
        let config = node();
        let status = status_with(vec![entry("BASE", true, 30)]);
        let factory = idle_factory();

        let marker = StatusMarker::with_dir(temp.path(), &config, "db");
        let enforcer =
            PatternDbEnforcer::new(&config, &factory, &status).with_marker(marker.clone());

        let outcome = enforcer
            .ensure_not_expiring(&[PatternVendor::Base], 90)
            .await
            .expect("runs");

        assert_eq!(outcome.result, Some(false));
        assert!(outcome.comment.contains("WILL EXPIRE WITHIN 90 DAYS"));
        assert_eq!(marker.read().await, Some(false));
    }

    #[tokio::test]
    async fn invalid_database_is_unsatisfied_regardless_of_threshold() {
        let temp = TempDir::new().expect("temp dir");
        let config = node();
        let status = status_with(vec![entry("CLAM", false, 9999)]);
        let factory = idle_factory();

        let marker = StatusMarker::with_dir(temp.path(), &config, "db");
        let enforcer = PatternDbEnforcer::new(&config, &factory, &status).with_marker(marker);

        let outcome = enforcer
            .ensure_not_expiring(&[PatternVendor::Clam], 0)
            .await
            .expect("runs");

        assert_eq!(outcome.result, Some(false));
        assert!(outcome.comment.contains("Not Valid"));
    }

    #[tokio::test]
    async fn one_expiring_vendor_fails_the_whole_set() {
        let temp = TempDir::new().expect("temp dir");
        let config = node();
        let status = status_with(vec![entry("BASE", true, 200), entry("CLAM", true, 10)]);
        let factory = idle_factory();

        let marker = StatusMarker::with_dir(temp.path(), &config, "db");
        let enforcer = PatternDbEnforcer::new(&config, &factory, &status).with_marker(marker);

        let outcome = enforcer
            .ensure_not_expiring(ALL_VENDORS, 90)
            .await
            .expect("runs");

        assert_eq!(outcome.result, Some(false));
    }

    #[tokio::test]
    async fn missing_license_entry_is_a_failure() {
        let temp = TempDir::new().expect("temp dir");
        let config = node();
        let status = status_with(vec![entry("BASE", true, 200)]);
        let factory = idle_factory();

        let marker = StatusMarker::with_dir(temp.path(), &config, "db");
        let enforcer = PatternDbEnforcer::new(&config, &factory, &status).with_marker(marker);

        let outcome = enforcer
            .ensure_not_expiring(&[PatternVendor::Clam], 0)
            .await
            .expect("runs");

        assert_eq!(outcome.result, Some(false));
        assert!(outcome.comment.contains("No license entry found"));
    }

    #[tokio::test]
    async fn downloaded_database_reports_success() {
        let config = node();
        let status = MockStatusApi::new();
        let factory = factory_with(probe_channel(
            "services clam status pattern-status pattern-date 2017-10-23T00:00:00-00:00",
        ));

        let enforcer = PatternDbEnforcer::new(&config, &factory, &status);
        let outcome = enforcer
            .ensure_downloaded(PatternVendor::Clam)
            .await
            .expect("channel opens");

        assert_eq!(outcome.result, Some(true));
        assert!(outcome.comment.contains("services clam status"));
    }

    #[tokio::test]
    async fn missing_database_reports_failure() {
        let config = node();
        let status = MockStatusApi::new();
        let factory = factory_with(probe_channel("No entries found."));

        let enforcer = PatternDbEnforcer::new(&config, &factory, &status);
        let outcome = enforcer
            .ensure_downloaded(PatternVendor::Base)
            .await
            .expect("channel opens");

        assert_eq!(outcome.result, Some(false));
    }

    #[tokio::test]
    async fn download_probe_maps_both_states() {
        let config = node();
        let status = MockStatusApi::new();

        let factory = factory_with(probe_channel(
            "services clam status downloading true last-checked 2020-01-01",
        ));
        let enforcer = PatternDbEnforcer::new(&config, &factory, &status);
        assert_eq!(
            enforcer.downloading(PatternVendor::Clam).await.expect("probe runs"),
            DownloadState::Downloading
        );

        let factory = factory_with(probe_channel(
            "services clam status downloading false last-checked 2020-01-01",
        ));
        let enforcer = PatternDbEnforcer::new(&config, &factory, &status);
        assert_eq!(
            enforcer.downloading(PatternVendor::Clam).await.expect("probe runs"),
            DownloadState::Idle
        );
    }
}
