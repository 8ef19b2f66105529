//! Appliance registration enforcement.
//!
//! The probe issues the registration query on the command channel; the
//! empty-result marker in the response means the appliance inventory has no
//! entries yet, so registration commands must be applied.

use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::{ChannelFactory, ScopedSession};
use crate::spec::{CommandContext, NodeConfig, SpecParser};

use super::apply::apply_spec;
use super::outcome::{Changes, EnforceOutcome};

/// Default bound on registration attempts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Probe command listing registered appliances.
const REGISTRATION_PROBE: &str = "show config appliances";

/// Empty-result marker in the probe response.
const NO_ENTRIES_MARKER: &str = "No entries found";

/// Tagged registration state, produced once at the probe boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// The appliance inventory has entries.
    Registered,
    /// The appliance inventory is empty.
    NotRegistered,
}

/// Enforcer that registers the appliance.
pub struct RegistrationEnforcer<'a, F: ChannelFactory> {
    /// Node connection parameters.
    node: &'a NodeConfig,
    /// Channel factory.
    factory: &'a F,
    /// Specification parser.
    parser: SpecParser,
    /// Maximum registration attempts.
    max_attempts: u32,
}

impl<'a, F: ChannelFactory> RegistrationEnforcer<'a, F> {
    /// Creates a new registration enforcer.
    #[must_use]
    pub const fn new(node: &'a NodeConfig, factory: &'a F) -> Self {
        Self {
            node,
            factory,
            parser: SpecParser::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Probes the current registration state over an open session.
    async fn probe(session: &mut ScopedSession) -> Result<RegistrationState> {
        let response = session
            .exec(REGISTRATION_PROBE, CommandContext::Enable)
            .await?;

        if response.contains(NO_ENTRIES_MARKER) {
            Ok(RegistrationState::NotRegistered)
        } else {
            Ok(RegistrationState::Registered)
        }
    }

    /// Ensures the appliance is registered, applying the specification when
    /// it is not.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel itself cannot be constructed;
    /// every other failure is folded into the outcome.
    pub async fn ensure_registered(
        &self,
        spec_path: &Path,
        dry_run: bool,
    ) -> Result<EnforceOutcome> {
        info!("Checking appliance registration on {}", self.node.mgmt.ip);

        let spec = match self.parser.load_spec(spec_path) {
            Ok(spec) => spec,
            Err(e) => return Ok(EnforceOutcome::failure(e.to_string())),
        };

        let mut session = ScopedSession::open(self.factory, self.node).await?;
        let result = self.enforce(&mut session, &spec, spec_path, dry_run).await;
        session.finish().await;

        Ok(result.unwrap_or_else(|e| {
            warn!("Registration run failed: {e}");
            EnforceOutcome::failure(format!("execution failed due to '{e}'"))
        }))
    }

    /// The probe, apply, re-probe loop over one open session.
    async fn enforce(
        &self,
        session: &mut ScopedSession,
        spec: &crate::spec::CommandSpec,
        spec_path: &Path,
        dry_run: bool,
    ) -> Result<EnforceOutcome> {
        let state = Self::probe(session).await?;
        debug!("Registration probe: {state:?}");

        if state == RegistrationState::Registered {
            return Ok(EnforceOutcome::success("Appliance already registered"));
        }

        if dry_run {
            return Ok(EnforceOutcome::planned(format!(
                "Appliance will be registered from {}",
                spec_path.display()
            )));
        }

        let changes = Changes::single("appliances", Some(NO_ENTRIES_MARKER), "registered");
        let mut comment = String::new();

        for attempt in 1..=self.max_attempts {
            debug!("Registration attempt {attempt}/{}", self.max_attempts);

            let report = apply_spec(session.channel_mut(), spec).await?;

            if report.is_clean() {
                if Self::probe(session).await? == RegistrationState::Registered {
                    return Ok(EnforceOutcome::success("Appliance registered successfully")
                        .with_changes(changes.clone()));
                }
                let _ = write!(
                    comment,
                    "Failed attempt: {attempt}, Result: appliance still not registered. "
                );
            } else {
                let _ = write!(
                    comment,
                    "Failed attempt: {attempt}, Result: {} check mismatch(es). ",
                    report.mismatches.len()
                );
            }
        }

        Ok(EnforceOutcome::failure(comment).with_changes(changes))
    }
}
