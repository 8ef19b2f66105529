//! Generic reconciliation loop.
//!
//! Verify the device against a command specification; when drift is found,
//! apply the full command batch, re-verify, and retry up to a fixed bound.
//! Re-running against an already-satisfied device is a no-op that still
//! reports success.

use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::{ChannelFactory, ScopedSession};
use crate::spec::{
    extract_expectations, CommandSpec, ExpectationMap, NodeConfig, SpecParser, VERIFIED_CONTEXTS,
};
use crate::verify::DriftVerifier;

use super::apply::apply_spec;
use super::outcome::{Changes, EnforceOutcome};

/// Default bound on apply-and-reverify attempts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Reconciler for free-form device configuration.
pub struct Reconciler<'a, F: ChannelFactory> {
    /// Node connection parameters.
    node: &'a NodeConfig,
    /// Channel factory.
    factory: &'a F,
    /// Specification parser.
    parser: SpecParser,
    /// Drift verifier.
    verifier: DriftVerifier,
    /// Maximum reconciliation attempts.
    max_attempts: u32,
}

impl<'a, F: ChannelFactory> Reconciler<'a, F> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(node: &'a NodeConfig, factory: &'a F) -> Self {
        Self {
            node,
            factory,
            parser: SpecParser::new(),
            verifier: DriftVerifier::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the maximum reconciliation attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Enforces the specification on the device.
    ///
    /// In dry-run mode only the verification pass runs and the outcome's
    /// `result` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel itself cannot be constructed;
    /// every other failure is folded into the outcome.
    pub async fn ensure_configured(
        &self,
        spec_path: &Path,
        dry_run: bool,
    ) -> Result<EnforceOutcome> {
        info!(
            "Enforcing configuration from {} on {}",
            spec_path.display(),
            self.node.mgmt.ip
        );

        let (spec, expectations) = match self.load(spec_path) {
            Ok(loaded) => loaded,
            Err(e) => return Ok(EnforceOutcome::failure(e.to_string())),
        };

        let mut session = ScopedSession::open(self.factory, self.node).await?;
        let result = self
            .reconcile(&mut session, &spec, &expectations, spec_path, dry_run)
            .await;
        session.finish().await;

        Ok(result.unwrap_or_else(|e| {
            warn!("Enforcement run failed: {e}");
            EnforceOutcome::failure(format!("execution failed due to '{e}'"))
        }))
    }

    /// Runs the verification pass only, never applying anything.
    ///
    /// Unlike dry-run enforcement this is a probe: the outcome's `result`
    /// reports whether the device currently matches the specification.
    ///
    /// # Errors
    ///
    /// Returns an error only if the channel itself cannot be constructed.
    pub async fn verify_only(&self, spec_path: &Path) -> Result<EnforceOutcome> {
        let (_, expectations) = match self.load(spec_path) {
            Ok(loaded) => loaded,
            Err(e) => return Ok(EnforceOutcome::failure(e.to_string())),
        };

        let mut session = ScopedSession::open(self.factory, self.node).await?;
        let result = self
            .verifier
            .verify(session.channel_mut(), &expectations)
            .await;
        session.finish().await;

        Ok(match result {
            Ok(drift) if drift.is_converged() => {
                EnforceOutcome::success("No drift detected - device matches the specification")
            }
            Ok(drift) => {
                EnforceOutcome::failure(format!("Drift detected for {} command(s)", drift.len()))
                    .with_changes(Changes::from_drift(&drift))
            }
            Err(e) => EnforceOutcome::failure(format!("execution failed due to '{e}'")),
        })
    }

    /// Loads the specification and extracts its expectation map.
    fn load(&self, spec_path: &Path) -> Result<(CommandSpec, ExpectationMap)> {
        let spec = self.parser.load_spec(spec_path)?;
        let expectations = extract_expectations(&spec, VERIFIED_CONTEXTS, spec_path)?;
        Ok((spec, expectations))
    }

    /// The verify, apply, re-verify loop over one open session.
    async fn reconcile(
        &self,
        session: &mut ScopedSession,
        spec: &CommandSpec,
        expectations: &ExpectationMap,
        spec_path: &Path,
        dry_run: bool,
    ) -> Result<EnforceOutcome> {
        let drift = self
            .verifier
            .verify(session.channel_mut(), expectations)
            .await?;

        if drift.is_converged() {
            info!("No changes required - device already matches the specification");
            return Ok(EnforceOutcome::success(
                "Device already configured, no changes needed",
            ));
        }

        if dry_run {
            return Ok(EnforceOutcome::planned(format!(
                "Device will be configured from {}",
                spec_path.display()
            ))
            .with_changes(Changes::from_drift(&drift)));
        }

        // The first verification's old/new pair is what the caller sees; the
        // new side keeps the values from the specification file even after a
        // successful apply.
        let changes = Changes::from_drift(&drift);
        let mut comment = String::new();

        for attempt in 1..=self.max_attempts {
            debug!("Reconciliation attempt {attempt}/{}", self.max_attempts);

            let report = apply_spec(session.channel_mut(), spec).await?;

            if report.is_clean() {
                let remaining = self
                    .verifier
                    .verify(session.channel_mut(), expectations)
                    .await?;
                if remaining.is_converged() {
                    info!("Device converged after attempt {attempt}");
                    return Ok(EnforceOutcome::success("Device configured successfully")
                        .with_changes(changes.clone()));
                }
                let _ = write!(
                    comment,
                    "Failed attempt: {attempt}, Result: drift remains for {} command(s). ",
                    remaining.len()
                );
            } else {
                let _ = write!(
                    comment,
                    "Failed attempt: {attempt}, Result: {} check mismatch(es). ",
                    report.mismatches.len()
                );
            }
        }

        warn!(
            "{}",
            crate::error::EnforceError::MaxRetriesExceeded {
                attempts: self.max_attempts,
                operation: format!("configure from {}", spec_path.display()),
            }
        );
        Ok(EnforceOutcome::failure(comment).with_changes(changes))
    }
}
