//! Drift verifier.
//!
//! For each command in the expectation map, fetches the live value through
//! the session channel, normalizes both sides, and accumulates a structured
//! old/new diff for every command whose actual value disagrees with the
//! expectation.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::session::CommandChannel;
use crate::spec::{CommandContext, ExpectationMap};

use super::normalize::{normalize_actual, normalize_expected};

/// Prefix for the read path: expectations are probed through the device's
/// configuration show command.
const READ_PREFIX: &str = "show config";

/// Structured drift between live values and expectations.
///
/// `old` holds the normalized actual value and `new` the normalized expected
/// value, keyed by command text, present only for commands that disagree.
/// The two maps always have identical key sets.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DriftResult {
    /// Normalized actual values for drifted commands.
    pub old: IndexMap<String, String>,
    /// Normalized expected values for drifted commands.
    pub new: IndexMap<String, String>,
}

impl DriftResult {
    /// Returns true if the device already satisfies every expectation.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.old.is_empty()
    }

    /// Returns the number of drifted commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.old.len()
    }

    /// Returns true if no command drifted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }
}

impl std::fmt::Display for DriftResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_converged() {
            return write!(f, "No drift detected - device matches the specification");
        }
        writeln!(f, "Drift detected:")?;
        for (cmd, old) in &self.old {
            let new = self.new.get(cmd).map_or("", String::as_str);
            writeln!(f, "  {cmd}: '{old}' (expected '{new}')")?;
        }
        Ok(())
    }
}

/// Engine that compares live device values against an expectation map.
#[derive(Debug)]
pub struct DriftVerifier {
    /// Context the read path executes in.
    read_context: CommandContext,
}

impl Default for DriftVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DriftVerifier {
    /// Creates a new verifier reading in the default enable context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_context: CommandContext::Enable,
        }
    }

    /// Verifies every expectation against the device.
    ///
    /// # Errors
    ///
    /// Returns an error if any command cannot be issued; a single unreachable
    /// command invalidates the whole pass, because partial state is not
    /// trustworthy for reconciliation decisions.
    pub async fn verify(
        &self,
        channel: &mut dyn CommandChannel,
        expectations: &ExpectationMap,
    ) -> Result<DriftResult> {
        let mut drift = DriftResult::default();

        for (cmd, expected) in expectations {
            let new_val = normalize_expected(expected);

            let raw = channel
                .exec(&format!("{READ_PREFIX} {cmd}"), self.read_context)
                .await?;
            let old_val = normalize_actual(&raw, cmd);

            if old_val == new_val {
                continue;
            }

            // The expected value may be embedded in output that echoes the
            // command or carries neighbouring fields; if every token of the
            // expectation appears somewhere in the actual value, that is not
            // drift.
            let missing_token = new_val.split(' ').any(|token| !old_val.contains(token));
            if !missing_token {
                debug!("'{cmd}' differs only in formatting, not drifted");
                continue;
            }

            // Known fragility: if the command text recurs inside the response
            // the fragment starts at the first occurrence, which may cut the
            // value short. Kept as-is; falls back to the full value when the
            // command text does not occur at all.
            let fragment = old_val
                .splitn(2, cmd.as_str())
                .nth(1)
                .map_or(old_val.as_str(), str::trim);

            drift.old.insert(cmd.clone(), fragment.to_string());
            drift.new.insert(cmd.clone(), new_val);
        }

        debug!("Verification found {} drifted command(s)", drift.len());
        Ok(drift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModGuardError, SessionError};
    use crate::session::channel::MockCommandChannel;
    use crate::spec::ExpectationMap;

    fn expectations(pairs: &[(&str, &str)]) -> ExpectationMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn channel_with(responses: Vec<(&'static str, &'static str)>) -> MockCommandChannel {
        let mut channel = MockCommandChannel::new();
        for (probe, reply) in responses {
            channel
                .expect_exec()
                .withf(move |cmd, _| cmd == probe)
                .times(1)
                .returning(move |_, _| Ok(reply.to_string()));
        }
        channel
    }

    #[tokio::test]
    async fn equal_values_are_converged() {
        let mut channel = channel_with(vec![(
            "show config services clam active",
            "services clam active true",
        )]);
        let map = expectations(&[("services clam active", "services/clam/active true")]);

        let drift = DriftVerifier::new()
            .verify(&mut channel, &map)
            .await
            .expect("verification runs");

        assert!(drift.is_converged());
    }

    #[tokio::test]
    async fn all_tokens_present_is_not_drift() {
        let mut channel = channel_with(vec![("show config show foo", "show foo: bar baz 7")]);
        let map = expectations(&[("show foo", "bar baz")]);

        let drift = DriftVerifier::new()
            .verify(&mut channel, &map)
            .await
            .expect("verification runs");

        assert!(drift.is_converged());
    }

    #[tokio::test]
    async fn missing_token_records_drift_with_trailing_fragment() {
        let mut channel = channel_with(vec![("show config show foo", "show foo: bar baz 7")]);
        let map = expectations(&[("show foo", "bar qux")]);

        let drift = DriftVerifier::new()
            .verify(&mut channel, &map)
            .await
            .expect("verification runs");

        assert_eq!(drift.len(), 1);
        assert_eq!(drift.new["show foo"], "bar qux");
        assert_eq!(drift.old["show foo"], ": bar baz 7");
    }

    #[tokio::test]
    async fn old_and_new_share_key_sets() {
        let mut channel = channel_with(vec![
            ("show config snmp community", "snmp community public"),
            ("show config alerts enabled", "alerts enabled false"),
        ]);
        let map = expectations(&[
            ("snmp community", "private"),
            ("alerts enabled", "true"),
        ]);

        let drift = DriftVerifier::new()
            .verify(&mut channel, &map)
            .await
            .expect("verification runs");

        let old_keys: Vec<&String> = drift.old.keys().collect();
        let new_keys: Vec<&String> = drift.new.keys().collect();
        assert_eq!(old_keys, new_keys);
        assert_eq!(drift.len(), 2);
    }

    #[tokio::test]
    async fn syntax_error_response_drifts_with_canonical_value() {
        let mut channel = channel_with(vec![(
            "show config alerts destinations email",
            "% syntax error: unknown element",
        )]);
        let map = expectations(&[("alerts destinations email", "RESULT")]);

        let drift = DriftVerifier::new()
            .verify(&mut channel, &map)
            .await
            .expect("verification runs");

        assert_eq!(drift.len(), 1);
        assert_eq!(drift.old["alerts destinations email"], "Element does not exist");
    }

    #[tokio::test]
    async fn transport_error_aborts_the_whole_pass() {
        let mut channel = MockCommandChannel::new();
        channel.expect_exec().times(1).returning(|_, _| {
            Err(ModGuardError::Session(SessionError::exec(
                "show config snmp community",
                "connection reset",
            )))
        });
        let map = expectations(&[("snmp community", "public"), ("alerts enabled", "true")]);

        let result = DriftVerifier::new().verify(&mut channel, &map).await;
        assert!(result.is_err());
    }
}
