//! Batch application of command specifications.
//!
//! Applies every record in file order within its declared context. A record
//! whose check fails is logged and counted but never aborts the batch: later
//! commands in a batch are frequently independent of earlier ones, so one
//! failed check must not block unrelated configuration from being applied.

use tracing::{debug, error};

use crate::error::{ModGuardError, Result, SpecError};
use crate::session::CommandChannel;
use crate::spec::{CommandContext, CommandSpec};

/// Result of applying a full command batch.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Number of records executed.
    pub executed: usize,
    /// Check-mismatch descriptions, one per failed record.
    pub mismatches: Vec<String>,
}

impl ApplyReport {
    /// Returns true if every checked record matched.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Applies every record of the specification through the channel.
///
/// Contexts are validated up front so a malformed specification fails before
/// any device interaction. A non-empty `chk` is matched case-insensitively
/// against the response; mismatches are collected, not fatal.
///
/// # Errors
///
/// Returns an error on an unknown context name or a transport failure.
pub async fn apply_spec(
    channel: &mut dyn CommandChannel,
    spec: &CommandSpec,
) -> Result<ApplyReport> {
    for context in spec.config.keys() {
        if CommandContext::from_name(context).is_none() {
            return Err(ModGuardError::Spec(SpecError::parse(format!(
                "unknown context '{context}' in specification"
            ))));
        }
    }

    let mut report = ApplyReport::default();

    for (context_name, record) in spec.records() {
        // Validated above.
        let Some(context) = CommandContext::from_name(context_name) else {
            continue;
        };

        debug!("Applying in {context}: {}", record.cmd);
        let response = channel.exec(&record.cmd, context).await?;

        if record.is_verified()
            && !response
                .to_lowercase()
                .contains(&record.chk.to_lowercase())
        {
            let note = format!(
                "'{}' resulted in '{}' and did not match check: '{}'",
                record.cmd,
                response.trim(),
                record.chk
            );
            error!("{note}");
            report.mismatches.push(note);
        }

        report.executed += 1;
    }

    debug!(
        "Applied {} record(s), {} mismatch(es)",
        report.executed,
        report.mismatches.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::session::channel::MockCommandChannel;
    use crate::spec::CommandRecord;

    fn record(cmd: &str, chk: &str) -> CommandRecord {
        CommandRecord {
            cmd: cmd.into(),
            chk: chk.into(),
        }
    }

    #[tokio::test]
    async fn applies_all_records_in_order() {
        let mut spec = CommandSpec::default();
        spec.config.insert(
            "CLI_CONFIG".into(),
            vec![record("services clam active true", ""), record("snmp community public", "")],
        );
        spec.config
            .insert("ENABLE".into(), vec![record("ntp update-now", "")]);

        let expected_order = [
            ("services clam active true", CommandContext::CliConfig),
            ("snmp community public", CommandContext::CliConfig),
            ("ntp update-now", CommandContext::Enable),
        ];

        let mut seq = mockall::Sequence::new();
        let mut channel = MockCommandChannel::new();
        for (cmd, ctx) in expected_order {
            channel
                .expect_exec()
                .withf(move |c, x| c == cmd && *x == ctx)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(String::from("ok")));
        }

        let report = apply_spec(&mut channel, &spec).await.expect("batch applies");
        assert_eq!(report.executed, 3);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn check_mismatch_does_not_abort_the_batch() {
        let mut spec = CommandSpec::default();
        spec.config.insert(
            "CLI_CONFIG".into(),
            vec![
                record("services clam active true", "committed"),
                record("snmp community public", ""),
            ],
        );

        let mut channel = MockCommandChannel::new();
        channel
            .expect_exec()
            .times(2)
            .returning(|_, _| Ok(String::from("error: unexpected")));

        let report = apply_spec(&mut channel, &spec).await.expect("batch applies");
        assert_eq!(report.executed, 2);
        assert_eq!(report.mismatches.len(), 1);
        assert!(report.mismatches[0].contains("services clam active true"));
    }

    #[tokio::test]
    async fn check_matches_case_insensitively() {
        let mut spec = CommandSpec::default();
        spec.config.insert(
            "CLI_CONFIG".into(),
            vec![record("services clam active true", "Committed")],
        );

        let mut channel = MockCommandChannel::new();
        channel
            .expect_exec()
            .times(1)
            .returning(|_, _| Ok(String::from("COMMITTED ok")));

        let report = apply_spec(&mut channel, &spec).await.expect("batch applies");
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn unknown_context_fails_before_any_device_call() {
        let mut spec = CommandSpec::default();
        spec.config
            .insert("BOGUS".into(), vec![record("anything", "")]);

        let mut channel = MockCommandChannel::new();
        channel.expect_exec().times(0);

        let result = apply_spec(&mut channel, &spec).await;
        assert!(matches!(
            result,
            Err(ModGuardError::Spec(SpecError::ParseError { .. }))
        ));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let mut spec = CommandSpec::default();
        spec.config
            .insert("CLI_CONFIG".into(), vec![record("snmp community public", "")]);

        let mut channel = MockCommandChannel::new();
        channel.expect_exec().times(1).returning(|cmd, _| {
            Err(ModGuardError::Session(SessionError::exec(cmd, "broken pipe")))
        });

        let result = apply_spec(&mut channel, &spec).await;
        assert!(matches!(result, Err(ModGuardError::Session(_))));
    }
}
