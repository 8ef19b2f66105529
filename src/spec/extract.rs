//! Expectation map extraction.
//!
//! Flattens a command specification into `command → expected-value` pairs for
//! the drift verifier. Only contexts on the recognized list contribute, and a
//! later record for the same command text overwrites an earlier one.

use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

use crate::error::{ModGuardError, Result, SpecError};

use super::records::CommandSpec;

/// Mapping from command text to expected value text, in file order.
pub type ExpectationMap = IndexMap<String, String>;

/// Contexts whose records are verifiable through the read path.
pub const VERIFIED_CONTEXTS: &[&str] = &["CLI_CONFIG"];

/// Extracts the expectation map from a specification.
///
/// Records whose `chk` is empty are fire-and-forget and carry no expectation.
/// Duplicate command texts resolve last-write-wins, without error.
///
/// # Errors
///
/// Returns [`SpecError::EmptyCommandSet`] when no usable record exists in any
/// recognized context; an empty map would make every verification trivially
/// pass.
pub fn extract_expectations(
    spec: &CommandSpec,
    recognized_contexts: &[&str],
    source: &Path,
) -> Result<ExpectationMap> {
    let mut expectations = ExpectationMap::new();

    for (context, records) in &spec.config {
        if !recognized_contexts.contains(&context.as_str()) {
            debug!("Skipping unrecognized context: {context}");
            continue;
        }

        for record in records {
            if !record.is_verified() {
                continue;
            }
            expectations.insert(record.cmd.clone(), record.chk.clone());
        }
    }

    if expectations.is_empty() {
        return Err(ModGuardError::Spec(SpecError::EmptyCommandSet {
            path: source.to_path_buf(),
        }));
    }

    debug!("Extracted {} expectations", expectations.len());
    Ok(expectations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::records::CommandRecord;

    fn record(cmd: &str, chk: &str) -> CommandRecord {
        CommandRecord {
            cmd: cmd.into(),
            chk: chk.into(),
        }
    }

    fn spec_with(context: &str, records: Vec<CommandRecord>) -> CommandSpec {
        let mut spec = CommandSpec::default();
        spec.config.insert(context.into(), records);
        spec
    }

    #[test]
    fn extracts_verified_records_only() {
        let spec = spec_with(
            "CLI_CONFIG",
            vec![
                record("alerts destinations email", "RESULT"),
                record("ntp update-now", ""),
                record("services clam active", "true"),
            ],
        );

        let map = extract_expectations(&spec, VERIFIED_CONTEXTS, Path::new("spec.json"))
            .expect("non-empty map");

        assert_eq!(map.len(), 2);
        assert_eq!(map["alerts destinations email"], "RESULT");
        assert_eq!(map["services clam active"], "true");
    }

    #[test]
    fn skips_unrecognized_contexts() {
        let mut spec = spec_with("CLI_CONFIG", vec![record("snmp community", "public")]);
        spec.config
            .insert("ENABLE".into(), vec![record("licenses", "valid")]);

        let map = extract_expectations(&spec, VERIFIED_CONTEXTS, Path::new("spec.json"))
            .expect("non-empty map");

        assert_eq!(map.len(), 1);
        assert!(map.contains_key("snmp community"));
    }

    #[test]
    fn duplicate_command_last_write_wins() {
        let spec = spec_with(
            "CLI_CONFIG",
            vec![
                record("snmp community", "public"),
                record("snmp community", "private"),
            ],
        );

        let map = extract_expectations(&spec, VERIFIED_CONTEXTS, Path::new("spec.json"))
            .expect("non-empty map");

        assert_eq!(map.len(), 1);
        assert_eq!(map["snmp community"], "private");
    }

    #[test]
    fn empty_spec_is_a_hard_failure() {
        let spec = CommandSpec::default();
        let result = extract_expectations(&spec, VERIFIED_CONTEXTS, Path::new("spec.json"));
        assert!(matches!(
            result,
            Err(ModGuardError::Spec(SpecError::EmptyCommandSet { .. }))
        ));
    }

    #[test]
    fn all_fire_and_forget_is_a_hard_failure() {
        let spec = spec_with("CLI_CONFIG", vec![record("ntp update-now", "")]);
        let result = extract_expectations(&spec, VERIFIED_CONTEXTS, Path::new("spec.json"));
        assert!(matches!(
            result,
            Err(ModGuardError::Spec(SpecError::EmptyCommandSet { .. }))
        ));
    }
}
