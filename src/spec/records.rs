//! Command specification types.
//!
//! These structs map to the on-disk JSON specification file: a top-level
//! `config` key holding an ordered mapping from context name to a list of
//! command records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named execution mode a command must run in on the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandContext {
    /// The base CLI prompt.
    Cli,
    /// Privileged enable mode.
    Enable,
    /// Configuration mode.
    CliConfig,
    /// The exit sequence that leaves the CLI cleanly.
    CliExit,
}

impl CommandContext {
    /// Returns the context name as it appears in specification files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cli => "CLI",
            Self::Enable => "ENABLE",
            Self::CliConfig => "CLI_CONFIG",
            Self::CliExit => "CLI_EXIT",
        }
    }

    /// Looks up a context by its specification-file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CLI" => Some(Self::Cli),
            "ENABLE" => Some(Self::Enable),
            "CLI_CONFIG" => Some(Self::CliConfig),
            "CLI_EXIT" => Some(Self::CliExit),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single command record within a context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandRecord {
    /// The command to execute.
    pub cmd: String,
    /// Expected fragment of the response. Empty means "apply, do not verify".
    #[serde(default)]
    pub chk: String,
}

impl CommandRecord {
    /// Returns true if this record carries a verification fragment.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        !self.chk.is_empty()
    }
}

/// The root command specification structure.
///
/// Context order and record order within each context follow the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CommandSpec {
    /// Free-form comment carried by the file, typically a document reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Ordered mapping from context name to its command records.
    pub config: IndexMap<String, Vec<CommandRecord>>,
}

impl CommandSpec {
    /// Returns the total number of command records across all contexts.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.config.values().map(Vec::len).sum()
    }

    /// Returns true if the specification holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    /// Iterates `(context-name, record)` pairs in file order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &CommandRecord)> {
        self.config
            .iter()
            .flat_map(|(ctx, records)| records.iter().map(move |r| (ctx.as_str(), r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_names_round_trip() {
        for ctx in [
            CommandContext::Cli,
            CommandContext::Enable,
            CommandContext::CliConfig,
            CommandContext::CliExit,
        ] {
            assert_eq!(CommandContext::from_name(ctx.name()), Some(ctx));
        }
        assert_eq!(CommandContext::from_name("BOGUS"), None);
    }

    #[test]
    fn records_iterate_in_file_order() {
        let json = r#"
{
  "config": {
    "CLI_CONFIG": [
      {"cmd": "alerts destinations snmp [ ]", "chk": ""},
      {"cmd": "services clam active", "chk": "true"}
    ],
    "ENABLE": [
      {"cmd": "ntp update-now", "chk": ""}
    ]
  }
}
"#;
        let spec: CommandSpec = serde_json::from_str(json).expect("valid spec");
        let order: Vec<(&str, &str)> = spec
            .records()
            .map(|(ctx, r)| (ctx, r.cmd.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("CLI_CONFIG", "alerts destinations snmp [ ]"),
                ("CLI_CONFIG", "services clam active"),
                ("ENABLE", "ntp update-now"),
            ]
        );
        assert_eq!(spec.total_records(), 3);
        assert!(!spec.is_empty());
    }

    #[test]
    fn missing_chk_defaults_to_empty() {
        let json = r#"{"config": {"ENABLE": [{"cmd": "restart"}]}}"#;
        let spec: CommandSpec = serde_json::from_str(json).expect("valid spec");
        let (_, record) = spec.records().next().expect("one record");
        assert!(!record.is_verified());
    }
}
