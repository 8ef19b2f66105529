//! Enforcement outcome types.
//!
//! Every public enforcement entry point returns an [`EnforceOutcome`]; errors
//! are converted into it at the boundary rather than leaking to the
//! orchestration layer.

use indexmap::IndexMap;
use serde::Serialize;

use crate::verify::DriftResult;

/// Old/new value pairs recorded for an enforcement run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Changes {
    /// Values observed on the device before enforcement, keyed by command.
    pub old: Option<IndexMap<String, String>>,
    /// Values declared by the specification, keyed by command.
    pub new: Option<IndexMap<String, String>>,
}

impl Changes {
    /// Changes with neither side recorded.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            old: None,
            new: None,
        }
    }

    /// Builds changes from a drift result.
    #[must_use]
    pub fn from_drift(drift: &DriftResult) -> Self {
        Self {
            old: Some(drift.old.clone()),
            new: Some(drift.new.clone()),
        }
    }

    /// Builds changes with a single old/new pair under the given key.
    #[must_use]
    pub fn single(key: &str, old: Option<&str>, new: &str) -> Self {
        Self {
            old: old.map(|v| IndexMap::from([(key.to_string(), v.to_string())])),
            new: Some(IndexMap::from([(key.to_string(), new.to_string())])),
        }
    }

    /// Returns true if neither side is recorded.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.old.is_none() && self.new.is_none()
    }
}

/// Result of one enforcement invocation.
///
/// `result` is `Some(true)` on success, `Some(false)` on failure, and `None`
/// in dry-run mode when state would change but nothing was applied.
#[derive(Debug, Serialize)]
pub struct EnforceOutcome {
    /// Overall result.
    pub result: Option<bool>,
    /// Human-readable trail of the run, including per-attempt notes.
    pub comment: String,
    /// Old/new value pairs.
    pub changes: Changes,
}

impl EnforceOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn success(comment: impl Into<String>) -> Self {
        Self {
            result: Some(true),
            comment: comment.into(),
            changes: Changes::none(),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(comment: impl Into<String>) -> Self {
        Self {
            result: Some(false),
            comment: comment.into(),
            changes: Changes::none(),
        }
    }

    /// A dry-run outcome: state would change, nothing was applied.
    #[must_use]
    pub fn planned(comment: impl Into<String>) -> Self {
        Self {
            result: None,
            comment: comment.into(),
            changes: Changes::none(),
        }
    }

    /// Attaches old/new changes to the outcome.
    #[must_use]
    pub fn with_changes(mut self, changes: Changes) -> Self {
        self.changes = changes;
        self
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == Some(true)
    }
}

impl std::fmt::Display for EnforceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.result {
            Some(true) => "succeeded",
            Some(false) => "failed",
            None => "planned (dry run)",
        };
        writeln!(f, "Enforcement {status}: {}", self.comment)?;

        if let (Some(old), Some(new)) = (&self.changes.old, &self.changes.new) {
            for (cmd, new_val) in new {
                let old_val = old.get(cmd).map_or("<absent>", String::as_str);
                writeln!(f, "  {cmd}: '{old_val}' -> '{new_val}'")?;
            }
        }

        Ok(())
    }
}
