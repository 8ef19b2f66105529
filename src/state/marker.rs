//! Advisory status marker files.
//!
//! A marker records the last-known boolean outcome of an enforcement kind
//! for one node, e.g. `mod1-dp2-lic-status`. The license enforcer writes
//! `false` before attempting a corrective load, so a subsequent run can tell
//! "load was in progress" apart from stale success.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::spec::NodeConfig;

/// Environment variable overriding the marker directory.
const STATE_DIR_VAR: &str = "MODGUARD_STATE_DIR";

/// Directory name under the platform state directory.
const STATE_SUBDIR: &str = "modguard";

/// Advisory one-line status marker for a node and enforcement kind.
#[derive(Debug, Clone)]
pub struct StatusMarker {
    /// Full path of the marker file.
    path: PathBuf,
}

impl StatusMarker {
    /// Creates a marker for the given node and kind (e.g. `lic`, `db`).
    #[must_use]
    pub fn new(node: &NodeConfig, kind: &str) -> Self {
        let dir = std::env::var_os(STATE_DIR_VAR).map_or_else(resolve_state_dir, PathBuf::from);
        Self::with_dir(dir, node, kind)
    }

    /// Creates a marker rooted at a specific directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>, node: &NodeConfig, kind: &str) -> Self {
        let path = dir
            .into()
            .join(format!("{}-{kind}-status", node.marker_prefix()));
        Self { path }
    }

    /// Returns the marker file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the marker with the given boolean and a timestamp.
    ///
    /// The write is atomic: a temporary file is renamed over the marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be written.
    pub async fn write(&self, value: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                debug!("Creating marker directory: {}", parent.display());
                fs::create_dir_all(parent).await?;
            }
        }

        let content = format!("{value} {}\n", Utc::now().to_rfc3339());
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Wrote status marker {}: {value}", self.path.display());
        Ok(())
    }

    /// Reads the last-known boolean, if a parseable marker exists.
    ///
    /// Advisory only; a missing or malformed marker is `None`, never an
    /// error.
    pub async fn read(&self) -> Option<bool> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => return None,
        };

        match content.split_whitespace().next() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            other => {
                warn!("Malformed status marker {}: {other:?}", self.path.display());
                None
            }
        }
    }
}

/// Resolves the default marker directory.
fn resolve_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(STATE_SUBDIR)
}
