//! Loading of command specifications and node configuration.
//!
//! Command specifications are JSON files with a top-level `config` key; node
//! configuration is YAML with environment-variable overrides and `.env`
//! support.

use crate::error::{ModGuardError, Result, SpecError};
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

use super::node::NodeConfig;
use super::records::CommandSpec;

/// Parser for command specifications and node configuration.
#[derive(Debug, Default)]
pub struct SpecParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl SpecParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a command specification from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_spec(&self, path: impl AsRef<Path>) -> Result<CommandSpec> {
        let path = path.as_ref();
        info!("Loading command specification from: {}", path.display());

        if !path.exists() {
            return Err(ModGuardError::Spec(SpecError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ModGuardError::Spec(SpecError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_spec(&content, Some(path))
    }

    /// Parses a command specification from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn parse_spec(&self, content: &str, source: Option<&Path>) -> Result<CommandSpec> {
        debug!("Parsing JSON command specification");

        let spec: CommandSpec = serde_json::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ModGuardError::Spec(SpecError::ParseError {
                message: format!("JSON parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed specification with {} contexts, {} records",
            spec.config.len(),
            spec.total_records()
        );
        Ok(spec)
    }

    /// Loads node configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_node(&self, path: impl AsRef<Path>) -> Result<NodeConfig> {
        let path = path.as_ref();
        info!("Loading node configuration from: {}", path.display());

        if !path.exists() {
            return Err(ModGuardError::Spec(SpecError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ModGuardError::Spec(SpecError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_node(&content, Some(path))
    }

    /// Parses node configuration from a YAML string and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or validation fails.
    pub fn parse_node(&self, content: &str, source: Option<&Path>) -> Result<NodeConfig> {
        let config: NodeConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ModGuardError::Spec(SpecError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        config.validate().map_err(|e| {
            ModGuardError::Spec(SpecError::ValidationError {
                message: e.to_string(),
                field: None,
            })
        })?;

        debug!(
            "Parsed node configuration for component: {}",
            config.node.component
        );
        Ok(config)
    }

    /// Loads node configuration with environment variable overrides.
    ///
    /// Overrides are checked in the format `MODGUARD_<KEY>`
    /// (e.g. `MODGUARD_MGMT_IP`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_node_with_env(&self, path: impl AsRef<Path>) -> Result<NodeConfig> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            ModGuardError::Spec(SpecError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let mut config: NodeConfig = serde_yaml::from_str(&content).map_err(|e| {
            ModGuardError::Spec(SpecError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        Self::apply_env_overrides(&mut config);

        config.validate().map_err(|e| {
            ModGuardError::Spec(SpecError::ValidationError {
                message: e.to_string(),
                field: None,
            })
        })?;

        Ok(config)
    }

    /// Applies environment variable overrides to the node configuration.
    fn apply_env_overrides(config: &mut NodeConfig) {
        if let Ok(ip) = std::env::var("MODGUARD_MGMT_IP") {
            debug!("Overriding mgmt.ip from environment");
            config.mgmt.ip = ip;
        }

        if let Ok(user) = std::env::var("MODGUARD_USER_NAME") {
            debug!("Overriding deploy.user_name from environment");
            config.deploy.user_name = user;
        }

        if let Ok(password) = std::env::var("MODGUARD_CONSOLE_PASSWORD") {
            debug!("Overriding deploy.console_password from environment");
            config.deploy.console_password = password;
        }

        if let Ok(password) = std::env::var("MODGUARD_ENABLE_PASSWORD") {
            debug!("Overriding deploy.enable_password from environment");
            config.deploy.enable_password = password;
        }

        if let Ok(helper) = std::env::var("MODGUARD_TRANSPORT_HELPER") {
            debug!("Overriding transport.helper from environment");
            config.transport.helper = Some(std::path::PathBuf::from(helper));
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ModGuardError::Spec(SpecError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default node-configuration file names to search for.
pub const DEFAULT_NODE_CONFIG_FILES: &[&str] = &[
    "modguard.node.yaml",
    "modguard.node.yml",
    "node.yaml",
    "node.yml",
];

/// Finds the node-configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_node_config(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_NODE_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found node configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ModGuardError::Spec(SpecError::FileNotFound {
        path: start.join(DEFAULT_NODE_CONFIG_FILES[0]),
    }))
}
