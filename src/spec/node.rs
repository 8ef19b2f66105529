//! Per-node connection and identity configuration.
//!
//! The original automation kept connection parameters in a process-global
//! cache populated at proxy startup. Here they are an explicit struct passed
//! into each enforcer call, so there is no hidden cross-call state and fakes
//! can be injected in tests.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Per-node configuration: identity, management address, credentials,
/// REST endpoint, and the transport bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct NodeConfig {
    /// Node identity within the deployment.
    #[validate(nested)]
    pub node: NodeIdentity,
    /// Management interface parameters.
    #[validate(nested)]
    pub mgmt: MgmtConfig,
    /// Login credentials used by the session channel and the REST API.
    #[validate(nested)]
    pub deploy: DeployCredentials,
    /// Out-of-band REST endpoint parameters.
    #[serde(default)]
    pub rest: RestConfig,
    /// Transport bridge parameters.
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Identity of the node within the deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct NodeIdentity {
    /// Component name, e.g. `mod1`.
    #[validate(length(min = 1, message = "component must not be empty"))]
    pub component: String,
    /// Pod name, e.g. `dp2`.
    #[validate(length(min = 1, message = "pod must not be empty"))]
    pub pod: String,
}

/// Management interface parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct MgmtConfig {
    /// Management IP address of the appliance.
    #[validate(length(min = 7, message = "ip must be a dotted-quad address"))]
    pub ip: String,
}

/// Login credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct DeployCredentials {
    /// Login user name.
    #[validate(length(min = 1, message = "user_name must not be empty"))]
    pub user_name: String,
    /// Console password used by the session channel.
    #[validate(length(min = 1, message = "console_password must not be empty"))]
    pub console_password: String,
    /// Enable password used by the REST API.
    #[validate(length(min = 1, message = "enable_password must not be empty"))]
    pub enable_password: String,
}

/// Out-of-band REST endpoint parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestConfig {
    /// HTTPS port of the appliance status API.
    #[serde(default = "default_rest_port")]
    pub port: u16,
    /// Whether to verify the appliance TLS certificate.
    ///
    /// Appliances ship with self-signed certificates, so this defaults off.
    #[serde(default)]
    pub verify_tls: bool,
}

/// Transport bridge parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TransportConfig {
    /// Path to the helper program that speaks the device's CLI dialect.
    #[serde(default)]
    pub helper: Option<PathBuf>,
}

const fn default_rest_port() -> u16 {
    443
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            port: default_rest_port(),
            verify_tls: false,
        }
    }
}

impl NodeConfig {
    /// Returns the base URL of the appliance status API.
    #[must_use]
    pub fn rest_base_url(&self) -> String {
        format!("https://{}:{}", self.mgmt.ip, self.rest.port)
    }

    /// Returns the `<component>-<pod>` prefix used for status marker files.
    #[must_use]
    pub fn marker_prefix(&self) -> String {
        format!("{}-{}", self.node.component, self.node.pod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeConfig {
        NodeConfig {
            node: NodeIdentity {
                component: "mod1".into(),
                pod: "dp2".into(),
            },
            mgmt: MgmtConfig {
                ip: "172.27.178.85".into(),
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

    #[test]
    fn validates_complete_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_empty_component() {
        let mut config = sample();
        config.node.component.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rest_base_url_uses_mgmt_ip_and_port() {
        let mut config = sample();
        config.rest.port = 8443;
        assert_eq!(config.rest_base_url(), "https://172.27.178.85:8443");
    }

    #[test]
    fn marker_prefix_joins_component_and_pod() {
        assert_eq!(sample().marker_prefix(), "mod1-dp2");
    }
}
