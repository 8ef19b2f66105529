//! Command specification and node configuration.
//!
//! A command specification is a declarative, ordered set of device contexts,
//! each holding `{cmd, chk}` records. It is loaded once per enforcement run
//! and immutable for the duration of the run.

pub mod extract;
pub mod node;
pub mod parser;
pub mod records;

pub use extract::{extract_expectations, ExpectationMap, VERIFIED_CONTEXTS};
pub use node::{DeployCredentials, MgmtConfig, NodeConfig, NodeIdentity, RestConfig, TransportConfig};
pub use parser::{find_node_config, SpecParser, DEFAULT_NODE_CONFIG_FILES};
pub use records::{CommandContext, CommandRecord, CommandSpec};
