//! Modguard CLI entrypoint.
//!
//! This is the main entrypoint for the modguard command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use modguard::cli::{Cli, Commands, OutputFormatter};
use modguard::device::DeviceProbe;
use modguard::enforce::{
    parse_vendor_list, FirmwareEnforcer, LicenseEnforcer, PatternDbEnforcer, PatternVendor,
    Reconciler, RegistrationEnforcer,
};
use modguard::error::Result;
use modguard::rest::{RestClient, StatusApi};
use modguard::session::HelperChannelFactory;
use modguard::spec::{find_node_config, NodeConfig, SpecParser};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate => cmd_validate(cli.node_config.as_ref()),
        Commands::Ping => cmd_ping(cli.node_config.as_ref(), &formatter).await,
        Commands::Version => cmd_version(cli.node_config.as_ref()).await,
        Commands::MgmtIp => cmd_mgmt_ip(cli.node_config.as_ref()).await,
        Commands::Verify { spec } => cmd_verify(cli.node_config.as_ref(), &spec, &formatter).await,
        Commands::Configure { spec, dry_run } => {
            cmd_configure(cli.node_config.as_ref(), &spec, dry_run, &formatter).await
        }
        Commands::Licenses { spec, dry_run } => {
            cmd_licenses(cli.node_config.as_ref(), &spec, dry_run, &formatter).await
        }
        Commands::Register { spec, dry_run } => {
            cmd_register(cli.node_config.as_ref(), &spec, dry_run, &formatter).await
        }
        Commands::DbStatus { vendor } => {
            cmd_db_status(cli.node_config.as_ref(), &vendor, &formatter).await
        }
        Commands::DbExpiry { vendors, days } => {
            cmd_db_expiry(cli.node_config.as_ref(), &vendors, days, &formatter).await
        }
        Commands::Upgrade {
            image_url,
            build,
            force,
        } => cmd_upgrade(cli.node_config.as_ref(), &image_url, build, force, &formatter).await,
    }
}

/// Initialize a node configuration skeleton.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing modguard node in: {}", path.display());

    let node_path = path.join("modguard.node.yaml");
    let env_path = path.join(".env.example");
    let spec_path = path.join("load-licenses.json");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && node_path.exists() {
        eprintln!("Node configuration already exists: {}", node_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write node configuration template
    let node_template = include_str!("../templates/modguard.node.yaml");
    std::fs::write(&node_path, node_template)?;
    eprintln!("Created: {}", node_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write sample specification
    let spec_template = include_str!("../templates/load-licenses.json");
    std::fs::write(&spec_path, spec_template)?;
    eprintln!("Created: {}", spec_path.display());

    // Write/update .gitignore
    let gitignore_content = ".env\n";
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.contains(".env") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Modguard")?;
            writeln!(file, ".env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, gitignore_content)?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nNode initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in the credentials");
    eprintln!("  2. Edit modguard.node.yaml for your appliance");
    eprintln!("  3. Run 'modguard validate' to check the configuration");
    eprintln!("  4. Run 'modguard ping' to check connectivity");

    Ok(())
}

/// Validate the node configuration.
fn cmd_validate(node_config: Option<&PathBuf>) -> Result<()> {
    let config = load_node(node_config)?;

    eprintln!("Node configuration is valid!");
    eprintln!("\nConfiguration summary:");
    eprintln!("  Component: {}", config.node.component);
    eprintln!("  Pod: {}", config.node.pod);
    eprintln!("  Management IP: {}", config.mgmt.ip);
    eprintln!("  Status API: {}", config.rest_base_url());
    eprintln!(
        "  Transport helper: {}",
        config
            .transport
            .helper
            .as_ref()
            .map_or_else(|| String::from("<not configured>"), |p| p.display().to_string())
    );

    Ok(())
}

/// Check connectivity to the device.
async fn cmd_ping(node_config: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();

    let reply = DeviceProbe::new(&config, &factory).ping().await?;
    eprintln!("{}", formatter.format_reply(&reply));

    Ok(())
}

/// Show the currently booted build number.
async fn cmd_version(node_config: Option<&PathBuf>) -> Result<()> {
    let config = load_node(node_config)?;
    let client = RestClient::from_node(&config)?;

    client.login().await?;
    let version = client.version().await?;
    eprintln!("{}", version.build);

    Ok(())
}

/// Look up the management interface address.
async fn cmd_mgmt_ip(node_config: Option<&PathBuf>) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();

    let ip = DeviceProbe::new(&config, &factory).mgmt_ip().await?;
    eprintln!("{ip}");

    Ok(())
}

/// Verify a specification without applying.
async fn cmd_verify(
    node_config: Option<&PathBuf>,
    spec: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();

    let outcome = Reconciler::new(&config, &factory).verify_only(spec).await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Enforce a specification on the device.
async fn cmd_configure(
    node_config: Option<&PathBuf>,
    spec: &Path,
    dry_run: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();

    let outcome = Reconciler::new(&config, &factory)
        .ensure_configured(spec, dry_run)
        .await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Ensure licenses are loaded.
async fn cmd_licenses(
    node_config: Option<&PathBuf>,
    spec: &Path,
    dry_run: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();
    let client = RestClient::from_node(&config)?;

    let outcome = LicenseEnforcer::new(&config, &factory, &client)
        .ensure_loaded(spec, dry_run)
        .await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Ensure the appliance is registered.
async fn cmd_register(
    node_config: Option<&PathBuf>,
    spec: &Path,
    dry_run: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();

    let outcome = RegistrationEnforcer::new(&config, &factory)
        .ensure_registered(spec, dry_run)
        .await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Check pattern-database download state.
async fn cmd_db_status(
    node_config: Option<&PathBuf>,
    vendor: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();
    let client = RestClient::from_node(&config)?;

    let vendor: PatternVendor = vendor.parse()?;
    let outcome = PatternDbEnforcer::new(&config, &factory, &client)
        .ensure_downloaded(vendor)
        .await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Check pattern-database expiry.
async fn cmd_db_expiry(
    node_config: Option<&PathBuf>,
    vendors: &[String],
    days: i64,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let factory = HelperChannelFactory::new();
    let client = RestClient::from_node(&config)?;

    let vendors = parse_vendor_list(vendors)?;
    let outcome = PatternDbEnforcer::new(&config, &factory, &client)
        .ensure_not_expiring(&vendors, days)
        .await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

/// Upgrade the firmware to a target build.
async fn cmd_upgrade(
    node_config: Option<&PathBuf>,
    image_url: &str,
    build: i64,
    force: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_node(node_config)?;
    let client = RestClient::from_node(&config)?;

    let outcome = FirmwareEnforcer::new(&client)
        .ensure_build(image_url, build, force)
        .await?;
    eprintln!("{}", formatter.format_outcome(&outcome));

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the node configuration file path.
fn resolve_node_path(node_config: Option<&PathBuf>) -> Result<PathBuf> {
    node_config.map_or_else(|| find_node_config("."), |path| Ok(path.clone()))
}

/// Loads the node configuration with .env and environment overrides.
fn load_node(node_config: Option<&PathBuf>) -> Result<NodeConfig> {
    let node_file = resolve_node_path(node_config)?;
    debug!("Loading node configuration from: {}", node_file.display());

    let parser = SpecParser::new().with_base_path(
        node_file
            .parent()
            .unwrap_or_else(|| std::path::Path::new(".")),
    );
    parser.load_dotenv()?;

    parser.load_node_with_env(&node_file)
}
