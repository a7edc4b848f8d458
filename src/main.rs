//! Chain-resync CLI.
//!
//! Command-line interface for reading, writing, and deleting the certificate
//! chain-engine cache resync timestamp on remote hosts.

use chain_resync::{
    run_batch, AccessMethod, BatchOperation, BatchRequest, ConfigManager, Credentials, FileTime,
    HostResolver, IdentityResolver, OperationOutcome, ResyncError, TargetHost, ToolConfig,
    TransportOptions,
};
use chain_resync::domain::outcome::Operation;
use chain_resync::infra::config::ExportFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "chain-resync")]
#[command(about = "Manage the certificate chain-engine cache resync timestamp on remote hosts")]
#[command(long_about = "
chain-resync - remote management of the ChainCacheResyncFiletime registry value

EXAMPLES:
    # Read the current resync timestamp from two hosts over WMI (default)
    chain-resync get ca01 ca02

    # Force every chain cache entry older than now to be discarded
    chain-resync set now ca01.contoso.com

    # Write an explicit instant over WinRM with explicit credentials
    chain-resync set 2026-08-01T00:00:00Z ca01 -m winrm -u CONTOSO\\svc-pki

    # Remove the override again
    chain-resync delete ca01 ca02

ACCESS METHODS:
    direct  Remote registry handle (remote registry service must run)
    wmi     StdRegProv over DCOM (default)
    winrm   Remote-executed pipeline over WS-Management

ENVIRONMENT VARIABLES:
    CHAIN_RESYNC_SECRET   Credential secret when --username is given
    RUST_LOG              Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the resync timestamp from one or more hosts
    Get {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Write the resync timestamp on one or more hosts
    Set {
        /// Timestamp to write: RFC 3339 (e.g. 2026-08-01T00:00:00Z) or 'now'
        #[arg(value_name = "TIMESTAMP")]
        timestamp: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Remove the resync timestamp from one or more hosts
    Delete {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct TargetArgs {
    /// Target host names (remote hosts only)
    #[arg(value_name = "HOST", required = true)]
    hosts: Vec<String>,

    /// Access method
    #[arg(short, long, value_enum)]
    method: Option<AccessMethodArg>,

    /// Per-host timeout in seconds (overrides config)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum hosts processed in parallel (overrides config)
    #[arg(long)]
    max_parallel: Option<usize>,

    /// WinRM listener port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Use HTTPS for the WinRM listener
    #[arg(long)]
    tls: bool,

    /// User name for explicit credentials (secret read from CHAIN_RESYNC_SECRET)
    #[arg(short, long)]
    username: Option<String>,

    /// Emit outcomes as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create the default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum AccessMethodArg {
    Direct,
    Wmi,
    Winrm,
}

impl From<AccessMethodArg> for AccessMethod {
    fn from(arg: AccessMethodArg) -> Self {
        match arg {
            AccessMethodArg::Direct => AccessMethod::Direct,
            AccessMethodArg::Wmi => AccessMethod::ManagementQuery,
            AccessMethodArg::Winrm => AccessMethod::RemoteExec,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum ExportFormatArg {
    Toml,
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Get { target } => run_operation(BatchOperation::Get, target).await,
        Commands::Set { timestamp, target } => {
            let filetime = parse_timestamp(&timestamp).into_diagnostic()?;
            run_operation(BatchOperation::Set(filetime), target).await
        }
        Commands::Delete { target } => run_operation(BatchOperation::Delete, target).await,
        Commands::Config(command) => handle_config_command(command),
    }
}

async fn run_operation(operation: BatchOperation, target: TargetArgs) -> Result<()> {
    let config = ConfigManager::new()
        .and_then(|m| m.load_or_create_default())
        .into_diagnostic()?;

    let method = match target.method {
        Some(arg) => arg.into(),
        None => config.default_method().into_diagnostic()?,
    };
    let options = build_transport_options(&target, &config).into_diagnostic()?;
    let max_parallel = target.max_parallel.unwrap_or(config.max_parallel_hosts);
    let json = target.json || config.json_output;

    // Invalid hosts (including local-machine targets) become per-host refusal
    // outcomes; the rest of the batch still runs.
    enum Slot {
        Ready(TargetHost),
        Refused(OperationOutcome),
    }

    let op_kind = operation_kind(operation);
    let resolver = IdentityResolver;
    let slots: Vec<Slot> = target
        .hosts
        .iter()
        .map(|raw| match resolver.resolve(raw) {
            Ok(host) => Slot::Ready(host),
            Err(e) => Slot::Refused(OperationOutcome::failed(
                raw.trim(),
                method,
                op_kind,
                host_error_kind(&e),
                e.to_string(),
            )),
        })
        .collect();

    let ready: Vec<TargetHost> = slots
        .iter()
        .filter_map(|slot| match slot {
            Slot::Ready(host) => Some(host.clone()),
            Slot::Refused(_) => None,
        })
        .collect();

    let request = BatchRequest {
        hosts: ready,
        operation,
        method,
        options,
        max_parallel,
    };
    let mut batch_results = run_batch(request).await.into_iter();

    let outcomes: Vec<OperationOutcome> = slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Refused(outcome) => outcome,
            Slot::Ready(host) => batch_results.next().unwrap_or_else(|| {
                OperationOutcome::failed(
                    host.as_str(),
                    method,
                    op_kind,
                    "transport/remote-fault",
                    "batch produced no outcome for this host",
                )
            }),
        })
        .collect();

    print_outcomes(&outcomes, json)?;

    if outcomes.iter().any(|outcome| !outcome.is_complete()) {
        std::process::exit(1);
    }
    Ok(())
}

fn operation_kind(operation: BatchOperation) -> Operation {
    match operation {
        BatchOperation::Get => Operation::Get,
        BatchOperation::Set(_) => Operation::Set,
        BatchOperation::Delete => Operation::Delete,
    }
}

fn host_error_kind(error: &chain_resync::HostError) -> &'static str {
    match error {
        chain_resync::HostError::LocalTarget(_) => "host/local-target",
        _ => "host/invalid",
    }
}

fn build_transport_options(
    target: &TargetArgs,
    config: &ToolConfig,
) -> Result<TransportOptions, ResyncError> {
    let mut options = TransportOptions::default()
        .with_timeout(Duration::from_secs(
            target.timeout.unwrap_or(config.timeout_seconds).max(1),
        ))
        .with_remote_port(target.port.unwrap_or(config.winrm_port));
    if target.tls || config.winrm_tls {
        options = options.with_tls();
    }
    if let Some(username) = &target.username {
        let secret = std::env::var("CHAIN_RESYNC_SECRET").map_err(|_| {
            ResyncError::Configuration(
                "--username given but CHAIN_RESYNC_SECRET is not set".to_string(),
            )
        })?;
        let credentials = Credentials::new(username.clone(), secret)
            .map_err(|e| ResyncError::Configuration(e.to_string()))?;
        options = options.with_credentials(credentials);
    }
    Ok(options)
}

fn print_outcomes(outcomes: &[OperationOutcome], json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(outcomes).into_diagnostic()?;
        println!("{rendered}");
        return Ok(());
    }

    for outcome in outcomes {
        if outcome.is_complete() {
            let value = match (&outcome.timestamp, outcome.operation) {
                (Some(ts), _) => ts.to_rfc3339(),
                (None, Operation::Get) => "not set".to_string(),
                (None, _) => "ok".to_string(),
            };
            println!(
                "{host}\t{method}\t{op}\tcomplete\t{value}",
                host = outcome.host,
                method = outcome.method,
                op = outcome.operation.as_str(),
            );
        } else {
            println!(
                "{host}\t{method}\t{op}\tfailed\t{kind}: {detail}",
                host = outcome.host,
                method = outcome.method,
                op = outcome.operation.as_str(),
                kind = outcome.error_kind.as_deref().unwrap_or("unknown"),
                detail = outcome.error.as_deref().unwrap_or(""),
            );
        }
    }
    Ok(())
}

fn parse_timestamp(input: &str) -> Result<FileTime, ResyncError> {
    if input.eq_ignore_ascii_case("now") {
        return Ok(FileTime::now());
    }
    chrono::DateTime::parse_from_rfc3339(input)
        .map(|dt| FileTime::from_datetime(dt.with_timezone(&chrono::Utc)))
        .map_err(|e| {
            ResyncError::Timestamp(format!(
                "'{input}' is not RFC 3339 (e.g. 2026-08-01T00:00:00Z): {e}"
            ))
        })
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    let manager = ConfigManager::new().into_diagnostic()?;

    match command {
        ConfigCommands::Show => {
            let rendered = manager.export_config(ExportFormat::Toml).into_diagnostic()?;
            println!("# {}", manager.config_path().display());
            println!("{rendered}");
        }
        ConfigCommands::Init => {
            manager.save(&ToolConfig::default()).into_diagnostic()?;
            println!("created {}", manager.config_path().display());
        }
        ConfigCommands::Set { key, value } => {
            manager.update_value(&key, &value).into_diagnostic()?;
            println!("{key} = {value}");
        }
        ConfigCommands::Export { format, output } => {
            let rendered = manager.export_config(format.into()).into_diagnostic()?;
            match output {
                Some(path) => std::fs::write(&path, rendered).into_diagnostic()?,
                None => println!("{rendered}"),
            }
        }
    }
    Ok(())
}
