//! vaultrun - provision a KMS auto-unsealed Vault server.
//!
//! ## Usage
//!
//! ```sh
//! vaultrun up [--domain vault.example.com]
//! vaultrun outputs
//! vaultrun state
//! vaultrun destroy --yes
//! ```
//!
//! ## Configuration
//!
//! Read from `vaultrun.toml` (or `--config`), `GOOGLE_CLOUD_PROJECT` and
//! `VAULTRUN_*` environment variables. Flags override all of them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultrun::vault::{publish_outputs, read_outputs};
use vaultrun::{
    DeployConfig, LocalProvider, OUTPUTS_FILE_NAME, ResourceProvider, STATE_FILE_NAME,
    VAULT_URL_OUTPUT,
};

// =============================================================================
// CLI Parsing
// =============================================================================

/// Provision a KMS auto-unsealed Vault server on a managed container service.
#[derive(Debug, Parser)]
#[command(name = "vaultrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./vaultrun.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for local state and published outputs.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Target project id.
    #[arg(long, global = true)]
    project: Option<String>,

    /// Custom domain to map onto the service.
    #[arg(long, global = true)]
    domain: Option<String>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or update every resource and publish the Vault URL.
    Up,
    /// Print the outputs of the last successful run.
    Outputs,
    /// List recorded resources.
    State,
    /// Delete every recorded resource, dependents first.
    Destroy {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

impl Cli {
    /// Loads configuration and applies flag overrides.
    fn deploy_config(&self) -> Result<DeployConfig> {
        let mut config = match &self.config {
            Some(path) => DeployConfig::from_file(path)?,
            None => DeployConfig::load()?,
        };
        if let Some(project) = &self.project {
            config.project = Some(project.clone());
        }
        if let Some(domain) = &self.domain {
            config.vault_domain = Some(domain.clone());
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

// =============================================================================
// Commands
// =============================================================================

fn open_provider(config: &DeployConfig) -> Result<Arc<LocalProvider>> {
    let path = config.state_dir().join(STATE_FILE_NAME);
    let provider = LocalProvider::open(&path)
        .with_context(|| format!("failed to open state at {}", path.display()))?;
    Ok(Arc::new(provider))
}

async fn cmd_up(config: &DeployConfig, format: OutputFormat) -> Result<()> {
    let provider = open_provider(config)?;
    let report = vaultrun::deploy(config, provider).await?;

    publish_outputs(&config.state_dir().join(OUTPUTS_FILE_NAME), &report)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for step in &report.steps {
                if step.kind.is_some() {
                    eprintln!("{:>10}  {}", step.outcome.to_string(), step.target);
                }
            }
            if let Some(url) = report.outputs.get(VAULT_URL_OUTPUT) {
                println!("{} = {}", VAULT_URL_OUTPUT, url);
            }
        }
    }

    report.into_result()?;
    Ok(())
}

fn cmd_outputs(config: &DeployConfig, format: OutputFormat) -> Result<()> {
    let outputs = read_outputs(&config.state_dir().join(OUTPUTS_FILE_NAME))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outputs)?),
        OutputFormat::Text => {
            if outputs.is_empty() {
                eprintln!("No outputs recorded; run `vaultrun up` first");
            }
            for (name, value) in &outputs {
                println!("{} = {}", name, value);
            }
        }
    }
    Ok(())
}

async fn cmd_state(config: &DeployConfig, format: OutputFormat) -> Result<()> {
    let provider = open_provider(config)?;
    let records = provider.list().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => {
            if let Some(path) = provider.state_path() {
                eprintln!("State file: {}", path.display());
            }
            println!("KIND\tNAME\tPHYSICAL\tUPDATED");
            for record in &records {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id.kind,
                    record.id.name,
                    record.physical_name,
                    record.updated_at.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

async fn cmd_destroy(config: &DeployConfig, format: OutputFormat, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to destroy without --yes");
    }
    let provider = open_provider(config)?;
    let deleted = vaultrun::destroy(provider.as_ref()).await?;

    let outputs_path = config.state_dir().join(OUTPUTS_FILE_NAME);
    if outputs_path.exists() {
        std::fs::remove_file(&outputs_path)
            .with_context(|| format!("failed to remove {}", outputs_path.display()))?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&deleted)?),
        OutputFormat::Text => {
            for id in &deleted {
                println!("Deleted {}", id);
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.deploy_config()?;
    match cli.command {
        Commands::Up => cmd_up(&config, cli.format).await,
        Commands::Outputs => cmd_outputs(&config, cli.format),
        Commands::State => cmd_state(&config, cli.format).await,
        Commands::Destroy { yes } => cmd_destroy(&config, cli.format, yes).await,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "vaultrun",
            "up",
            "--project",
            "acme-vault",
            "--domain",
            "vault.example.com",
            "--format",
            "json",
        ]);
        assert!(matches!(cli.command, Commands::Up));
        assert_eq!(cli.project.as_deref(), Some("acme-vault"));
        assert_eq!(cli.domain.as_deref(), Some("vault.example.com"));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_destroy_requires_flag() {
        let cli = Cli::parse_from(["vaultrun", "destroy"]);
        assert!(matches!(cli.command, Commands::Destroy { yes: false }));

        let cli = Cli::parse_from(["vaultrun", "destroy", "--yes"]);
        assert!(matches!(cli.command, Commands::Destroy { yes: true }));
    }
}
