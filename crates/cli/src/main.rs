//! TravelSafe command-line tool.
//!
//! Provides subcommands for generating and validating configuration,
//! previewing the credentials derived for each tourist, and running a
//! provisioning batch with a per-record breakdown.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use travelsafe_core::config::AppConfig;
use travelsafe_core::models::{Credential, ProvisionAction, ProvisioningReport, REDACTED};
use travelsafe_core::Provisioner;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// TravelSafe command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "travelsafe",
    version,
    about = "Provision and inspect TravelSafe tourist accounts"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./travelsafe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./travelsafe.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Show the credentials each tourist would be provisioned with.
    Credentials,

    /// Create or update an account for every tourist.
    Provision {
        /// Print the raw JSON report instead of a table.
        #[arg(long)]
        json: bool,
    },
}

const DEFAULT_CONFIG: &str = r#"# TravelSafe provisioning configuration

[server]
listen = "127.0.0.1:8000"
log_level = "info"
function_path = "/functions/v1/create-tourist-accounts"

[backend]
url = "https://your-project.supabase.co"
service_role_key_env = "SUPABASE_SERVICE_ROLE_KEY"
tourists_table = "tourists"
request_timeout_secs = 30

[credentials]
email_domain = "travelsafe.com"
password_suffix = "2024!"

[provisioning]
# "tourist_id" looks up an existing account by the tourist's id,
# "email" searches the identity service for the taken address.
fallback_lookup = "tourist_id"
expose_passwords = false
"#;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Credentials => {
            let config = load_config(&cli.config)?;
            cmd_credentials(&config).await
        }
        Commands::Provision { json } => {
            let config = load_config(&cli.config)?;
            cmd_provision(&config, json).await
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration file")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set backend.url to your project URL");
    println!("  2. Export SUPABASE_SERVICE_ROLE_KEY with the service-role key");
    println!(
        "  3. Validate with: travelsafe validate --config {}",
        output.display()
    );
    println!(
        "  4. Start the server: travelsafe-server --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    let _ = config.resolve_env_vars();
    println!(
        "  {}",
        style::success("Environment variable references processed")
    );

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    println!();
    println!("{}", style::header("Configuration summary"));
    println!("  Backend URL      : {}", config.backend.url);
    println!(
        "  Service key      : {}",
        if config.backend.service_role_key.is_some() {
            "set".to_string()
        } else {
            format!("NOT SET ({})", config.backend.service_role_key_env)
        }
    );
    println!("  Tourists table   : {}", config.backend.tourists_table);
    println!("  Email domain     : {}", config.credentials.email_domain);
    println!("  Fallback lookup  : {}", config.provisioning.fallback_lookup);
    println!("  Listen           : {}", config.server.listen);
    if config.provisioning.expose_passwords {
        println!();
        println!(
            "  {}",
            style::warn("expose_passwords is on: reports will contain plaintext passwords")
        );
    }

    Ok(())
}

async fn cmd_credentials(config: &AppConfig) -> Result<()> {
    let provisioner = Provisioner::from_config(config).context("failed to build clients")?;
    let credentials = provisioner
        .preview()
        .await
        .context("failed to fetch tourist records")?;

    if credentials.is_empty() {
        println!("No tourist records found.");
        return Ok(());
    }

    println!();
    println!("{}", style::header("Derived Credentials"));
    println!();
    println!(
        "{}",
        credentials_table(&credentials, config.provisioning.expose_passwords)
    );
    println!();
    println!("{} tourists", credentials.len());

    Ok(())
}

async fn cmd_provision(config: &AppConfig, json: bool) -> Result<()> {
    let provisioner = Provisioner::from_config(config).context("failed to build clients")?;
    let report = provisioner
        .run()
        .await
        .context("provisioning aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{}", style::header(&report.message));
        println!();
        println!("{}", report_table(&report));
        println!();
        println!(
            "{}",
            style::dim(&format!(
                "total {}  successful {}  failed {}",
                report.summary.total, report.summary.successful, report.summary.failed
            ))
        );
    }

    if report.summary.failed > 0 {
        anyhow::bail!(
            "{} of {} accounts could not be provisioned",
            report.summary.failed,
            report.summary.total
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn credentials_table(credentials: &[Credential], show_passwords: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Tourist ID", "Name", "Email", "Password"]);

    for cred in credentials {
        let password = if show_passwords {
            cred.password.as_str()
        } else {
            REDACTED
        };
        table.add_row(vec![
            Cell::new(&cred.tourist_id),
            Cell::new(&cred.name),
            Cell::new(&cred.email),
            Cell::new(password),
        ]);
    }
    table
}

fn report_table(report: &ProvisioningReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Tourist ID", "Name", "Email", "Outcome", "Detail"]);

    for result in &report.results {
        let outcome = match (result.success, result.action) {
            (true, Some(ProvisionAction::Created)) => Cell::new("✓ created").fg(Color::Green),
            (true, Some(ProvisionAction::Updated)) => Cell::new("✓ updated").fg(Color::Cyan),
            (true, None) => Cell::new("✓ ok").fg(Color::Green),
            (false, _) => Cell::new("✗ failed").fg(Color::Red),
        };
        let detail = if result.success {
            result.user_id.clone().unwrap_or_default()
        } else {
            result.error.clone().unwrap_or_default()
        };

        table.add_row(vec![
            Cell::new(&result.tourist_id),
            Cell::new(&result.name),
            Cell::new(&result.email),
            outcome,
            Cell::new(detail),
        ]);
    }
    table
}
