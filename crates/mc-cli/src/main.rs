//! mcctl: command-line client for the machine gateway

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mc_cli::client::{GatewayClient, DEFAULT_URL};
use mc_cli::output::{print_error, print_info, print_reply, print_success};
use mc_core::config::{self, GatewayConfig};
use mc_core::CredentialStore;

#[derive(Parser)]
#[command(name = "mcctl")]
#[command(author, version, about = "Machine controller gateway client")]
#[command(propagate_version = true)]
struct Cli {
    /// Gateway WebSocket URL
    #[arg(long, global = true, env = "MC_GATEWAY_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Username to log in as
    #[arg(short, long, global = true, env = "MC_USER")]
    user: Option<String>,

    /// Password for the user
    #[arg(short, long, global = true, env = "MC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Seconds to wait for each reply
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    /// Print raw JSON replies
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call any gateway method
    Call {
        /// Method name
        method: String,
        /// Parameters, each parsed as JSON (bare words are sent as strings)
        params: Vec<String>,
    },

    /// Turn the machine on
    On,

    /// Turn the machine off
    Off,

    /// Query the machine state, or command it on/off
    State {
        /// Commanded state
        #[arg(value_parser = ["on", "off"])]
        state: Option<String>,
    },

    /// Have the controller print an unsigned 32-bit value
    Print {
        /// Value to print
        value: u32,
    },

    /// Hash a password for the credentials file
    HashPassword {
        /// Password to hash
        password: String,
    },

    /// Manage gateway configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective gateway configuration
    Show {
        /// Configuration file (defaults to the standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Write a default configuration file
    Init {
        /// Where to write (defaults to the standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the default configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let (method, params) = match cli.command {
        Commands::HashPassword { password } => {
            println!("{}", CredentialStore::hash_password(&password));
            return Ok(());
        }
        Commands::Config { action } => return run_config(action),
        Commands::Call { method, params } => (method, params.iter().map(String::as_str).map(parse_param).collect()),
        Commands::On => ("Machine_on".to_string(), Vec::new()),
        Commands::Off => ("Machine_off".to_string(), Vec::new()),
        Commands::State { state } => (
            "machine_state".to_string(),
            state.map(Value::String).into_iter().collect(),
        ),
        Commands::Print { value } => ("print_uint32".to_string(), vec![Value::from(value)]),
    };

    let user = cli
        .user
        .context("No username given (use --user or MC_USER)")?;
    let password = cli
        .password
        .context("No password given (use --password or MC_PASSWORD)")?;

    let mut client = GatewayClient::new(cli.url).with_timeout(Duration::from_secs(cli.timeout));
    if let Err(e) = client.login(&user, &password).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    let reply = match client.call(&method, params).await {
        Ok(reply) => reply,
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };
    let ok = print_reply(&reply, cli.json);

    if let Err(e) = client.logout().await {
        tracing::debug!("Logout failed: {:#}", e);
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Interpret a command-line parameter as JSON, falling back to a string
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { file } => {
            let path = file.unwrap_or_else(config::default_config_path);
            let config: GatewayConfig = if path.exists() {
                config::load_config(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?
            } else {
                print_info(&format!("{} not found, showing defaults", path.display()));
                GatewayConfig::default()
            };
            print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
        }
        ConfigAction::Init { file, force } => {
            let path = file.unwrap_or_else(config::default_config_path);
            if path.exists() && !force {
                print_error(&format!("{} already exists (use --force to overwrite)", path.display()));
                std::process::exit(1);
            }
            config::save_config(&path, &GatewayConfig::default())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote {}", path.display()));
        }
        ConfigAction::Path => {
            println!("{}", config::default_config_path().display());
        }
    }
    Ok(())
}
