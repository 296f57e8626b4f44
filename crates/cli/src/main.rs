mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use fillform_cli::config::{AppConfig, CONFIG_ENV};
use fillform_cli::serve;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// One-time response forms backed by Grist.
#[derive(Parser)]
#[command(name = "fillform", version, about = "One-time response forms backed by Grist")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the form HTTP server
    Serve {
        /// Path to the YAML configuration file
        #[arg(long, env = CONFIG_ENV)]
        config: PathBuf,
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Load and validate a configuration file
    Check {
        /// Path to the YAML configuration file
        #[arg(long, env = CONFIG_ENV)]
        config: PathBuf,
    },

    /// Evaluate a notification predicate against a JSON object
    Predicate {
        /// Predicate source
        expr: String,
        /// Path to a JSON file holding the field bindings
        #[arg(long)]
        data: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve {
            config,
            port,
            bind,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                report_error(
                    "error: --tls-cert and --tls-key must both be provided",
                    cli.output,
                    cli.quiet,
                );
                process::exit(1);
            }
            let config = match AppConfig::load(&config) {
                Ok(config) => config,
                Err(e) => {
                    report_error(&format!("configuration error: {e}"), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(&format!("cannot start runtime: {e}"), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(config, &bind, port, tls_cert, tls_key))
            {
                tracing::error!(error = %e, "server error");
                process::exit(1);
            }
        }
        Commands::Check { config } => {
            commands::check::cmd_check(&config, cli.output, cli.quiet);
        }
        Commands::Predicate { expr, data } => {
            commands::predicate::cmd_predicate(&expr, &data, cli.output, cli.quiet);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
