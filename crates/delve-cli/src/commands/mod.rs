use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use delve_config::{ConfigLoader, DelveConfig, LoggingConfig, WarningSeverity};

mod run;

/// Delve: explore a remote room graph with a fleet of drones
#[derive(Parser)]
#[command(name = "delve", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to delve.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore the graph, assemble the message, and submit the report
    Run {
        /// Give up and cancel after this many seconds (0 waits forever)
        #[arg(short, long, default_value = "0")]
        timeout_secs: u64,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Audit the configuration
    Doctor,
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> delve_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };
        init_tracing(&config.logging, &log_level);

        match self.command {
            Commands::Run { timeout_secs, json } => run::cmd_run(config, timeout_secs, json).await,
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Doctor => Self::cmd_doctor(&config, &config_loader),
            Commands::Version => Self::cmd_version(),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: &DelveConfig, json: bool) -> delve_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config)
                    .map_err(|e| delve_core::DelveError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(config: &DelveConfig, loader: &ConfigLoader) -> delve_core::Result<()> {
        println!("Delve doctor: configuration audit");
        println!("  config file: {}", loader.path().display());
        println!("  api: {}", config.api.base_url);
        println!();

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        };

        let mut warn_count = 0;
        let mut info_count = 0;
        for w in &warnings {
            println!("  {w}");
            match w.severity {
                WarningSeverity::Warning => warn_count += 1,
                WarningSeverity::Info => info_count += 1,
                WarningSeverity::Error => {}
            }
        }

        if warnings.is_empty() {
            println!("  all checks passed");
        } else {
            println!();
            println!("  {warn_count} warnings, {info_count} notes");
        }
        Ok(())
    }

    fn cmd_version() -> delve_core::Result<()> {
        println!("delve v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> delve_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "delve", &mut std::io::stdout());
        Ok(())
    }
}

/// Logs go to stderr so that `run --json` keeps stdout machine-readable.
fn init_tracing(logging: &LoggingConfig, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().with_target(false).init(),
        _ => builder.with_target(false).init(),
    }
}
