use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use formwizard::config::Config;
use formwizard::server::{self, AppState};
use formwizard::wizard::WizardRequest;
use formwizard::{logging, sample};

#[derive(Parser)]
#[command(name = "formwizard")]
#[command(about = "Multi-step form wizard server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the sample wizard over HTTP (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the steps of the sample wizard
    Steps,

    /// Write the effective configuration to a TOML file
    InitConfig {
        /// Output path (default: .formwizard/config.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let logging_handle = logging::init_logging(&config, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Some(Commands::Serve { port }) => cmd_serve(config, port).await?,
        None => cmd_serve(config, None).await?,
        Some(Commands::Steps) => cmd_steps(&config)?,
        Some(Commands::InitConfig { path, force }) => cmd_init_config(&config, path, force)?,
    }

    Ok(())
}

async fn cmd_serve(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = AppState::from_config(config)?;
    server::serve(state).await
}

fn cmd_steps(config: &Config) -> Result<()> {
    let sample = sample::build(&config.wizard)?;
    let wizard = sample.definition.cycle(WizardRequest::fetch(), None)?;

    println!("Wizard steps ({})", wizard.total_steps());
    println!("{}", "─".repeat(40));
    for key in wizard.registry().keys() {
        println!(
            "{:>2}. {:<12} /{}/{}",
            wizard.step_number(key)?,
            key,
            config.wizard.base_route,
            key
        );
    }

    Ok(())
}

fn cmd_init_config(config: &Config, path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(Config::local_config_path);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    config.save_to(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
