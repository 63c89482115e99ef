mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rhtmx_nav::NavConfig;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rhtmx-nav")]
#[command(version, about = "RHTMX navigation tools - resolve routes, dry-run navigations, validate route configs", long_about = None)]
struct Cli {
    /// Config file (default: rhtmx-nav.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Route config to use instead of the one in the config file
    #[arg(short, long, global = true)]
    routes: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the route, params, component and sections a path resolves to
    Resolve {
        /// Navigation target, e.g. /profile/alice
        path: String,

        /// Role used for sections and components
        #[arg(long)]
        role: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run a full navigation against the files on disk
    Navigate {
        /// Navigation target
        path: String,

        /// Treat the user as signed in
        #[arg(short, long)]
        authenticated: bool,

        /// User role
        #[arg(long)]
        role: Option<String>,

        /// Profile flag set to true, e.g. --flag onboardingPassed (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,

        /// Preferred platform language, e.g. vi-VN
        #[arg(long)]
        language: Option<String>,
    },

    /// Check the route config for errors and warnings
    Validate {
        /// Exit with an error when there are warnings too
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::load_default()?,
    };
    if let Some(routes) = &cli.routes {
        config.routes.path = routes.display().to_string();
    }
    debug!(routes = %config.routes.path, manifest = %config.manifest.path, "Configuration loaded");

    // Execute command
    match cli.command {
        Commands::Resolve { path, role, json } => {
            commands::resolve::execute(&config, &path, role.as_deref(), json)?;
        }
        Commands::Navigate {
            path,
            authenticated,
            role,
            flags,
            language,
        } => {
            let request = commands::navigate::NavigateRequest {
                path,
                authenticated,
                role,
                flags,
                language,
            };
            commands::navigate::execute(config, request)?;
        }
        Commands::Validate { strict } => {
            commands::validate::execute(&config, strict)?;
        }
    }

    Ok(())
}
