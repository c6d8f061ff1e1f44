use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ltipass::config::LtipassConfig;
use ltipass::logging::init_logging;

mod cmd;

#[derive(Parser)]
#[command(name = "ltipass")]
#[command(version, about = "Carry LTI launch parameters from the hub to notebook servers")]
pub struct Cli {
    /// Path to ltipass.toml
    #[arg(long, global = true, env = "LTIPASS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session database path. Overrides [store] path.
    #[arg(long, global = true, env = "LTIPASS_DB")]
    pub db: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the session database
    Init,
    /// Record a verified launch from a JSON object of launch parameters
    Record {
        /// oauth_consumer_key of the launch
        #[arg(long)]
        consumer_key: String,
        /// JSON file with the launch parameters ("-" for stdin)
        #[arg(long, default_value = "-")]
        params: PathBuf,
    },
    /// Resolve the LTI context of a notebook path
    Resolve {
        #[arg(short, long)]
        user: String,
        /// Print template variables as KEY=VALUE instead of JSON
        #[arg(long)]
        vars: bool,
        path: String,
    },
    /// List recorded sessions
    Sessions {
        #[arg(short, long)]
        user: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report a grade for a notebook back to the LMS
    Grade {
        #[arg(short, long)]
        user: String,
        /// Score between 0.0 and 1.0
        #[arg(short, long)]
        score: f64,
        path: String,
    },
    /// Run a command with a session's launch parameters in its environment
    Exec {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        resource_link_id: String,
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Print the launch parameters visible in this process's environment
    Env,
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default ltipass.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.command {
        // The file may not exist yet.
        Commands::Config {
            command: Some(ConfigCommands::Init { .. }),
        } => LtipassConfig::default(),
        _ => LtipassConfig::load_or_default(cli.config.as_deref())
            .context("Failed to load configuration")?,
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    init_logging(&config.logging, cli.verbose)?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Record {
            consumer_key,
            params,
        } => cmd::cmd_record(&config, consumer_key, params)?,
        Commands::Resolve { user, vars, path } => cmd::cmd_resolve(&config, user, path, *vars)?,
        Commands::Sessions { user, json } => cmd::cmd_sessions(&config, user.as_deref(), *json)?,
        Commands::Grade { user, score, path } => {
            cmd::cmd_grade(&config, user, path, *score).await?
        }
        Commands::Exec {
            user,
            resource_link_id,
            command,
        } => {
            let code = cmd::cmd_exec(&config, user, resource_link_id, command).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Env => cmd::cmd_env(&config),
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            cmd::cmd_serve(&config).await?
        }
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command.clone())?
        }
    }

    Ok(())
}
