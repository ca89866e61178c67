//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use fdrz_core::api::WorkflowStatus;
use fdrz_core::config;

mod commands;

#[derive(Parser)]
#[command(name = "fdrz")]
#[command(version = "0.1")]
#[command(about = "FDRZ workflow client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in (Microsoft account by default)
    Login {
        /// Reuse the cached account without opening a browser when possible
        #[arg(long, conflicts_with = "username")]
        silent: bool,
        /// Sign in with a username instead of a Microsoft account
        #[arg(long, value_name = "EMAIL")]
        username: Option<String>,
        /// Password for --username (prompted when omitted)
        #[arg(long, requires = "username")]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the current session
    Status,

    /// Print the raw session token
    Token,

    /// Exchange the session token for a fresh one
    Refresh,

    /// Browse and edit workflows
    Workflows {
        #[command(subcommand)]
        command: WorkflowCommands,
    },

    /// User profiles
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum WorkflowCommands {
    /// Lists workflows
    List {
        /// Only workflows whose name or description contains this text
        #[arg(long, short)]
        search: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Shows one workflow
    Show {
        #[arg(value_name = "WORKFLOW_ID")]
        id: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Creates a workflow
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// active, completed or pending
        #[arg(long)]
        status: Option<WorkflowStatus>,
    },
    /// Updates fields of a workflow
    Update {
        #[arg(value_name = "WORKFLOW_ID")]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// active, completed or pending
        #[arg(long)]
        status: Option<WorkflowStatus>,
    },
    /// Deletes a workflow
    Delete {
        #[arg(value_name = "WORKFLOW_ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum UserCommands {
    /// Shows your profile
    Me,
    /// Lists users
    List,
    /// Updates your profile
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    // Config commands work even when the config file is broken.
    if let Commands::Config { command } = cli.command {
        return run_config(command);
    }

    let config = config::Config::load()
        .context("load config")?
        .resolved()
        .context("resolve config")?;
    let home = config::paths::fdrz_home();
    let _log_guard = fdrz_core::logging::init(&config.log, &home).context("init logging")?;
    let app = commands::App::new(config, &home)?;

    match cli.command {
        Commands::Login {
            silent,
            username,
            password,
        } => match username {
            Some(username) => commands::auth::login_password(&app, &username, password).await,
            None if silent => commands::auth::login_silent(&app).await,
            None => commands::auth::login(&app).await,
        },
        Commands::Logout => commands::auth::logout(&app).await,
        Commands::Status => commands::auth::status(&app).await,
        Commands::Token => commands::auth::token(&app).await,
        Commands::Refresh => commands::auth::refresh(&app).await,

        Commands::Workflows { command } => match command {
            WorkflowCommands::List { search, json } => {
                commands::workflows::list(&app, search.as_deref(), json).await
            }
            WorkflowCommands::Show { id, json } => commands::workflows::show(&app, &id, json).await,
            WorkflowCommands::Create {
                name,
                description,
                status,
            } => commands::workflows::create(&app, name, description, status).await,
            WorkflowCommands::Update {
                id,
                name,
                description,
                status,
            } => commands::workflows::update(&app, &id, name, description, status).await,
            WorkflowCommands::Delete { id } => commands::workflows::delete(&app, &id).await,
        },

        Commands::Users { command } => match command {
            UserCommands::Me => commands::users::me(&app).await,
            UserCommands::List => commands::users::list(&app).await,
            UserCommands::Update { name, department } => {
                commands::users::update(&app, name, department).await
            }
        },

        Commands::Config { command } => run_config(command),
    }
}

fn run_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            commands::config::path();
            Ok(())
        }
        ConfigCommands::Init => commands::config::init(),
        ConfigCommands::Generate => commands::config::generate(),
    }
}
