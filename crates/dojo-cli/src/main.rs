//! Dojo CLI - command-line interface for Agent Dojo integrations.
//!
//! Reuses the same core domain logic (dojo-core) and server bootstrap
//! (dojo-server) that power the web UI.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use dojo_cli::commands;
use dojo_cli::commands::tools::SchemaSide;
use dojo_core::composio::client::DEFAULT_BASE_URL;
use dojo_core::composio::ComposioConfig;
use dojo_core::remote::DEFAULT_SERVER_URL;

/// Agent Dojo CLI - connect toolkits and inspect their tools
#[derive(Parser)]
#[command(name = "dojo", version, about = "Agent Dojo CLI - connect toolkits and inspect their tools")]
pub struct Cli {
    /// URL of a running Dojo server (used by every command except `server`)
    #[arg(long, env = "DOJO_SERVER_URL", default_value = DEFAULT_SERVER_URL, global = true)]
    server: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Agent Dojo HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// Path to the SQLite database file
        #[arg(long, env = "DOJO_DB_PATH", default_value = "dojo.db")]
        db: String,
        /// Composio API key; integration routes answer 503 without one
        #[arg(long, env = "COMPOSIO_API_KEY", hide_env_values = true)]
        composio_api_key: Option<String>,
        /// Composio API base URL
        #[arg(long, env = "COMPOSIO_BASE_URL", default_value = DEFAULT_BASE_URL)]
        composio_base_url: String,
        /// Path to static frontend directory
        #[arg(long)]
        static_dir: Option<String>,
    },

    /// List connectable toolkits
    Toolkits {
        /// Case-insensitive search over name, description and slug
        #[arg(long)]
        search: Option<String>,
        /// Only toolkits in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Browse a toolkit's tools
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },

    /// Connect a toolkit for a user (OAuth)
    Connect {
        /// Toolkit slug (e.g. "gmail")
        #[arg(long)]
        toolkit: String,
        /// User the connection belongs to
        #[arg(long)]
        user: String,
        /// Give up after this many seconds (0 waits indefinitely)
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },

    /// Inspect connections
    Connections {
        #[command(subcommand)]
        action: ConnectionsAction,
    },

    /// Remove a connection
    Disconnect {
        /// Connection ID
        #[arg(long)]
        id: String,
    },

    /// Execute a tool on behalf of a user
    Execute {
        /// Tool slug (e.g. "GMAIL_SEND_EMAIL")
        #[arg(long)]
        tool: String,
        /// User whose connection is used
        #[arg(long)]
        user: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    /// List the tools in a toolkit
    List {
        #[arg(long)]
        toolkit: String,
    },
    /// Show a tool's parameter schema as a collapsible tree
    Show {
        #[arg(long)]
        toolkit: String,
        #[arg(long)]
        tool: String,
        /// Which parameter block to render
        #[arg(long, value_enum, default_value = "input")]
        output: SchemaSide,
        /// Expand the property at this path (repeatable, e.g. `body` or `attendees[].address`)
        #[arg(long)]
        expand: Vec<String>,
        /// Expand every nested property
        #[arg(long)]
        expand_all: bool,
    },
}

#[derive(Subcommand)]
enum ConnectionsAction {
    /// List a user's active connections
    List {
        #[arg(long)]
        user: String,
    },
    /// Check the status of one connection
    Status {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dojo_core=warn,dojo_server=warn,dojo_cli=info".into()),
        )
        .init();

    let result = match cli.command {
        Some(Commands::Server {
            host,
            port,
            db,
            composio_api_key,
            composio_base_url,
            static_dir,
        }) => {
            let composio = composio_api_key
                .filter(|key| !key.trim().is_empty())
                .map(|key| ComposioConfig::new(key).with_base_url(composio_base_url));
            commands::server::run(host, port, db, composio, static_dir).await
        }
        Some(command) => run_client_command(&cli.server, command).await,
        None => {
            // No subcommand - show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_client_command(server: &str, command: Commands) -> Result<(), String> {
    let client = commands::client(server)?;

    match command {
        Commands::Toolkits { search, category } => {
            commands::toolkits::list(&client, search.as_deref(), category.as_deref()).await
        }
        Commands::Tools { action } => match action {
            ToolsAction::List { toolkit } => commands::tools::list(&client, &toolkit).await,
            ToolsAction::Show {
                toolkit,
                tool,
                output,
                expand,
                expand_all,
            } => commands::tools::show(&client, &toolkit, &tool, output, &expand, expand_all).await,
        },
        Commands::Connect {
            toolkit,
            user,
            timeout_secs,
        } => commands::connect::run(Arc::new(client), &toolkit, &user, timeout_secs).await,
        Commands::Connections { action } => match action {
            ConnectionsAction::List { user } => commands::connections::list(&client, &user).await,
            ConnectionsAction::Status { id } => commands::connections::status(&client, &id).await,
        },
        Commands::Disconnect { id } => commands::connections::disconnect(&client, &id).await,
        Commands::Execute { tool, user, params } => {
            commands::execute::run(&client, &tool, &user, &params).await
        }
        Commands::Server { .. } => Err("`server` is not a client command".to_string()),
    }
}
