use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use rmcp::{ServerHandler, ServiceExt};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService,
    session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;

use courier_core::config::{FileConfig, SlackConfig, SqliteConfig};
use courier_core::db::Database;
use courier_core::mcp::{MasatoraServer, SlackServer, SqliteServer};
use courier_core::slack::SlackClient;

#[derive(Parser)]
#[command(name = "courier", about = "MCP adapter servers for Slack, SQLite and a toy translator")]
struct Cli {
    #[command(subcommand)]
    server: ServerCommand,

    /// Run HTTP MCP server instead of stdio
    #[arg(long, global = true)]
    http: bool,

    /// HTTP port (only with --http)
    #[arg(long, default_value = "3100", global = true)]
    port: u16,

    /// Config file (default: ~/.courier/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Slack workspace: channels, users, history, threads, message context
    Slack {
        /// Bot token (xoxb-...)
        #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,
        /// Workspace (team) ID
        #[arg(long, env = "SLACK_TEAM_ID")]
        team_id: Option<String>,
        /// Web API base URL
        #[arg(long, env = "SLACK_API_BASE")]
        api_base: Option<String>,
    },
    /// Read-only SQL access to a SQLite database file
    Sqlite {
        /// Path to the database file
        #[arg(env = "SQLITE_DATABASE")]
        database: Option<PathBuf>,
    },
    /// The masatora translator
    Masatora,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("courier=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file_config = FileConfig::load(cli.config.as_deref())?;
    let http_port = cli.http.then_some(cli.port);

    match cli.server {
        ServerCommand::Slack {
            bot_token,
            team_id,
            api_base,
        } => {
            let config = SlackConfig::resolve(file_config.slack, bot_token, team_id, api_base)?;
            tracing::info!(team_id = %config.team_id, api_base = %config.api_base, "starting slack server");
            let client = SlackClient::new(&config);
            serve(move || SlackServer::new(client.clone()), http_port).await
        }
        ServerCommand::Sqlite { database } => {
            let config = SqliteConfig::resolve(file_config.sqlite, database)?;
            tracing::info!(db = %config.path.display(), "opening database");
            let db = Arc::new(Mutex::new(Database::open_read_only(&config.path)?));
            serve(move || SqliteServer::new(Arc::clone(&db)), http_port).await
        }
        ServerCommand::Masatora => {
            tracing::info!("starting masatora server");
            serve(MasatoraServer::new, http_port).await
        }
    }
}

/// Serve over streamable HTTP when a port is given, otherwise over stdio.
/// `make` builds one handler per session.
async fn serve<S, F>(make: F, http_port: Option<u16>) -> anyhow::Result<()>
where
    S: ServerHandler,
    F: Fn() -> S + Send + Sync + 'static,
{
    let Some(port) = http_port else {
        tracing::info!("serving MCP over stdio");
        let running = make().serve(rmcp::transport::stdio()).await?;
        running.waiting().await?;
        return Ok(());
    };

    let ct = CancellationToken::new();
    let service: StreamableHttpService<S, LocalSessionManager> = StreamableHttpService::new(
        move || Ok(make()),
        Default::default(),
        StreamableHttpServerConfig {
            stateful_mode: true,
            cancellation_token: ct.child_token(),
            ..Default::default()
        },
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let bind_addr = format!("127.0.0.1:{port}");
    let tcp_listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "serving MCP over HTTP");

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for CTRL+C");
            }
            tracing::info!("shutting down HTTP MCP server");
            ct.cancel();
        })
        .await?;

    Ok(())
}
