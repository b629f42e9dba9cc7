use clap::{Parser, Subcommand};
use satellite_cli::commands::{
    self, ArchivesCommands, DatabaseCommands, MetadataCommands, NhddCommands, UploadCommands,
};
use satellite_cli::output::OutputFormat;
use satellite_core::config::Config;
use satellite_server::AppState;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "satellite")]
#[command(about = "Integrity scanning, bulk upload, metadata enrichment and dedup for an LRR archive")]
#[command(version, long_about = None)]
struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive scan/integrity commands.
    Archives {
        #[command(subcommand)]
        command: ArchivesCommands,
    },
    /// Bulk upload commands.
    Upload {
        #[command(subcommand)]
        command: UploadCommands,
    },
    /// Metadata enrichment commands.
    Metadata {
        #[command(subcommand)]
        command: MetadataCommands,
    },
    /// Perceptual-embedding dedup commands.
    Nhdd {
        #[command(subcommand)]
        command: NhddCommands,
    },
    /// C1 job-store table maintenance.
    Database {
        #[command(subcommand)]
        command: DatabaseCommands,
    },
    /// Run the HTTP front-end.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    if matches!(cli.command, Commands::Serve) {
        let state = Arc::new(AppState::build(config).await?);
        let app = satellite_server::router(state)
            .layer(tower_http::trace::TraceLayer::new_for_http());
        let port = std::env::var("PORT").unwrap_or_else(|_| "7700".into());
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        tracing::info!(addr = %listener.local_addr()?, "satellite-server listening");
        axum::serve(listener, app).await?;
        return Ok(());
    }

    let state = AppState::build(config).await?;

    match cli.command {
        Commands::Archives { command } => commands::handle_archives(command, &state, cli.format).await?,
        Commands::Upload { command } => commands::handle_upload(command, &state, cli.format).await?,
        Commands::Metadata { command } => commands::handle_metadata(command, &state, cli.format).await?,
        Commands::Nhdd { command } => commands::handle_nhdd(command, &state, cli.format).await?,
        Commands::Database { command } => commands::handle_database(command, &state, cli.format).await?,
        Commands::Serve => unreachable!("handled above"),
    }

    Ok(())
}
