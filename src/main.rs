use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use azure_search_mcp::backend::{AzureSearchBackend, MemoryBackend, SearchBackend};
use azure_search_mcp::config::{
    CompositeConfigProvider, EnvConfigProvider, MemoryConfigProvider, ServerConfig, keys,
};
use azure_search_mcp::dispatch::RequestDispatcher;
use azure_search_mcp::observability::{DEFAULT_LOG_FILTER, init_tracing};
use azure_search_mcp::protocol::McpService;
use azure_search_mcp::session::ConnectionManager;
use azure_search_mcp::tools::ToolRegistry;
use azure_search_mcp::transport::stdio::{StdioOptions, serve_stdio};
use azure_search_mcp::transport::{AppState, serve_http};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// SSE sessions and streamable HTTP.
    Http,
    /// Newline-delimited JSON on stdin/stdout.
    Stdio,
}

#[derive(Parser, Debug)]
#[command(name = "azure-search-mcp", version, about)]
struct Cli {
    #[arg(long, value_enum, default_value = "http")]
    transport: Transport,

    /// Overrides MCP_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Overrides MCP_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Serve an empty in-memory index instead of Azure AI Search.
    #[arg(long)]
    memory_backend: bool,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    log_level: String,
}

#[tokio::main]
async fn main() -> azure_search_mcp::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let provider = CompositeConfigProvider::new()
        .provider(
            MemoryConfigProvider::named("cli")
                .value_opt(keys::HOST, cli.host.clone())
                .value_opt(keys::PORT, cli.port),
        )
        .provider(EnvConfigProvider::new());
    let config = ServerConfig::load(&provider).await?;

    let backend: Arc<dyn SearchBackend> = if cli.memory_backend {
        tracing::warn!("Using the in-memory backend; no Azure AI Search service is contacted");
        Arc::new(MemoryBackend::new())
    } else {
        let azure = config.search.azure(config.call_timeout)?;
        tracing::info!(endpoint = %azure.endpoint, "Using Azure AI Search");
        Arc::new(AzureSearchBackend::new(azure)?)
    };

    let registry = Arc::new(ToolRegistry::search_tools()?);
    tracing::info!(tools = ?registry.names(), "Registered tools");

    let dispatcher = RequestDispatcher::new(registry, backend).call_timeout(config.call_timeout);
    let service = Arc::new(McpService::new(dispatcher));

    match cli.transport {
        Transport::Stdio => {
            let options = StdioOptions {
                limits: config.pipeline_limits(),
                flush_deadline: config.flush_deadline,
            };
            serve_stdio(service, options).await?;
        }
        Transport::Http => {
            let sessions = ConnectionManager::with_limits(
                Arc::clone(&service),
                config.pipeline_limits(),
                config.idle_timeout,
            );
            let shutdown = CancellationToken::new();
            let reaper = sessions.spawn_reaper(config.reaper_interval, shutdown.clone());

            let signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for ctrl-c");
                    return;
                }
                tracing::info!("Received ctrl-c");
                signal.cancel();
            });

            let state = AppState::new(service, sessions)
                .keep_alive(config.keep_alive)
                .flush_deadline(config.flush_deadline);
            let result = serve_http(config.socket_addr()?, state, shutdown.clone()).await;

            shutdown.cancel();
            if let Err(e) = reaper.await {
                tracing::warn!(error = %e, "Idle reaper task failed");
            }
            result?;
        }
    }

    Ok(())
}
