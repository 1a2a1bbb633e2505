//! tool-router CLI.
//!
//! `index` runs the offline indexing pipeline over the servers-config file;
//! `serve` runs the `semantic_router` MCP server on stdio or HTTP.
//!
//! Exit codes: 0 success, 2 configuration error, 3 partial indexing
//! failure, 4 transport error, 1 anything else.

use clap::{Parser, Subcommand, ValueEnum};
use router_content_store::ContentStore;
use router_indexer::{IndexOutcome, SessionToolSource, ToolIndexer};
use router_llm::{Describer, Embedder, OpenAiClient, OpenAiConfig, Vision};
use router_mcp_server::{serve_http, serve_stdio, ResultProcessor, RouterService, ToolExecutor};
use router_protocol::{load_servers_config, ServersConfig, Settings};
use router_supervisor::{RmcpSessionFactory, ServerSupervisor};
use router_task_pool::TaskPool;
use router_vector_store::{EmbeddedStore, QdrantStore, VectorStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const EXIT_CONFIG: u8 = 2;
const EXIT_PARTIAL_INDEX: u8 = 3;
const EXIT_TRANSPORT: u8 = 4;

#[derive(Parser)]
#[command(name = "tool-router")]
#[command(about = "Semantic router and lifecycle manager for MCP ecosystems", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index all non-ignored servers for semantic search
    Index {
        /// Path to the servers-config file
        #[arg(long)]
        config: PathBuf,

        /// Re-index servers even when records already exist
        #[arg(long)]
        force: bool,
    },

    /// Run the semantic_router MCP server
    Serve {
        /// Path to the servers-config file
        #[arg(long)]
        config: PathBuf,

        #[arg(long, value_enum, default_value_t = Transport::Http)]
        transport: Transport,

        /// Host for HTTP transport
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for HTTP transport
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Http,
    Stdio,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout belongs to the MCP protocol in stdio mode; logs go to stderr
    // in every mode so behavior stays uniform.
    let default_filter = match &cli.command {
        Commands::Index { .. } => "info",
        Commands::Serve { .. } => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Commands::Index { config, force } => run_index(config, force).await,
        Commands::Serve {
            config,
            transport,
            host,
            port,
        } => run_serve(config, transport, host, port).await,
    }
}

fn load_inputs(config_path: &PathBuf) -> Result<(Settings, ServersConfig), ExitCode> {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Err(ExitCode::from(EXIT_CONFIG));
        }
    };
    let config = match load_servers_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Err(ExitCode::from(EXIT_CONFIG));
        }
    };
    Ok((settings, config))
}

async fn build_vector_store(settings: &Settings) -> anyhow::Result<Arc<dyn VectorStore>> {
    if let Some(url) = &settings.qdrant_url {
        let store = QdrantStore::connect(url, settings.collection_name.clone())?;
        return Ok(Arc::new(store));
    }
    let path = settings
        .qdrant_storage_path
        .as_ref()
        .expect("settings guarantee one vector-store location");
    let store = EmbeddedStore::open(path).await?;
    Ok(Arc::new(store))
}

fn build_llm(settings: &Settings) -> anyhow::Result<Arc<OpenAiClient>> {
    Ok(Arc::new(OpenAiClient::new(OpenAiConfig {
        api_key: settings.openai_api_key.clone(),
        base_url: settings.openai_base_url.clone(),
        embedding_model: settings.embedding_model.clone(),
        descriptor_model: settings.descriptor_model.clone(),
        vision_model: settings.vision_model.clone(),
        dimensions: settings.dimensions,
    })?))
}

async fn run_index(config_path: PathBuf, force: bool) -> ExitCode {
    let (settings, config) = match load_inputs(&config_path) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };

    let result = async {
        let store = build_vector_store(&settings).await?;
        let llm = build_llm(&settings)?;
        let embedder: Arc<dyn Embedder> = llm.clone();
        let describer: Arc<dyn Describer> = llm;
        let indexer = ToolIndexer::new(
            store,
            embedder,
            Some(describer),
            Arc::new(SessionToolSource),
        );
        anyhow::Ok(indexer.index(&config.active_servers(), force).await?)
    }
    .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("indexing failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    for (server, outcome) in &report.outcomes {
        match outcome {
            IndexOutcome::Indexed {
                tools,
                stale_removed,
            } => println!("{server}: indexed {tools} tools ({stale_removed} stale removed)"),
            IndexOutcome::Skipped => println!("{server}: already indexed, skipped"),
            IndexOutcome::Failed { reason } => println!("{server}: FAILED ({reason})"),
        }
    }
    for (server, tool, reason) in &report.tool_failures {
        println!("{server}.{tool}: skipped ({reason})");
    }

    if report.has_failures() {
        ExitCode::from(EXIT_PARTIAL_INDEX)
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_serve(
    config_path: PathBuf,
    transport: Transport,
    host: String,
    port: u16,
) -> ExitCode {
    let (settings, config) = match load_inputs(&config_path) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };

    let built = async {
        let store = build_vector_store(&settings).await?;
        let llm = build_llm(&settings)?;
        let embedder: Arc<dyn Embedder> = llm.clone();
        let describer: Arc<dyn Describer> = llm.clone();
        let vision: Option<Arc<dyn Vision>> = if settings.describe_images {
            Some(llm)
        } else {
            None
        };

        let content = ContentStore::new(&settings.content_storage_path, settings.max_result_tokens)
            .await?;
        let content = Arc::new(content);

        let supervisor = ServerSupervisor::new(
            config.mcp_servers.clone(),
            Arc::new(RmcpSessionFactory),
            Duration::from_secs(settings.idle_ttl_seconds),
        );
        let sweeper = supervisor.spawn_sweeper();

        let processor = Arc::new(ResultProcessor::new(content.clone(), vision));
        let executor = Arc::new(ToolExecutor::new(
            supervisor.clone(),
            store.clone(),
            processor,
            Duration::from_secs(settings.call_timeout_seconds),
        ));
        let tasks = TaskPool::start(
            executor.clone(),
            settings.task_pool_workers,
            settings.task_queue_size,
        );

        let service = RouterService::new(
            Arc::new(config),
            store,
            embedder,
            Some(describer),
            supervisor.clone(),
            tasks.clone(),
            content,
            executor,
        );
        anyhow::Ok((service, supervisor, tasks, sweeper))
    }
    .await;

    let (service, supervisor, tasks, sweeper) = match built {
        Ok(built) => built,
        Err(e) => {
            eprintln!("startup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let served = match transport {
        Transport::Stdio => serve_stdio(service).await,
        Transport::Http => serve_http(service, &host, port).await,
    };

    // Orderly teardown: cancel queued tasks, then close every session.
    tasks.shutdown().await;
    supervisor.shutdown_all().await;
    sweeper.abort();

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("transport error: {e:#}");
            ExitCode::from(EXIT_TRANSPORT)
        }
    }
}
