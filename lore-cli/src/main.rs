use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lore_cli::{ProviderSettings, entity_table, read_document, read_nodes, retry_policy};
use lore_rag::openai::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, OPENAI_API_BASE};
use lore_rag::{
    CancellationToken, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_QUERY,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_K, DEFAULT_TOP_P, IndexRequest, MalformedOutputPolicy,
    QueryRequest, RagConfig, RagPipeline, Synthesis, retrieve_and_query, split_and_embed,
};
use lore_telemetry::{LogFormat, init_telemetry};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "lore", about = "Extract characters and other entities from plain-text documents", version)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    /// Log output format (pretty or json)
    #[arg(long, global = true, env = "LORE_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Total attempts per provider call, including the first
    #[arg(long, global = true, default_value_t = 3)]
    max_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ProviderArgs {
    /// API key for the OpenAI-compatible endpoint
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, global = true, env = "LORE_API_BASE", default_value = OPENAI_API_BASE)]
    api_base: String,

    /// Embedding model name
    #[arg(long, global = true, env = "LORE_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model name
    #[arg(long, global = true, env = "LORE_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Request embeddings of this width (models that support shortening)
    #[arg(long, global = true, env = "LORE_EMBEDDING_DIMENSIONS")]
    dimensions: Option<usize>,

    /// Use deterministic local providers instead of the API
    #[arg(long, global = true)]
    offline: bool,
}

impl From<ProviderArgs> for ProviderSettings {
    fn from(args: ProviderArgs) -> Self {
        Self {
            api_key: args.api_key,
            api_base: args.api_base,
            embedding_model: args.embedding_model,
            chat_model: args.chat_model,
            embedding_dimensions: args.dimensions,
            offline: args.offline,
        }
    }
}

#[derive(Args)]
struct ChunkArgs {
    /// Window size in tokens
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Tokens shared by consecutive windows
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,
}

#[derive(Args)]
struct SamplingArgs {
    /// Number of chunks passed to the model
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    #[arg(long, default_value_t = DEFAULT_TOP_P)]
    top_p: f32,
}

#[derive(Subcommand)]
enum Command {
    /// Split a document into chunks and embed them
    Index {
        /// UTF-8 text file, or - for stdin
        file: PathBuf,
        #[command(flatten)]
        chunking: ChunkArgs,
        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Answer a query from a node set written by `lore index`
    Query {
        /// Node set file, or - for stdin
        #[arg(long)]
        nodes: PathBuf,
        #[arg(long, default_value = DEFAULT_QUERY)]
        query: String,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Report a reply that is not an entity list as an error
        #[arg(long)]
        strict: bool,
    },

    /// Index a document and list its main characters
    Extract {
        /// UTF-8 text file, or - for stdin
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_QUERY)]
        query: String,
        #[command(flatten)]
        chunking: ChunkArgs,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_telemetry("lore", cli.log_format) {
        eprintln!("warning: logging disabled: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "lore failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = ProviderSettings::from(cli.provider);
    let pipeline = settings.build_pipeline(retry_policy(cli.max_attempts))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Index { file, chunking, output } => {
            let document = read_document(&file).await?;
            let request = IndexRequest {
                document,
                chunk_size: chunking.chunk_size,
                chunk_overlap: chunking.chunk_overlap,
            };
            let response = split_and_embed(&pipeline, request, &cancel).await;
            emit(&response, output.as_ref()).await?;
            Ok(exit_code(response.is_error()))
        }
        Command::Query { nodes, query, sampling, strict } => {
            let nodes = read_nodes(&nodes).await?;
            let request = QueryRequest {
                query,
                nodes_with_embedding: nodes,
                top_k: sampling.top_k,
                temperature: sampling.temperature,
                top_p: sampling.top_p,
            };
            let policy =
                if strict { MalformedOutputPolicy::Strict } else { MalformedOutputPolicy::Degrade };
            let response = retrieve_and_query(&pipeline, request, policy, &cancel).await;
            emit(&response, None).await?;
            Ok(exit_code(response.is_error()))
        }
        Command::Extract { file, query, chunking, sampling, json } => {
            let document = read_document(&file).await?;
            let config = RagConfig::builder()
                .chunk_size(chunking.chunk_size)
                .chunk_overlap(chunking.chunk_overlap)
                .top_k(sampling.top_k)
                .temperature(sampling.temperature)
                .top_p(sampling.top_p)
                .build()?;
            extract(&pipeline, &document, &query, &config, json, &cancel).await
        }
    }
}

async fn extract(
    pipeline: &RagPipeline,
    document: &str,
    query: &str,
    config: &RagConfig,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let synthesis = pipeline.extract(document, query, config, cancel).await?;
    match synthesis {
        Synthesis::Entities(entities) if json => {
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        Synthesis::Entities(entities) => print!("{}", entity_table(&entities)),
        Synthesis::Malformed { raw } => {
            eprintln!("The model did not return an entity list. Its answer was:");
            println!("{raw}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn emit<T: Serialize>(value: &T, output: Option<&PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => tokio::fs::write(path, format!("{json}\n"))
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn exit_code(is_error: bool) -> ExitCode {
    if is_error { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
