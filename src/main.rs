use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use clap::Parser;
use anyhow::{Result, Context};
use tracing::{info, error, warn, Level};
use tracing_subscriber::FmtSubscriber;
use tellerai::agent::IntentEngine;
use tellerai::llm::{fetch_available_models, BackendCache, DefaultFactory, LlmConfig};
use tellerai::store::{MemoryQueryStore, QueryId, QueryMetadata, QueryStore};
use tellerai::Intent;

/// Banking assistant: classifies queries into intents and answers them with an LLM
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend identity (local-small, local-large, hosted)
    #[arg(short, long, default_value = "local-large")]
    model: String,

    /// Answer a single query and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Local inference server URL (default: http://localhost:1234/v1)
    #[arg(long)]
    llm_url: Option<String>,

    /// Hosted API key (defaults to OPENAI_API_KEY)
    #[arg(long)]
    llm_key: Option<String>,

    /// Directory searched for model weights (repeatable, tried in order)
    #[arg(long)]
    model_dir: Vec<PathBuf>,

    /// Generation time budget in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// List the models served by the local inference server and exit
    #[arg(long)]
    list_models: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level)?;

    let llm_config = setup_llm_config(&args);

    if args.list_models {
        return list_models(&llm_config).await;
    }

    let cache = BackendCache::new(Arc::new(DefaultFactory::new(llm_config)));
    let engine = IntentEngine::new(&args.model, &cache)
        .await
        .context("Failed to start the intent engine")?;

    if engine.is_degraded() {
        warn!("Requested backend '{}' unavailable, answering with {}", args.model, engine.active_identity());
    }
    info!("Active backend:\n{}", engine.describe_backend());

    let mut store = MemoryQueryStore::new();

    match &args.query {
        Some(query) => {
            handle_query(&engine, &mut store, query).await?;
        }
        None => run_session(&engine, &mut store).await?,
    }

    Ok(())
}

fn setup_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::LocalTime::rfc_3339())
        .with_level(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;

    Ok(())
}

fn setup_llm_config(args: &Args) -> LlmConfig {
    let mut config = LlmConfig::from_env();

    if let Some(url) = &args.llm_url {
        config.local_url = url.clone();
    }
    if args.llm_key.is_some() {
        config = config.with_api_key(args.llm_key.clone());
    }
    if !args.model_dir.is_empty() {
        config.model_dirs = args.model_dir.clone();
    }
    if let Some(secs) = args.timeout {
        config.timeout = Duration::from_secs(secs);
    }

    config
}

async fn list_models(config: &LlmConfig) -> Result<()> {
    let client = reqwest::Client::new();
    let models = fetch_available_models(&client, &config.local_url, None)
        .await
        .context("Failed to fetch available models")?;

    if models.is_empty() {
        println!("No models served at {}", config.local_url);
        return Ok(());
    }

    println!("\nAvailable models:");
    for (i, model) in models.iter().enumerate() {
        println!("{}. {}", i + 1, model);
    }
    Ok(())
}

async fn handle_query(
    engine: &IntentEngine,
    store: &mut MemoryQueryStore,
    query: &str,
) -> Result<QueryId> {
    let started = Instant::now();
    let result = engine.answer(query).await;
    let sentiment = engine.analyze_sentiment(query).await;

    let metadata = QueryMetadata {
        sentiment,
        model: result.metadata().model,
        resolution_time: started.elapsed(),
        follow_up_required: result.metadata().outcome.is_fallback(),
    };
    let id = store
        .record_query(query, result.intent(), result.response(), metadata)
        .context("Failed to record query")?;

    println!("\n\x1b[1;36mIntent:\x1b[0m \x1b[1;33m{}\x1b[0m  \x1b[1;34m[{}]\x1b[0m", result.intent(), sentiment);
    println!("{}", result.response());
    if result.intent() == Intent::Error {
        println!("\x1b[1;35mNote: the assistant is currently unavailable\x1b[0m");
    }

    Ok(id)
}

async fn run_session(engine: &IntentEngine, store: &mut MemoryQueryStore) -> Result<()> {
    println!("Ask a banking question. Use :rate <1-5> to rate the last answer, :quit to leave.");

    let stdin = io::stdin();
    let mut last: Option<QueryId> = None;

    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();

        if line == ":quit" {
            break;
        }

        if let Some(rating) = line.strip_prefix(":rate") {
            match (last, rating.trim().parse::<u8>()) {
                (Some(id), Ok(rating)) => match store.update_rating(id, rating) {
                    Ok(()) => println!("Thanks for the feedback!"),
                    Err(e) => error!("Could not save rating: {}", e),
                },
                (None, _) => println!("Nothing to rate yet."),
                (_, Err(_)) => println!("Usage: :rate <1-5>"),
            }
            continue;
        }

        last = Some(handle_query(engine, store, line).await?);
    }

    info!("Session ended after {} queries", store.len());
    Ok(())
}
