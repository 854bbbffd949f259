// ============================================================================
// liya - console learning companion
// ============================================================================
// Usage:
//   liya [chat]                        Talk to Liya (default)
//   liya stats                         Show memory statistics
//   liya list [--limit N]              List learned questions with ratings
//   liya recall <QUERY> [--top-k K]    Show the memories nearest to a query
//   liya export                        Export memories as JSON
// ============================================================================

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use liya_core::config::validate_match_threshold;
use liya_core::{
    CompanionConfig, EmbeddingProvider, Lookup, MemoryStore, NoMatchReason, OllamaClient, Prompt,
    RetrievalEngine, Session,
};
use tracing::debug;

/// Word that ends a chat session
const EXIT_SENTINEL: &str = "exit";

/// Liya learns about you by asking questions and remembering the answers
#[derive(Parser)]
#[command(name = "liya", version, about = "A learning companion with vector memory")]
struct Cli {
    /// Path to the memory file (default: $LIYA_STORE_PATH or ~/.liya/memory.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Base URL of the Ollama server
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Only accept matches within this squared L2 distance
    #[arg(long, global = true, value_parser = parse_threshold)]
    threshold: Option<f32>,

    /// Move a corrupt memory file aside instead of failing
    #[arg(long, global = true)]
    recover_corrupt: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to Liya; type "exit" to stop
    Chat,

    /// Show memory statistics (records, embeddings, dimension, ratings)
    Stats,

    /// List learned questions
    List {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the nearest memories for a query
    Recall {
        query: String,

        /// Number of neighbours to show
        #[arg(long, default_value = "3")]
        top_k: usize,
    },

    /// Export memories (without vectors) as JSON
    Export,
}

impl Cli {
    fn config(&self) -> CompanionConfig {
        let mut config = CompanionConfig::from_env();
        if let Some(path) = &self.store {
            config.store_path = Some(path.clone());
        }
        if let Some(url) = &self.ollama_url {
            config.ollama_url = url.clone();
        }
        if self.threshold.is_some() {
            config.match_threshold = self.threshold;
        }
        if self.recover_corrupt {
            config.recover_corrupt_store = true;
        }
        config
    }
}

fn parse_threshold(raw: &str) -> Result<f32, String> {
    let threshold: f32 = raw.trim().parse().map_err(|e| format!("{}", e))?;
    validate_match_threshold(threshold).map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {}", e);
        }
    }

    init_logging();

    let cli = Cli::parse();
    let config = cli.config();
    let client = Arc::new(
        OllamaClient::from_config(&config).context("Failed to create Ollama client")?,
    );
    debug!(
        "Using {} (embeddings: {}, generation: {})",
        client.base_url(),
        client.embedding_model(),
        client.generation_model()
    );

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => cmd_chat(&config, client).await,
        Commands::Stats => cmd_stats(&open_engine(&config, client).await?),
        Commands::List { limit } => cmd_list(&open_engine(&config, client).await?, limit),
        Commands::Recall { query, top_k } => {
            cmd_recall(&open_engine(&config, client).await?, &query, top_k).await
        }
        Commands::Export => cmd_export(&open_engine(&config, client).await?),
    }
}

/// Log to stderr so the dialogue on stdout stays readable
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn open_engine(
    config: &CompanionConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<RetrievalEngine> {
    let path = config.resolve_store_path()?;
    let store = MemoryStore::open_or_recover(&path, embedder.as_ref(), config.recover_corrupt_store)
        .await
        .with_context(|| format!("Failed to open memory store {}", path.display()))?;
    Ok(RetrievalEngine::new(store, embedder).with_match_threshold(config.match_threshold))
}

// ============================================================================
// Chat
// ============================================================================

/// Line-oriented console input. `None` means stdin was closed.
struct Console {
    lines: io::Lines<io::StdinLock<'static>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: io::stdin().lock().lines(),
        }
    }

    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        print!("{}", label);
        io::stdout().flush()?;
        match self.lines.next() {
            Some(line) => Ok(Some(line?.trim().to_string())),
            None => Ok(None),
        }
    }
}

async fn cmd_chat(config: &CompanionConfig, client: Arc<OllamaClient>) -> Result<()> {
    let mut session = Session::start(config, client.clone(), client).await?;
    let mut console = Console::new();

    println!("Liya is learning. Talk to it:");

    if !question_turn(&mut session, &mut console).await? {
        return Ok(());
    }

    loop {
        let Some(input) = console.prompt("You: ")? else {
            break;
        };
        let input = input.to_lowercase();
        if input == EXIT_SENTINEL {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match session.lookup(&input).await {
            Lookup::Match { id, answer, .. } => {
                println!("AI: {}", answer);
                let Some(verdict) = console.prompt("Was this good? (y/n): ")? else {
                    break;
                };
                session.feedback(id, verdict.eq_ignore_ascii_case("y"))?;
            }
            Lookup::NoMatch(reason) => {
                match &reason {
                    NoMatchReason::Unembedded(e) => println!("[Embedding error: {}]", e),
                    NoMatchReason::BeyondThreshold { distance } => {
                        debug!("Closest memory too far away ({})", distance)
                    }
                    NoMatchReason::DimensionMismatch(e) => println!("[Cannot compare: {}]", e),
                    NoMatchReason::EmptyIndex => {}
                }
                let Some(response) = console.prompt("AI doesn't know. What should it say?: ")?
                else {
                    break;
                };
                let appended = session.teach(&input, &response).await?;
                println!("AI learned that!");
                if !appended.embedded {
                    println!("[Saved, but it could not be embedded yet; it will be retried next start]");
                } else if !appended.indexed {
                    println!("[Saved, but its embedding does not fit the existing memories]");
                }
            }
        }

        if !question_turn(&mut session, &mut console).await? {
            break;
        }
    }

    println!("Bye!");
    Ok(())
}

/// Put one question to the user. Returns false when input has ended.
async fn question_turn(session: &mut Session, console: &mut Console) -> Result<bool> {
    let prompt = match session.next_question().await {
        Ok(prompt) => prompt,
        Err(e) => {
            println!("[Could not come up with a question: {}]", e);
            return Ok(true);
        }
    };

    let source = match &prompt {
        Prompt::Recall(_) => "asks you (from memory)",
        Prompt::Generated(_) => "generated a question",
    };
    println!("Liya {}: {}", source, prompt.question());

    let Some(answer) = console.prompt("Your answer: ")? else {
        return Ok(false);
    };
    session.answer(&prompt, &answer).await?;
    Ok(true)
}

// ============================================================================
// Inspection
// ============================================================================

fn cmd_stats(engine: &RetrievalEngine) -> Result<()> {
    let store = engine.store();
    let stats = store.stats();

    println!("=== Liya Memory Stats ===");
    println!("Store:      {}", store.path().display());
    println!();
    println!("Memories:   {} total", stats.total);
    println!("  {:12} {}", "embedded", stats.embedded);
    println!("  {:12} {}", "unembedded", stats.unembedded);
    println!("Indexed:    {}", engine.index().len());
    match stats.dimension {
        Some(dim) => println!("Dimension:  {}", dim),
        None => println!("Dimension:  -"),
    }
    match stats.mean_rating {
        Some(mean) => println!("Rating:     {:.2} mean", mean),
        None => println!("Rating:     -"),
    }

    Ok(())
}

fn cmd_list(engine: &RetrievalEngine, limit: Option<usize>) -> Result<()> {
    let store = engine.store();
    if store.is_empty() {
        println!("No memories yet.");
        return Ok(());
    }

    println!("{:<6}  {:<6}  {:<40}  {}", "ID", "RATING", "QUESTION", "ANSWER");
    println!("{}", "-".repeat(90));

    let shown = limit.unwrap_or(usize::MAX);
    for (id, record) in store.iter().take(shown) {
        println!(
            "{:<6}  {:<6.2}  {:<40}  {}",
            id.to_string(),
            record.rating,
            truncate(&record.question, 40),
            truncate(&record.answer, 30)
        );
    }

    println!("\nTotal: {} memories", store.len());
    Ok(())
}

async fn cmd_recall(engine: &RetrievalEngine, query: &str, top_k: usize) -> Result<()> {
    let hits = engine
        .recall(query, top_k)
        .await
        .context("Failed to embed query")?;

    if hits.is_empty() {
        println!("Nothing remembered yet.");
        return Ok(());
    }

    for (neighbor, record) in hits {
        println!(
            "{:<6}  {:>10.4}  {}  =>  {}",
            neighbor.id.to_string(),
            neighbor.distance,
            record.question,
            record.answer
        );
    }
    Ok(())
}

fn cmd_export(engine: &RetrievalEngine) -> Result<()> {
    let store = engine.store();
    let memories: Vec<_> = store
        .iter()
        .map(|(id, r)| {
            serde_json::json!({
                "id": id.0,
                "question": r.question,
                "answer": r.answer,
                "rating": r.rating,
                "embedded": r.is_embedded(),
            })
        })
        .collect();

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "store": store.path().display().to_string(),
        "stats": store.stats(),
        "memories": memories,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_flag_validation() {
        assert_eq!(parse_threshold("0.75"), Ok(0.75));
        assert_eq!(parse_threshold("0"), Ok(0.0));
        assert!(parse_threshold("NaN").is_err());
        assert!(parse_threshold("-1").is_err());
        assert!(parse_threshold("near").is_err());
    }

    #[test]
    fn test_threshold_flag_reaches_config() {
        let cli = Cli::try_parse_from(["liya", "--threshold", "1.5", "stats"]).unwrap();
        assert_eq!(cli.config().match_threshold, Some(1.5));

        assert!(Cli::try_parse_from(["liya", "--threshold", "-2", "stats"]).is_err());
        assert!(Cli::try_parse_from(["liya", "--threshold=NaN"]).is_err());
    }
}
