//! Jobscout CLI
//!
//! ```text
//! jobscout index build --jobs data/jobs.json --out data/index/jobs.jsi
//! jobscout index search "quality control chemist" -k 3
//! jobscout ask "what jobs are in Cairo?"
//! jobscout chat --prefetch-context
//! jobscout serve --listen 127.0.0.1:8000 --llm-openai
//! ```
//!
//! Answers go to stdout; logs (`RUST_LOG`, default `info`) and the visited
//! node path go to stderr.

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use jobscout_agent::{AgentNode, SessionStore, TurnOutcome};
use jobscout_index::{load_jobs_file, DedupRetriever, Document, SimilarityIndex, VectorIndex};
use tracing_subscriber::EnvFilter;

mod backend;
mod server;

use backend::{BackendArgs, EmbedderKind, DEFAULT_INDEX_PATH, DEFAULT_JOBS_PATH};

/// Session key used by `jobscout chat`.
const CHAT_SESSION: &str = "chat";

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(
    author,
    version,
    about = "Jobscout: a conversational assistant over scraped job postings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or inspect the vector index
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Ask one question and print the answer
    Ask {
        /// The question (multiple words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Interactive conversation on stdin (`exit`, `quit` or EOF to stop)
    Chat {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Serve `POST /query` and `GET /health`
    Serve(ServeArgs),
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Embed every posting of a jobs JSON file into a new index file
    Build {
        /// Job-postings JSON array
        #[arg(long, default_value = DEFAULT_JOBS_PATH)]
        jobs: PathBuf,

        /// Output index file
        #[arg(long, default_value = DEFAULT_INDEX_PATH)]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = EmbedderKind::TokenHash)]
        embedder: EmbedderKind,
    },

    /// Rank postings for a query
    Search {
        /// Query text
        query: String,

        #[arg(long, default_value = DEFAULT_INDEX_PATH)]
        index: PathBuf,

        /// Number of results
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Show raw index ranking with scores, without near-duplicate removal
        #[arg(long)]
        raw: bool,

        #[arg(long, value_enum, default_value_t = EmbedderKind::TokenHash)]
        embedder: EmbedderKind,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address (use `127.0.0.1:0` to auto-pick a free port).
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    #[command(flatten)]
    backend: BackendArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    match cli.command {
        Commands::Index { command } => match command {
            IndexCommands::Build {
                jobs,
                out,
                embedder,
            } => rt.block_on(cmd_index_build(&jobs, &out, embedder)),
            IndexCommands::Search {
                query,
                index,
                k,
                raw,
                embedder,
            } => rt.block_on(cmd_index_search(&index, &query, k, raw, embedder)),
        },
        Commands::Ask { question, backend } => rt.block_on(cmd_ask(&question.join(" "), &backend)),
        Commands::Chat { backend } => cmd_chat(&rt, &backend),
        Commands::Serve(args) => rt.block_on(server::serve(args.listen, &args.backend)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second initialization (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// index
// ============================================================================

async fn cmd_index_build(jobs: &Path, out: &Path, kind: EmbedderKind) -> Result<()> {
    let documents = load_jobs_file(jobs)
        .with_context(|| format!("failed to load postings from {}", jobs.display()))?;
    let count = documents.len();

    let index = VectorIndex::build(documents, backend::embedder(kind)?)
        .await
        .context("failed to build index")?;
    index
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!(
        "{} {} postings (dim {}) → {}",
        "indexed".green().bold(),
        count,
        index.dim(),
        out.display()
    );
    Ok(())
}

async fn cmd_index_search(
    index_path: &Path,
    query: &str,
    k: usize,
    raw: bool,
    kind: EmbedderKind,
) -> Result<()> {
    let index = VectorIndex::load(index_path, backend::embedder(kind)?)
        .with_context(|| format!("failed to load {}", index_path.display()))?;

    if raw {
        let hits = index.search(query, k).await?;
        if hits.is_empty() {
            println!("{}", "no matches".dimmed());
        }
        for (rank, hit) in hits.iter().enumerate() {
            println!(
                "{:>2}. {} {}",
                rank + 1,
                format!("{:.3}", hit.score).cyan(),
                describe(&hit.document)
            );
        }
        return Ok(());
    }

    let docs = DedupRetriever::new(Arc::new(index)).retrieve(query, k).await?;
    if docs.is_empty() {
        println!("{}", "no matches".dimmed());
    }
    for (rank, doc) in docs.iter().enumerate() {
        println!("{:>2}. {}", rank + 1, describe(doc));
    }
    Ok(())
}

fn describe(doc: &Document) -> String {
    let title = doc.title().filter(|t| !t.is_empty()).unwrap_or("(untitled)");
    match doc.field("Location").filter(|l| !l.is_empty()) {
        Some(location) => format!("{} {} {}", doc.id.yellow(), title.bold(), format!("({location})").dimmed()),
        None => format!("{} {}", doc.id.yellow(), title.bold()),
    }
}

// ============================================================================
// ask / chat
// ============================================================================

async fn cmd_ask(question: &str, backend: &BackendArgs) -> Result<()> {
    let agent = backend.build_agent().await?;
    let outcome = agent.ask(question).await.context("turn failed")?;
    print_outcome(&outcome);
    Ok(())
}

fn cmd_chat(rt: &tokio::runtime::Runtime, backend: &BackendArgs) -> Result<()> {
    let agent = rt.block_on(backend.build_agent())?;
    let sessions = SessionStore::new(1);

    eprintln!("{}", "Ask about open positions. Type `exit` to quit.".dimmed());
    let mut lines = io::stdin().lock().lines();
    loop {
        print!("{} ", "you>".green().bold());
        io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("failed to read stdin")?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        match rt.block_on(sessions.run_turn(&agent, Some(CHAT_SESSION), query)) {
            Ok(outcome) => {
                print!("{} ", "jobscout>".cyan().bold());
                print_outcome(&outcome);
            }
            // The session keeps its pre-turn history, so the user can retry.
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("{}", outcome.answer);
    eprintln!(
        "{} {} {}",
        "path:".dimmed(),
        format_path(&outcome.path).dimmed(),
        format!(
            "({} model call(s), {} tool call(s))",
            outcome.model_calls, outcome.tool_calls
        )
        .dimmed()
    );
}

fn format_path(path: &[AgentNode]) -> String {
    path.iter()
        .map(AgentNode::to_string)
        .collect::<Vec<_>>()
        .join(" → ")
}
