//! Inspect conversation snapshots written by `ConversationMemory::save`.
//!
//! # Examples
//!
//! ```sh
//! # Everything in the snapshot
//! jerzy show session.json
//!
//! # Last five messages of one thread
//! jerzy show session.json --thread support --last 5
//!
//! # Keyword search across all threads
//! jerzy search session.json "cats indoors" --top-k 3
//!
//! # Keep the newest 50 entries, writing to a new file
//! jerzy prune session.json --keep 50 --output trimmed.json
//!
//! # Render the execution trace
//! jerzy trace session.json --format markdown
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use jerzy_rs::memory::{ConversationMemory, HistoryEntry};
use jerzy_rs::trace::{Trace, TraceFormat};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect, search, prune and trace saved conversation snapshots.
#[derive(Parser)]
#[command(name = "jerzy", version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print entries from a snapshot
    Show {
        snapshot: PathBuf,

        /// Only entries from this thread
        #[arg(long)]
        thread: Option<String>,

        /// Only the last N entries
        #[arg(long)]
        last: Option<usize>,
    },

    /// Rank entries by keyword overlap with a query
    Search {
        snapshot: PathBuf,

        query: String,

        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Drop the oldest entries, keeping the newest N
    Prune {
        snapshot: PathBuf,

        #[arg(long)]
        keep: usize,

        /// Write here instead of overwriting the snapshot
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Render the execution trace
    Trace {
        snapshot: PathBuf,

        #[arg(long, default_value_t = TraceFormat::Text)]
        format: TraceFormat,
    },
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open(path: &Path) -> Result<ConversationMemory, Box<dyn Error>> {
    let mut memory = ConversationMemory::default();
    memory.load(path)?;
    debug!(
        "Loaded {} entries across {} threads from {}",
        memory.history().len(),
        memory.threads().len(),
        path.display()
    );
    Ok(memory)
}

fn format_entry(entry: &HistoryEntry) -> String {
    format!(
        "[{}] {}: {}",
        entry.timestamp.as_deref().unwrap_or("-"),
        entry.role.to_uppercase(),
        entry.content
    )
}

fn format_entries<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format_entry(entry));
        out.push('\n');
    }
    out
}

// ── Commands ───────────────────────────────────────────────────────

fn run(cli: &Cli) -> Result<String, Box<dyn Error>> {
    match &cli.command {
        Command::Show {
            snapshot,
            thread,
            last,
        } => {
            let memory = open(snapshot)?;
            let entries = match thread {
                Some(id) => memory.thread(id, *last),
                None => memory.history().query(*last, None),
            };
            let mut out = format!(
                "{} entries, {} threads, current thread: {}\n",
                memory.history().len(),
                memory.threads().len(),
                memory.current_thread()
            );
            out.push_str(&format_entries(entries));
            Ok(out)
        }
        Command::Search {
            snapshot,
            query,
            top_k,
        } => {
            let memory = open(snapshot)?;
            let hits = memory.find_relevant(query, *top_k);
            if hits.is_empty() {
                return Ok(format!("No entries match \"{query}\".\n"));
            }
            Ok(format_entries(hits))
        }
        Command::Prune {
            snapshot,
            keep,
            output,
        } => {
            let mut memory = open(snapshot)?;
            let removed = memory.prune(Some(*keep));
            let target = output.as_ref().unwrap_or(snapshot);
            memory.save(target)?;
            Ok(format!(
                "Removed {removed} entries, {} remain. Wrote {}\n",
                memory.history().len(),
                target.display()
            ))
        }
        Command::Trace { snapshot, format } => {
            let memory = open(snapshot)?;
            let mut rendered = Trace::new(memory.history()).render(*format)?;
            rendered.push('\n');
            Ok(rendered)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
