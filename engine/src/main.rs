//! Gitlore command-line entry point.
//!
//! A thin consumer of the engine for manual inspection:
//! - `log`: commits as JSON lines, decoded while git is still running
//! - `files`: files touched per commit
//! - `heatmap`: age bucket and opacity per commit
//! - `classify`: typed reason for a pasted git failure

use clap::{Parser, Subcommand};
use gitlore_engine::git::commands::{log_records, log_with_files, stream_log_records};
use gitlore_engine::git::{classify, GitFailure, GitOperation, LogQuery};
use gitlore_engine::{EngineConfig, EngineResult, GitExecutor, TracingSink};
use gitlore_records::{AgeClassifier, FieldMapping, LogParser};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gitlore")]
#[command(about = "Inspect git history through the gitlore engine")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository to run in (defaults to the current directory)
    #[arg(long, short = 'C', global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print commits as JSON lines
    Log {
        /// Revision or range to start from
        revision: Option<String>,

        /// Maximum number of commits
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Include per-file status and line counts
        #[arg(long)]
        stats: bool,

        /// Limit to commits touching these paths
        #[arg(last = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the files each commit touched
    Files {
        revision: Option<String>,

        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Print the age bucket and opacity of each commit
    Heatmap {
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        #[arg(last = true)]
        paths: Vec<PathBuf>,
    },

    /// Classify git failure text read from stdin
    Classify {
        /// Operation that failed, e.g. push, pull, cherry-pick
        operation: GitOperation,

        /// Failure text; read from stdin when omitted
        #[arg(long)]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitlore_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> EngineResult<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env(),
    };
    let repo = match args.repo {
        Some(repo) => repo,
        None => std::env::current_dir()?,
    };

    if let Command::Classify { operation, text } = args.command {
        let text = match text {
            Some(text) => text,
            None => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                text
            }
        };
        let result = classify(operation, GitFailure::from_text(text));
        println!(
            "{}",
            serde_json::json!({
                "operation": result.operation,
                "reason": result.label(),
                "classified": result.is_classified(),
            })
        );
        return Ok(());
    }

    let executor = GitExecutor::new(&config, Arc::new(TracingSink));
    let location = executor.locator().locate().await?;
    tracing::debug!("Using git {} at {}", location.version, location.path.display());

    match args.command {
        Command::Log {
            revision,
            limit,
            stats,
            paths,
        } => {
            let parser = if stats {
                LogParser::with_file_stats(FieldMapping::commit())
            } else {
                LogParser::new(FieldMapping::commit())
            };
            let query = query(revision, limit, paths);
            let mut records = stream_log_records(&executor, &repo, &parser, &query).await?;
            while let Some(record) = records.next_record().await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            records.close().await?;
        }
        Command::Files { revision, limit } => {
            let mapping = FieldMapping::new([("sha", "%H"), ("subject", "%s")])?;
            let records = log_with_files(&executor, &repo, mapping, &query(revision, limit, Vec::new())).await?;
            for record in records {
                let files: Vec<&str> = record.files().iter().map(|f| f.path.as_str()).collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "sha": record.get("sha"),
                        "subject": record.get("subject"),
                        "files": files,
                    })
                );
            }
        }
        Command::Heatmap { limit, paths } => {
            let mapping = FieldMapping::new([("sha", "%H"), ("date", "%at"), ("subject", "%s")])?;
            let parser = LogParser::new(mapping);
            let records = log_records(&executor, &repo, &parser, &query(None, limit, paths)).await?;

            let dated: Vec<(&str, i64, &str)> = records
                .iter()
                .filter_map(|r| {
                    let secs = r.get("date")?.trim().parse::<i64>().ok()?;
                    Some((r.get("sha")?, secs * 1000, r.get("subject").unwrap_or_default()))
                })
                .collect();
            let timestamps: Vec<i64> = dated.iter().map(|(_, t, _)| *t).collect();
            let heat = AgeClassifier::build(&timestamps, &config.heatmap());

            for (sha, t, subject) in dated {
                let (group, bucket) = heat.classify(t);
                println!(
                    "{}",
                    serde_json::json!({
                        "sha": sha,
                        "heat": group,
                        "bucket": bucket,
                        "opacity": heat.opacity(t),
                        "subject": subject,
                    })
                );
            }
        }
        Command::Classify { .. } => {}
    }

    let stats = executor.stats();
    tracing::debug!(
        "Executor: {} pending, {} cached ({} hits), {} running",
        stats.pending,
        stats.cache.entries,
        stats.cache.hits,
        stats.queue.running
    );
    Ok(())
}

fn query(revision: Option<String>, limit: Option<usize>, paths: Vec<PathBuf>) -> LogQuery {
    LogQuery {
        revision,
        limit,
        paths,
        ..LogQuery::default()
    }
}
