//! Antidote CLI
//!
//! Hunts for poisoned files in a training corpus by searching over
//! generated filter hypotheses.
//!
//! ## Commands
//!
//! - `search`: run a hypothesis search session
//! - `eval`: evaluate one predicate over a corpus
//! - `check`: compile a predicate and show its canonical form
//! - `score`: score a matched-file list against ground truth

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn, Level};

use antidote_core::reporting::render_summary;
use antidote_core::scoring::score;
use antidote_core::{
    compile, evaluate_once, init_tracing, CancellationToken, FileId, FsCorpus, GroundTruthSet,
    HypothesisStore, Metrics, SearchSession, SessionConfig,
};
use antidote_llm::{LlmConfig, OpenAiClient};

#[derive(Parser)]
#[command(name = "antidote")]
#[command(author = "Antidote Intelligence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hypothesis search for poisoned training data", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a hypothesis search session over a corpus
    Search(SearchArgs),

    /// Evaluate a single predicate over a corpus
    Eval {
        /// Predicate source, e.g. "len(content) == 0"
        predicate: String,

        #[command(flatten)]
        run: RunArgs,

        /// Write matched file names here, one per line
        #[arg(long)]
        matched_out: Option<PathBuf>,
    },

    /// Compile a predicate without running it
    Check {
        /// Predicate source
        predicate: String,
    },

    /// Score a list of matched file names against ground truth
    Score {
        /// File with one matched file name per line
        #[arg(long)]
        matched: PathBuf,

        /// Ground-truth labels (JSON)
        #[arg(long)]
        ground_truth: PathBuf,
    },
}

/// Corpus and evaluation settings shared by `search` and `eval`.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Session config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Corpus directory
    #[arg(long, env = "ANTIDOTE_CORPUS")]
    corpus: Option<PathBuf>,

    /// Ground-truth labels (JSON); enables exact metrics
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// Concurrent evaluations
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-file evaluation deadline in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Number of search iterations
    #[arg(short = 'n', long)]
    iterations: Option<u32>,

    /// Directory for run records and the session report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hypothesis log to resume from and save to
    #[arg(long)]
    store: Option<PathBuf>,

    /// Seed for file sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Skip iterations instead of using built-in fallback hypotheses
    #[arg(long)]
    no_fallbacks: bool,

    /// API key for the completions endpoint (falls back to OPENAI_API_KEY)
    #[arg(long, env = "ANTIDOTE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name
    #[arg(long, env = "ANTIDOTE_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "ANTIDOTE_API_BASE")]
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Search(args) => cmd_search(args).await,
        Commands::Eval {
            predicate,
            run,
            matched_out,
        } => cmd_eval(&predicate, &run, matched_out.as_deref()).await,
        Commands::Check { predicate } => cmd_check(&predicate),
        Commands::Score {
            matched,
            ground_truth,
        } => cmd_score(&matched, &ground_truth),
    }
}

/// Config file (or defaults) with command-line overrides applied.
fn session_config(run: &RunArgs) -> Result<SessionConfig> {
    let mut config = match &run.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => SessionConfig::default(),
    };
    if let Some(corpus) = &run.corpus {
        config.corpus_dir = corpus.clone();
    }
    if let Some(gt) = &run.ground_truth {
        config.ground_truth = Some(gt.clone());
    }
    if let Some(workers) = run.workers {
        config.batch.workers = workers;
    }
    if let Some(ms) = run.deadline_ms {
        config.batch.budget.deadline = Duration::from_millis(ms);
    }
    Ok(config)
}

fn load_ground_truth(config: &SessionConfig) -> Result<Option<GroundTruthSet>> {
    config
        .ground_truth
        .as_deref()
        .map(|path| {
            GroundTruthSet::load(path)
                .with_context(|| format!("Failed to load ground truth {:?}", path))
        })
        .transpose()
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing with the runs completed so far");
            token.cancel();
        }
    });
}

fn progress(processed: u64, total: u64) {
    debug!(processed, total, "batch progress");
}

async fn cmd_search(args: SearchArgs) -> Result<()> {
    let mut config = session_config(&args.run)?;
    if let Some(n) = args.iterations {
        config.iterations = n;
    }
    if args.output.is_some() {
        config.output_dir = args.output.clone();
    }
    if args.store.is_some() {
        config.store_path = args.store.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.no_fallbacks {
        config.use_fallbacks = false;
    }
    config.validate()?;

    let api_key = args
        .api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_default();
    let mut llm = LlmConfig::new(api_key);
    if let Some(model) = args.model {
        llm = llm.with_model(model);
    }
    if let Some(base) = args.api_base {
        llm = llm.with_api_base(base);
    }
    let client = Arc::new(OpenAiClient::new(llm)?);

    let corpus = Arc::new(FsCorpus::open(&config.corpus_dir)?);
    let ground_truth = load_ground_truth(&config)?;
    let store = match &config.store_path {
        Some(path) => HypothesisStore::load(path)
            .with_context(|| format!("Failed to load hypothesis log {:?}", path))?,
        None => HypothesisStore::new(),
    };
    info!(
        model = client.model(),
        corpus = ?config.corpus_dir,
        previous_hypotheses = store.len(),
        "starting search"
    );

    let mut session = SearchSession::new(config, corpus, client.clone())
        .with_judge(client)
        .with_store(store);
    if let Some(gt) = ground_truth {
        session = session.with_ground_truth(gt);
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);
    let report = session.run(&progress, &cancel).await?;
    session.persist(&report)?;

    print!("{}", render_summary(&report));
    Ok(())
}

async fn cmd_eval(predicate: &str, run: &RunArgs, matched_out: Option<&Path>) -> Result<()> {
    let config = session_config(run)?;
    config.validate()?;
    let corpus = Arc::new(FsCorpus::open(&config.corpus_dir)?);
    let ground_truth = load_ground_truth(&config)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);
    let (outcome, metrics) = evaluate_once(
        predicate,
        corpus,
        &config,
        ground_truth.as_ref(),
        &progress,
        &cancel,
    )
    .await?;

    println!(
        "Matched {} of {} files ({} errors: {} timeout, {} type, {} resource) in {:?}",
        outcome.matched_files.len(),
        outcome.files_total,
        outcome.errors,
        outcome.error_breakdown.timeout,
        outcome.error_breakdown.runtime_type_error,
        outcome.error_breakdown.resource_exceeded,
        outcome.duration,
    );
    if let Some(m) = metrics {
        print_metrics(&m);
    }
    if let Some(path) = matched_out {
        antidote_core::reporting::write_matched_list(path, &outcome.matched_files)?;
        println!("Matched files written to {:?}", path);
    }
    Ok(())
}

fn cmd_check(predicate: &str) -> Result<()> {
    match compile(predicate) {
        Ok(compiled) => {
            println!("OK");
            println!("canonical:   {}", compiled.canonical());
            println!("fingerprint: {}", compiled.fingerprint());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.render(predicate));
            bail!("predicate rejected: {}", e.kind)
        }
    }
}

fn cmd_score(matched: &Path, ground_truth: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(matched)
        .with_context(|| format!("Failed to read matched list {:?}", matched))?;
    let files = parse_matched_list(&raw);
    let gt = GroundTruthSet::load(ground_truth)
        .with_context(|| format!("Failed to load ground truth {:?}", ground_truth))?;
    print_metrics(&score(&files, &gt));
    Ok(())
}

fn parse_matched_list(raw: &str) -> std::collections::BTreeSet<FileId> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(FileId::from)
        .collect()
}

fn print_metrics(m: &Metrics) {
    println!(
        "precision {:.3}  recall {:.3}  f1 {:.3}  (tp {}, fp {}, fn {})",
        m.precision,
        m.recall,
        m.f1,
        m.true_positive_count,
        m.false_positive_count,
        m.false_negative_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("antidote.toml");
        std::fs::write(&path, "corpus_dir = \"/from/file\"\n[batch]\nworkers = 3\n").unwrap();

        let run = RunArgs {
            config: Some(path),
            workers: Some(7),
            deadline_ms: Some(20),
            ..RunArgs::default()
        };
        let config = session_config(&run).unwrap();
        assert_eq!(config.corpus_dir, PathBuf::from("/from/file"));
        assert_eq!(config.batch.workers, 7);
        assert_eq!(config.batch.budget.deadline, Duration::from_millis(20));
    }

    #[test]
    fn matched_list_ignores_blank_lines() {
        let files = parse_matched_list("2.txt\n\n 5.txt \n");
        assert_eq!(files.len(), 2);
        assert!(files.contains(&FileId::new("5.txt")));
    }

    #[tokio::test]
    async fn eval_runs_over_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("2.txt"), "").unwrap();
        let out = dir.path().join("matched.txt");

        let run = RunArgs {
            corpus: Some(dir.path().to_path_buf()),
            workers: Some(2),
            ..RunArgs::default()
        };
        cmd_eval("len(content) == 0", &run, Some(&out)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "2.txt\n");
    }

    #[test]
    fn check_rejects_host_access() {
        assert!(cmd_check("open('/etc/passwd')").is_err());
        assert!(cmd_check("name.endswith('.txt')").is_ok());
    }
}
