use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use intervec::{
    Algorithm, CancelToken, EmbeddingProcessor, JobContext, KeyedVectors, PhraseConfig,
    TrainParams,
};

const DEFAULT_OUTPUT: &str = "models.zip";
const PROGRESS_RESOLUTION: u64 = 1000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-interval word embedding toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train one embedding model per token file in a source archive
    Run(RunArgs),
    /// Inspect a saved model file
    Info(InfoArgs),
    /// Query a saved model for the nearest neighbours of a token
    Similar(SimilarArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Source archive of token files
    input: PathBuf,

    /// Output path for the model archive
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Training algorithm
    #[arg(long, value_enum, default_value_t = Algorithm::SkipGram)]
    algorithm: Algorithm,

    /// Context window size (clamped to 1..=10)
    #[arg(long, value_name = "SIZE", default_value_t = 5)]
    window: usize,

    /// Dimensionality of the word vectors (50..=1000)
    #[arg(long, value_name = "DIM", default_value_t = 100)]
    dimensionality: usize,

    /// Enable negative sampling
    #[arg(long)]
    negative: bool,

    /// Minimum word occurrence for the vocabulary
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    min_count: usize,

    /// Number of passes over each corpus
    #[arg(long, value_name = "COUNT", default_value_t = 5)]
    epochs: usize,

    /// Trainer worker pool size
    #[arg(long, value_name = "COUNT", default_value_t = 3)]
    workers: usize,

    /// Minimum bigram occurrences for phrase detection
    #[arg(long, value_name = "COUNT", default_value_t = 5)]
    phrase_min_count: usize,

    /// Collocation score threshold for phrase detection
    #[arg(long, value_name = "SCORE", default_value_t = 10.0)]
    phrase_threshold: f64,

    /// Directory to create the run's staging area under
    #[arg(long, value_name = "DIR")]
    staging_dir: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Saved .model file
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,

    /// Number of most frequent tokens to list
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    top: usize,
}

#[derive(Args, Debug)]
struct SimilarArgs {
    /// Saved .model file
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,

    /// Token to look up
    token: String,

    /// Number of neighbours to print
    #[arg(short = 'n', long, value_name = "COUNT", default_value_t = 10)]
    count: usize,
}

/// Job handle for console runs: status and progress drive an indicatif bar.
struct ConsoleJob {
    source: PathBuf,
    results: PathBuf,
    staging_base: PathBuf,
    cancel: CancelToken,
    bar: ProgressBar,
}

impl ConsoleJob {
    fn new(source: PathBuf, results: PathBuf, staging_base: PathBuf, show_bar: bool) -> Self {
        let bar = if show_bar {
            let bar = ProgressBar::new(PROGRESS_RESOLUTION);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {wide_msg}")
                    .expect("static progress template"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            source,
            results,
            staging_base,
            cancel: CancelToken::new(),
            bar,
        }
    }
}

impl JobContext for ConsoleJob {
    fn source_path(&self) -> &Path {
        &self.source
    }

    fn results_path(&self) -> &Path {
        &self.results
    }

    fn staging_base(&self) -> &Path {
        &self.staging_base
    }

    fn update_status(&self, text: &str) {
        log::debug!("{text}");
        self.bar.set_message(text.to_owned());
    }

    fn update_progress(&self, fraction: f32) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.bar
            .set_position((clamped * PROGRESS_RESOLUTION as f32) as u64);
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn finish(&self, models: usize) {
        self.bar
            .finish_with_message(format!("{models} models generated"));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Info(args) => info(args),
        Commands::Similar(args) => similar(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let level = match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn run(args: RunArgs) -> Result<()> {
    let params = TrainParams::builder()
        .algorithm(args.algorithm)
        .window(args.window)
        .dimensionality(args.dimensionality)
        .negative(args.negative)
        .min_count(args.min_count)
        .epochs(args.epochs)
        .workers(args.workers)
        .build()
        .context("invalid training parameters")?;
    let phrases = PhraseConfig::builder()
        .min_count(args.phrase_min_count)
        .threshold(args.phrase_threshold)
        .build()
        .context("invalid phrase parameters")?;

    let staging_base = args.staging_dir.unwrap_or_else(env::temp_dir);
    let processor = EmbeddingProcessor::new(params, phrases)?;
    let job = ConsoleJob::new(args.input, args.output, staging_base, !args.no_progress);

    let metrics = processor.run(&job).context("embedding run failed")?;
    println!(
        "Packed {} models in {:.2?}",
        metrics.models, metrics.total_duration
    );
    for file in &metrics.files {
        println!(
            "  {}: {} token lists, {} phrase merges, vocab {}",
            file.name, file.token_lists, file.phrase_merges, file.vocab_size
        );
    }
    Ok(())
}

fn info(args: InfoArgs) -> Result<()> {
    let model = KeyedVectors::load(&args.model)
        .with_context(|| format!("failed to load model {:?}", args.model))?;
    println!("Vocab size: {}", model.len());
    println!("Dimensionality: {}", model.dimensionality());
    // The vocabulary is stored most frequent first.
    for token in model.vocab().iter().take(args.top) {
        println!("  {token}");
    }
    Ok(())
}

fn similar(args: SimilarArgs) -> Result<()> {
    let model = KeyedVectors::load(&args.model)
        .with_context(|| format!("failed to load model {:?}", args.model))?;
    let neighbours = model
        .most_similar(&args.token, args.count)
        .with_context(|| format!("no vector for token {:?}", args.token))?;
    for (token, score) in neighbours {
        println!("{score:.4}  {token}");
    }
    Ok(())
}
