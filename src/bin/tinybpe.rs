use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::ThreadPoolBuilder;
use serde_json::json;
use tinybpe::config::{IngestConfig, TrainerConfig};
use tinybpe::corpus::load_text_corpus;
use tinybpe::serialization::{self, ModelSummary};
use tinybpe::{TokenId, Trainer};

const DEFAULT_OUTPUT: &str = "model.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "Byte-level BPE toolkit", long_about = None)]
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
    /// Train a new tokenizer from text files
    Train(TrainArgs),
    /// Encode texts with a trained tokenizer
    Encode(EncodeArgs),
    /// Decode token ids back into text
    Decode(DecodeArgs),
    /// Inspect tokenizer metadata
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path for the model file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Target vocabulary size (distinct bytes plus merges)
    #[arg(long, value_name = "SIZE")]
    vocab_size: Option<usize>,

    /// Log every merge as it is learned
    #[arg(long)]
    verbose_merges: bool,

    /// Fail when the vocabulary size is smaller than the corpus byte alphabet
    #[arg(long)]
    strict: bool,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// Treat every line as a separate training text
    #[arg(long)]
    split_lines: bool,

    /// Emit pretty JSON
    #[arg(long)]
    pretty: bool,

    /// Also write a human-readable vocabulary listing
    #[arg(long, value_name = "PATH")]
    vocab_out: Option<PathBuf>,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Model file to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Literal text to encode (repeat flag)
    #[arg(long = "text", value_name = "TEXT")]
    texts: Vec<String>,

    /// Text files to encode, one sequence per file
    #[arg(required_unless_present = "texts")]
    inputs: Vec<PathBuf>,

    /// Emit JSON lines instead of plain id lists
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Model file to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Path to a file with one whitespace separated id sequence per line
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Token ids to decode when --input is omitted
    #[arg(value_name = "ID", required_unless_present = "input")]
    tokens: Vec<TokenId>,

    /// Output file for decoded text (defaults to stdout)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Emit a JSON array with one string per sequence instead of newline-joined text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Model file to inspect
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Info(args) => run_info(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> Result<()> {
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }

    let mut cfg = TrainerConfig::builder();
    if let Some(vocab_size) = args.vocab_size {
        cfg = cfg.target_vocab_size(vocab_size);
    }
    cfg = cfg.show_progress(args.verbose_merges);
    cfg = cfg.strict_vocab_size(args.strict);
    let trainer_cfg = cfg.build()?;

    let ingest_cfg = IngestConfig {
        recursive: !args.no_recursive,
        follow_symlinks: args.follow_symlinks,
        split_lines: args.split_lines,
    };

    let texts = load_text_corpus(&args.inputs, &ingest_cfg)
        .with_context(|| "failed to load text corpus")?;
    let corpus_bytes: usize = texts.iter().map(String::len).sum();
    info!(
        "loaded {} texts totalling {:.2} KiB",
        texts.len(),
        bytes_to_kibibytes(corpus_bytes)
    );

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training merges... {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let trainer = Trainer::new(trainer_cfg);
    let start = Instant::now();
    let artifacts = trainer.train(&texts)?;
    drop(texts);
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }

    let elapsed = start.elapsed();
    let tokenizer = &artifacts.tokenizer;
    serialization::save_model(tokenizer, &args.output, args.pretty)
        .with_context(|| format!("failed to save model to {}", args.output.display()))?;
    if let Some(path) = &args.vocab_out {
        serialization::save_vocab_listing(tokenizer, path)
            .with_context(|| format!("failed to write vocabulary to {}", path.display()))?;
    }

    let merges = tokenizer.merges().len();
    let vocab_size = tokenizer.vocab_size();
    info!(
        "training complete: merges={merges} vocab={vocab_size} duration={elapsed:.2?} stop={:?}",
        artifacts.metrics.stop_reason
    );
    println!(
        "wrote model with vocab {} ({} merges) to {}",
        vocab_size,
        merges,
        args.output.display()
    );
    if let Some(ratio) = artifacts.metrics.compression_ratio(corpus_bytes) {
        println!(
            "   corpus {:.2} KiB | duration {:.2?} | compression {:.2}x",
            bytes_to_kibibytes(corpus_bytes),
            elapsed,
            ratio
        );
    }

    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let tokenizer = serialization::load_model(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;

    let mut sources = Vec::with_capacity(args.texts.len() + args.inputs.len());
    let mut texts = Vec::with_capacity(sources.capacity());
    for (idx, text) in args.texts.into_iter().enumerate() {
        sources.push(format!("text[{idx}]"));
        texts.push(text);
    }
    for path in &args.inputs {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        sources.push(path.display().to_string());
        texts.push(text);
    }

    let encoded = tokenizer.encode_batch(&texts);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (source, tokens) in sources.iter().zip(&encoded) {
        if args.json {
            let unknown = tokens.iter().filter(|&&id| tokenizer.is_unknown(id)).count();
            let record = json!({
                "source": source,
                "tokens": tokens,
                "unknown": unknown,
            });
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        } else {
            write_token_sequence(&mut out, tokens)?;
        }
    }

    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let tokenizer = serialization::load_model(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;

    let sequences = if let Some(input_path) = &args.input {
        let contents = fs::read_to_string(input_path)
            .with_context(|| format!("failed to read {}", input_path.display()))?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_token_list)
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![args.tokens]
    };

    let texts = tokenizer.decode_batch(&sequences)?;
    // Plain output separates sequences with newlines, which is ambiguous when a decoded
    // text contains one; `--json` keeps the boundaries.
    let joined = if args.json {
        serde_json::to_string(&texts)?
    } else {
        texts.join("\n")
    };

    if let Some(path) = &args.output {
        let mut file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(joined.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {} bytes to {}", joined.len(), path.display());
    } else {
        println!("{joined}");
    }

    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let tokenizer = serialization::load_model(&args.model)
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;
    let summary = ModelSummary::from_tokenizer(&tokenizer);

    if args.json {
        let record = json!({
            "path": args.model.display().to_string(),
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("Distinct bytes : {}", summary.distinct_bytes);
        println!("Merges         : {}", summary.merges);
        println!("Vocab size     : {}", summary.vocab_size);
        println!("Unknown id     : {}", summary.unknown_id);
        println!("Partial UTF-8  : {}", summary.partial_utf8_tokens);
        println!("Longest token  : {} bytes", summary.longest_token_bytes);
    }

    Ok(())
}

#[must_use]
fn bytes_to_kibibytes(bytes: usize) -> f64 {
    bytes as f64 / 1024.0
}

fn write_token_sequence<W: Write>(writer: &mut W, tokens: &[TokenId]) -> Result<()> {
    for (idx, token) in tokens.iter().enumerate() {
        if idx > 0 {
            writer.write_all(b" ")?;
        }
        write!(writer, "{token}")?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn parse_token_list(text: &str) -> Result<Vec<TokenId>> {
    text.split_whitespace()
        .map(|part| {
            part.parse::<TokenId>()
                .map_err(|err| anyhow!("invalid token id `{part}`: {err}"))
        })
        .collect()
}
