//! CLI binary for idp-extract.
//!
//! Acts as a local orchestrator: maps flags to `ExtractionConfig`, wires the
//! filesystem stores, runs each key through the retry policy and prints the
//! results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use idp_extract::config::DEFAULT_MODEL;
use idp_extract::event::parse_event;
use idp_extract::inference::resolve_provider;
use idp_extract::store::{Blob, BlobStore, FileParameterStore, FsBlobStore, FsRecordStore};
use idp_extract::{
    retry, Collaborators, ExtractionConfig, Extractor, IdpError, InferenceClient, InvocationOutcome,
    MessagesClient, RequestLimits, RetryPolicy, StoreError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Exit status for failures an orchestrator may retry (EX_TEMPFAIL).
const EXIT_RETRYABLE: u8 = 75;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields from one file under ./inbox
  idp-extract --source-dir inbox --max-tokens 4096 claims/form.pdf

  # Several keys, structured output
  idp-extract --json scan1.png scan2.pdf > results.json

  # Replay a storage notification event
  idp-extract --event notification.json

  # Image-only files through an edgequake-llm provider
  idp-extract --backend provider --provider openai --model gpt-4.1-mini photo.jpg

OUTPUTS:
  <output-dir>/<key>-Response.json   raw model answer
  <records-dir>/<key>.json           flattened attribute record

EXIT STATUS:
  0    every key succeeded or was skipped as unsupported
  75   at least one key failed with a retryable error
  1    at least one key failed with a terminal error

ENVIRONMENT VARIABLES:
  MAX_RESPONSE_TOKENS        Output token budget (required)
  MODEL_ID                   Model id
  EXTRACTION_PROMPT          Fallback extraction prompt
  ANTHROPIC_API_KEY          API key for the messages backend
  IDP_SOURCE_DIR             Root directory for source keys
  IDP_OUTPUT_DIR             Root directory for raw responses
  IDP_RECORDS_DIR            Root directory for attribute records
  IDP_PROMPT_PARAMETER_FILE  File holding the preferred extraction prompt
  RUST_LOG                   Log filter (overrides -v / -q)
"#;

/// Route documents and images to a multimodal model and store the extracted fields.
#[derive(Parser, Debug)]
#[command(
    name = "idp-extract",
    version,
    about = "Extract structured fields from PDFs and document images with a multimodal model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source keys, relative to the source directory.
    #[arg(required_unless_present = "event", conflicts_with = "event")]
    keys: Vec<String>,

    /// Read the key from an invocation event JSON file.
    #[arg(long)]
    event: Option<PathBuf>,

    /// Directory source keys are read from.
    #[arg(long, env = "IDP_SOURCE_DIR", default_value = ".")]
    source_dir: PathBuf,

    /// Directory raw responses are written to. Defaults to the source directory.
    #[arg(long, env = "IDP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory attribute records are written to.
    #[arg(long, env = "IDP_RECORDS_DIR", default_value = "records")]
    records_dir: PathBuf,

    /// File holding the preferred extraction prompt.
    #[arg(long, env = "IDP_PROMPT_PARAMETER_FILE")]
    prompt_parameter_file: Option<PathBuf>,

    /// Fallback extraction prompt when the parameter file is empty or absent.
    #[arg(long, env = "EXTRACTION_PROMPT")]
    prompt: Option<String>,

    /// Model id.
    #[arg(long, env = "MODEL_ID", default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum output tokens per call (required).
    #[arg(long, env = "MAX_RESPONSE_TOKENS")]
    max_tokens: Option<u32>,

    /// Inference backend.
    #[arg(long, env = "IDP_BACKEND", value_enum, default_value = "messages")]
    backend: BackendArg,

    /// API key for the messages backend.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the messages endpoint base URL.
    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    base_url: Option<String>,

    /// edgequake-llm provider name for the provider backend (openai, anthropic, gemini, ollama).
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Per-call inference timeout in seconds.
    #[arg(long, env = "IDP_API_TIMEOUT", default_value_t = 240)]
    api_timeout: u64,

    /// Connect timeout in seconds.
    #[arg(long, env = "IDP_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout: u64,

    /// Overall time budget per key in seconds.
    #[arg(long, env = "IDP_INVOCATION_BUDGET", default_value_t = 300)]
    budget: u64,

    /// Attempts per key, including the first.
    #[arg(long, env = "IDP_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    max_attempts: u32,

    /// Reject requests carrying more images than this.
    #[arg(long, env = "IDP_MAX_IMAGES", default_value_t = 20)]
    max_images: usize,

    /// Print each result as JSON instead of the raw response text.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendArg {
    /// Messages HTTP API: documents and images.
    Messages,
    /// edgequake-llm chat provider: images only.
    Provider,
}

/// Reads source keys from one directory and writes responses to another.
struct SplitBlobStore {
    source: FsBlobStore,
    output: FsBlobStore,
}

#[async_trait]
impl BlobStore for SplitBlobStore {
    async fn get(&self, key: &str) -> Result<Blob, StoreError> {
        self.source.get(key).await
    }

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<(), StoreError> {
        self.output.put(key, bytes, media_type).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let keys = collect_keys(cli).await?;
    let config = build_config(cli)?;
    let client = build_client(cli, &config)?;

    let output_dir = cli.output_dir.clone().unwrap_or_else(|| cli.source_dir.clone());
    let params = match &cli.prompt_parameter_file {
        Some(path) => FileParameterStore::new(path),
        None => FileParameterStore::none(),
    };
    let extractor = Extractor::new(
        config,
        client,
        Collaborators {
            blobs: Arc::new(SplitBlobStore {
                source: FsBlobStore::new(&cli.source_dir),
                output: FsBlobStore::new(output_dir),
            }),
            params: Arc::new(params),
            records: Arc::new(FsRecordStore::new(&cli.records_dir)),
        },
    );

    let policy = RetryPolicy {
        max_attempts: cli.max_attempts,
        ..RetryPolicy::default()
    };
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;

    let mut retryable_failures = 0usize;
    let mut terminal_failures = 0usize;

    for key in &keys {
        let spinner = show_progress.then(|| spinner_for(key));
        let start = Instant::now();

        let bar = spinner.as_ref();
        let extractor = &extractor;
        let result = retry(&policy, move |attempt| {
            if let Some(bar) = bar {
                if attempt > 1 {
                    bar.set_message(format!("{key}  {}", dim(&format!("attempt {attempt}"))));
                }
            }
            extractor.process(key)
        })
        .await;

        if let Some(bar) = &spinner {
            bar.finish_and_clear();
        }
        let elapsed = dim(&format!("{:.1}s", start.elapsed().as_secs_f64()));

        match result {
            Ok(outcome) => {
                print_outcome(cli, key, &outcome)?;
                if !cli.quiet {
                    let (mark, detail) = match &outcome {
                        InvocationOutcome::Extracted(r) => {
                            (green("✓"), format!("{} fields via {}", r.attributes.len(), r.route))
                        }
                        InvocationOutcome::Unsupported => {
                            (cyan("⚠"), "unsupported content type".to_string())
                        }
                    };
                    eprintln!("  {} {}  {}  {}", mark, bold(key), detail, elapsed);
                }
            }
            Err(e) => {
                if e.is_retryable() {
                    retryable_failures += 1;
                } else {
                    terminal_failures += 1;
                }
                report_failure(key, &e);
            }
        }
    }

    if !cli.quiet && keys.len() > 1 {
        let failed = retryable_failures + terminal_failures;
        eprintln!(
            "{} {}/{} keys processed",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&(keys.len() - failed).to_string()),
            keys.len()
        );
    }

    Ok(if terminal_failures > 0 {
        ExitCode::FAILURE
    } else if retryable_failures > 0 {
        ExitCode::from(EXIT_RETRYABLE)
    } else {
        ExitCode::SUCCESS
    })
}

/// Keys from the command line, or the single key named by `--event`.
async fn collect_keys(cli: &Cli) -> Result<Vec<String>> {
    match &cli.event {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read event from {:?}", path))?;
            let key = parse_event(&raw).context("Invalid invocation event")?;
            Ok(vec![key])
        }
        None => Ok(cli.keys.clone()),
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model(&cli.model)
        .max_tokens_opt(cli.max_tokens)
        .limits(RequestLimits {
            max_images: cli.max_images,
            ..RequestLimits::default()
        })
        .api_timeout_secs(cli.api_timeout)
        .connect_timeout_secs(cli.connect_timeout)
        .invocation_budget_secs(cli.budget);

    if let Some(prompt) = &cli.prompt {
        builder = builder.env_prompt(prompt);
    }

    let config = builder.build().context("Invalid configuration")?;
    // Checked here too so a missing budget fails before any key is read.
    config.require_max_tokens()?;
    Ok(config)
}

fn build_client(cli: &Cli, config: &ExtractionConfig) -> Result<Arc<dyn InferenceClient>> {
    match cli.backend {
        BackendArg::Messages => {
            let key = cli.api_key.clone().unwrap_or_default();
            let mut client = MessagesClient::new(key, config)?;
            if let Some(url) = &cli.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        BackendArg::Provider => {
            let model = (cli.model != DEFAULT_MODEL).then_some(cli.model.as_str());
            let client = resolve_provider(cli.provider.as_deref(), model)?;
            Ok(Arc::new(client))
        }
    }
}

fn spinner_for(key: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Extracting");
    bar.set_message(key.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_outcome(cli: &Cli, key: &str, outcome: &InvocationOutcome) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if cli.json {
        let value = match outcome {
            InvocationOutcome::Extracted(r) => serde_json::json!({ "key": key, "result": r }),
            InvocationOutcome::Unsupported => {
                serde_json::json!({ "key": key, "result": outcome.response_text() })
            }
        };
        let json = serde_json::to_string_pretty(&value).context("Failed to serialise result")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        let text = outcome.response_text();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}

fn report_failure(key: &str, e: &IdpError) {
    let label = if e.is_retryable() { "retryable" } else { "terminal" };
    let msg = e.to_string();
    let msg = if msg.chars().count() > 200 {
        format!("{}\u{2026}", msg.chars().take(199).collect::<String>())
    } else {
        msg
    };
    eprintln!("  {} {}  {}  {}", red("✗"), bold(key), red(&msg), dim(label));
}
