//! CLI binary for pdf2voice.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, then either runs the web server or converts a single
//! document from the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2voice::pipeline::languages::google_tts_languages;
use pdf2voice::{
    serve, Backoff, ExtractionFailurePolicy, Orchestrator, OutputLayout, PdfiumExtractor,
    PipelineProgressCallback, ProgressCallback, RequestStage, RetryOn, RetryPolicy, ServiceConfig,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner for `convert`: one line per finished stage, one per retry.
struct CliProgressCallback {
    bar: ProgressBar,
    retries: AtomicU32,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("pdf2voice");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            retries: AtomicU32::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage(&self, _request_id: &str, stage: &RequestStage) {
        let (done, next) = match stage {
            RequestStage::Extracted => ("text extracted", "Translating…"),
            RequestStage::Translated => ("translated", "Speaking original text…"),
            RequestStage::SynthesizedOriginal => ("original audio ready", "Speaking translation…"),
            RequestStage::SynthesizedTranslated => ("translated audio ready", "Finishing…"),
            _ => return,
        };
        self.bar.println(format!("  {} {}", green("✓"), done));
        self.bar.set_message(next);
    }

    fn on_retry(&self, operation: &str, attempt: u32, max_attempts: u32, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {operation} attempt {attempt}/{max_attempts} failed: {}",
            yellow("↻"),
            dim(error)
        ));
    }

    fn on_request_complete(&self, _request_id: &str, succeeded: bool) {
        self.bar.finish_and_clear();
        let retries = self.retries.load(Ordering::SeqCst);
        let suffix = if retries > 0 {
            dim(&format!("  ({retries} retries)"))
        } else {
            String::new()
        };
        if succeeded {
            eprintln!("{} done{suffix}", green("✔"));
        } else {
            eprintln!("{} failed{suffix}", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload form on http://127.0.0.1:5000
  pdf2voice serve

  # Listen on all interfaces, isolated output per request (default)
  pdf2voice serve --bind 0.0.0.0:8080

  # Convert one document to French, audio written to ./out
  pdf2voice convert report.pdf --language fr --out-dir out

  # Machine-readable result
  pdf2voice convert report.pdf -l de --json > result.json

  # List the languages speech synthesis accepts
  pdf2voice languages

RETRY BEHAVIOUR:
  Translation and speech synthesis are each attempted up to --max-attempts
  times. By default only timeouts are retried, with a flat 1 s delay.
  --retry-transient also retries rate limits, 5xx and connection errors;
  --exponential-backoff doubles the delay after every failed attempt.

ENVIRONMENT VARIABLES:
  Every flag has a PDF2VOICE_* equivalent (see --help for each).
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Overrides --verbose / --quiet log filtering
"#;

/// Translate PDFs and listen to them.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2voice",
    version,
    about = "Translate PDF documents and produce spoken audio of the original and the translation",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2VOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2VOICE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "PDF2VOICE_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },

    /// Convert one PDF from the command line.
    Convert {
        /// Local PDF file.
        input: PathBuf,

        /// Destination language code (see `pdf2voice languages`).
        #[arg(short, long, env = "PDF2VOICE_LANGUAGE")]
        language: String,

        /// Write the two MP3 files directly into this directory.
        #[arg(short, long, env = "PDF2VOICE_OUT_DIR")]
        out_dir: Option<PathBuf>,

        /// Print the result as JSON.
        #[arg(long, env = "PDF2VOICE_JSON")]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "PDF2VOICE_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List supported destination languages.
    Languages {
        /// Print as a JSON object.
        #[arg(long)]
        json: bool,
    },
}

/// Flags shared by `serve` and `convert`.
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Directory uploaded documents are written to.
    #[arg(long, global = true, env = "PDF2VOICE_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory audio files are written to and served from.
    #[arg(long, global = true, env = "PDF2VOICE_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Language the original text is spoken in.
    #[arg(long, global = true, env = "PDF2VOICE_SOURCE_LANGUAGE", default_value = "en")]
    source_language: String,

    /// Total attempts per backend call.
    #[arg(long, global = true, env = "PDF2VOICE_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=20))]
    max_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[arg(long, global = true, env = "PDF2VOICE_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Double the delay after each failed attempt (capped at 30 s).
    #[arg(long, global = true, env = "PDF2VOICE_EXPONENTIAL_BACKOFF")]
    exponential_backoff: bool,

    /// Also retry rate limits, 5xx responses and connection errors.
    #[arg(long, global = true, env = "PDF2VOICE_RETRY_TRANSIENT")]
    retry_transient: bool,

    /// Per-call HTTP timeout in seconds.
    #[arg(long, global = true, env = "PDF2VOICE_REQUEST_TIMEOUT", default_value_t = 10)]
    request_timeout: u64,

    /// Where each request's audio files are written.
    #[arg(long, global = true, env = "PDF2VOICE_OUTPUT_LAYOUT", value_enum, default_value = "per-request")]
    output_layout: LayoutArg,

    /// Keep uploaded documents after processing.
    #[arg(long, global = true, env = "PDF2VOICE_RETAIN_UPLOADS")]
    retain_uploads: bool,

    /// Seconds before per-request audio is swept (0 disables).
    #[arg(long, global = true, env = "PDF2VOICE_OUTPUT_TTL", default_value_t = 3600)]
    output_ttl: u64,

    /// How unreadable documents are reported.
    #[arg(long, global = true, env = "PDF2VOICE_EXTRACTION_FAILURE", value_enum, default_value = "error-page")]
    extraction_failure: ExtractionFailureArg,

    /// Maximum upload size in MiB.
    #[arg(long, global = true, env = "PDF2VOICE_MAX_UPLOAD_MB", default_value_t = 32)]
    max_upload_mb: usize,

    /// Override the translation endpoint.
    #[arg(long, global = true, env = "PDF2VOICE_TRANSLATE_URL")]
    translate_url: Option<String>,

    /// Override the speech endpoint.
    #[arg(long, global = true, env = "PDF2VOICE_TTS_URL")]
    tts_url: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    PerRequest,
    Shared,
}

impl From<LayoutArg> for OutputLayout {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::PerRequest => OutputLayout::PerRequest,
            LayoutArg::Shared => OutputLayout::Shared,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExtractionFailureArg {
    ErrorPage,
    Propagate,
}

impl From<ExtractionFailureArg> for ExtractionFailurePolicy {
    fn from(v: ExtractionFailureArg) -> Self {
        match v {
            ExtractionFailureArg::ErrorPage => ExtractionFailurePolicy::ErrorPage,
            ExtractionFailureArg::Propagate => ExtractionFailurePolicy::Propagate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // `convert` with a spinner keeps library logs at error level; the
    // spinner already reports every stage.
    let spinner = matches!(
        cli.command,
        Command::Convert { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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

    match &cli.command {
        Command::Serve { bind } => {
            let config = build_config(&cli.service, None)?;
            PdfiumExtractor::new(config.pdfium_lib_path.clone())
                .check()
                .context("PDFium is required to extract text")?;

            let orchestrator =
                Arc::new(Orchestrator::from_config(config).context("Failed to start service")?);
            if !cli.quiet {
                eprintln!("{} listening on {}", green("◆"), bold(&format!("http://{bind}")));
            }
            serve(orchestrator, *bind).await.context("Server failed")?;
        }

        Command::Convert {
            input,
            language,
            out_dir,
            json,
            ..
        } => {
            let bytes = tokio::fs::read(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let filename = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());

            let progress = if spinner {
                Some(CliProgressCallback::new() as ProgressCallback)
            } else {
                None
            };
            let mut config = build_config(&cli.service, progress)?;
            if let Some(dir) = out_dir {
                config.static_dir = dir.clone();
                config.output_layout = OutputLayout::Shared;
            }

            let orchestrator =
                Orchestrator::from_config(config).context("Failed to initialise pipeline")?;
            let outcome = orchestrator
                .process(&filename, &bytes, language)
                .await
                .context("Conversion failed")?;

            let rendition = match outcome {
                Ok(rendition) => rendition,
                Err(failure) => anyhow::bail!("{}", failure.message()),
            };

            if *json {
                let out = serde_json::to_string_pretty(&rendition)
                    .context("Failed to serialise result")?;
                println!("{out}");
            } else {
                println!("{}", rendition.translated_text);
                if !cli.quiet {
                    eprintln!(
                        "{}  {} → {}",
                        dim("original  "),
                        rendition.original_text.chars().count(),
                        bold(&rendition.original_audio.path.display().to_string())
                    );
                    eprintln!(
                        "{}  {} → {}",
                        dim("translated"),
                        rendition.translated_text.chars().count(),
                        bold(&rendition.translated_audio.path.display().to_string())
                    );
                    eprintln!("{}", dim(&format!("{}ms total", rendition.stats.total_duration_ms)));
                }
            }
        }

        Command::Languages { json } => {
            let languages = google_tts_languages();
            if *json {
                let out = serde_json::to_string_pretty(&languages)
                    .context("Failed to serialise languages")?;
                println!("{out}");
            } else {
                for (code, name) in &languages {
                    println!("{code:<8} {name}");
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(args: &ServiceArgs, progress: Option<ProgressCallback>) -> Result<ServiceConfig> {
    let delay = Duration::from_millis(args.retry_delay_ms);
    let mut policy = RetryPolicy::fixed(args.max_attempts, delay);
    if args.exponential_backoff {
        policy = policy.with_backoff(Backoff::Exponential {
            base: delay,
            max: Duration::from_secs(30),
        });
    }
    if args.retry_transient {
        policy = policy.with_retry_on(RetryOn::Transient);
    }

    let mut builder = ServiceConfig::builder()
        .upload_dir(&args.upload_dir)
        .static_dir(&args.static_dir)
        .source_language(&args.source_language)
        .retry_policy(policy)
        .request_timeout_secs(args.request_timeout)
        .output_layout(args.output_layout.into())
        .retain_uploads(args.retain_uploads)
        .output_ttl_secs(args.output_ttl)
        .extraction_failure(args.extraction_failure.into())
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(ref url) = args.translate_url {
        builder = builder.translate_base_url(url);
    }
    if let Some(ref url) = args.tts_url {
        builder = builder.tts_base_url(url);
    }
    if let Some(ref path) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
