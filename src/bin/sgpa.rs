//! CLI binary for gradesheet-sgpa.
//!
//! A thin shim over the library crate: the two `--result` / `--credits`
//! arguments are the upload controls, and the three text panels are printed
//! to stdout as each stage completes.

use anyhow::{Context, Result};
use clap::Parser;
use gradesheet_sgpa::{
    calculate, calculate_to_file, ImagePreview, PipelineProgressCallback, ProgressCallback,
    Secrets, SgpaConfig, SgpaReport, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal presentation: a spinner on stderr while a call is in flight, and
/// each stage's panel on stdout the moment its reply arrives.
struct CliProgressCallback {
    /// Spinner anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-stage wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<Stage, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, stage: Stage) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&stage))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, result_sheet: &ImagePreview, credits_sheet: &ImagePreview) {
        self.bar.println(format!("{} {}", cyan("◆"), bold("Uploaded images")));
        self.bar.println(format!("  📜 Result  {}", dim(&result_sheet.to_string())));
        self.bar.println(format!("  📝 Credits {}", dim(&credits_sheet.to_string())));
    }

    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(stage, Instant::now());
        }
        self.bar.set_prefix("Working");
        self.bar.set_message(stage.progress_message());
    }

    fn on_stage_complete(&self, stage: Stage, text: &str) {
        let secs = self.elapsed_secs(stage);
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{secs:.1}s"))
        ));
        self.bar.suspend(|| {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "\n## {}\n\n{}\n", stage.panel_title(), text.trim_end());
            let _ = handle.flush();
        });
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let secs = self.elapsed_secs(stage);
        self.bar.finish_and_clear();

        // Truncate very long provider messages to keep output tidy.
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 100 {
            let cut: String = first_line.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };
        eprintln!(
            "  {} {:<20} {}  {}",
            red("✗"),
            stage.to_string(),
            red(&msg),
            dim(&format!("{secs:.1}s"))
        );
    }

    fn on_run_complete(&self, total_duration_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} SGPA calculated in {}",
            green("✔"),
            bold(&format!("{:.1}s", total_duration_ms as f64 / 1000.0))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic run: panels printed as each stage completes
  sgpa --result result.png --credits credits.jpg

  # Save the three panels as Markdown
  sgpa -r result.png -c credits.jpg -o sgpa.md

  # Images from URLs, a specific model, both extractions in parallel
  sgpa -r https://example.org/result.png -c https://example.org/credits.png \
       --model gpt-4.1 --parallel

  # Machine-readable report
  sgpa -r result.png -c credits.jpg --json > report.json

SECRETS:
  The model credential is read at startup from a TOML file that must not be
  committed (first match wins): --secrets, $SGPA_SECRETS, ./secrets.toml,
  ./.streamlit/secrets.toml.

    [llm]
    provider = "openai"         # optional
    model    = "gpt-4.1-mini"   # optional
    api_key  = "sk-..."

  A key already present in the environment takes precedence.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  SGPA_SECRETS            Path to the secrets file
"#;

/// Compute an SGPA from a result-sheet image and a credits-sheet image.
#[derive(Parser, Debug)]
#[command(
    name = "sgpa",
    version,
    about = "Compute an SGPA from result-sheet and credits-sheet images using Vision LLMs",
    long_about = "Upload a result image (subjects & grades) and a credits image (subjects & \
credit points). A Vision Language Model extracts both lists, matches the subjects and computes \
the credit-weighted SGPA using the scale O=10, A+=9, A=8, B+=7, B=6. The model does all the \
reading and arithmetic; check its working before relying on the result.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Result image (subjects & grades): PNG/JPEG path or HTTP/HTTPS URL.
    #[arg(short, long, env = "SGPA_RESULT_IMAGE")]
    result: Option<String>,

    /// Credits image (subjects & credit points): PNG/JPEG path or HTTP/HTTPS URL.
    #[arg(short, long, env = "SGPA_CREDITS_IMAGE")]
    credits: Option<String>,

    /// Also write the three panels as Markdown to this file.
    #[arg(short, long, env = "SGPA_OUTPUT")]
    output: Option<PathBuf>,

    /// Secrets file holding the model credential.
    #[arg(long, env = "SGPA_SECRETS")]
    secrets: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max output tokens for every call (0 = provider default).
    #[arg(long, env = "SGPA_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SGPA_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "SGPA_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL images.
    #[arg(long, env = "SGPA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Run the grades and credits extractions concurrently.
    #[arg(long, env = "SGPA_PARALLEL")]
    parallel: bool,

    /// Text file replacing the grades-extraction prompt.
    #[arg(long)]
    grades_prompt: Option<PathBuf>,

    /// Text file replacing the credits-extraction prompt.
    #[arg(long)]
    credits_prompt: Option<PathBuf>,

    /// Text file replacing the aggregation prompt ({grades}, {credits}, {grade_scale}).
    #[arg(long)]
    aggregation_prompt: Option<PathBuf>,

    /// Output the structured JSON report instead of Markdown panels.
    #[arg(long, env = "SGPA_JSON")]
    json: bool,

    /// Disable the spinner and live panels; print the report at the end.
    #[arg(long, env = "SGPA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SGPA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the report and errors.
    #[arg(short, long, env = "SGPA_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The live panels carry all the feedback that matters; keep library
    // INFO logs out of the way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Secrets ──────────────────────────────────────────────────────────
    // Exported while the process is still single-threaded; the runtime and
    // its workers are started afterwards.
    let secrets = Secrets::discover(cli.secrets.as_deref()).context("Failed to load secrets")?;
    if let Some(ref s) = secrets {
        s.apply_to_env();
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(run(cli, secrets, show_progress))
}

async fn run(cli: Cli, secrets: Option<Secrets>, show_progress: bool) -> Result<()> {
    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, secrets.as_ref(), progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = match cli.output {
        Some(ref path) => {
            calculate_to_file(cli.result.as_deref(), cli.credits.as_deref(), path, &config)
                .await
                .context("SGPA calculation failed")?
        }
        None => calculate(cli.result.as_deref(), cli.credits.as_deref(), &config)
            .await
            .context("SGPA calculation failed")?,
    };

    print_report(&cli, &report, show_progress)?;
    Ok(())
}

/// Map CLI args (and secrets-file defaults) to `SgpaConfig`.
async fn build_config(
    cli: &Cli,
    secrets: Option<&Secrets>,
    progress: Option<ProgressCallback>,
) -> Result<SgpaConfig> {
    let mut builder = SgpaConfig::builder()
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .parallel_extraction(cli.parallel);

    builder = if cli.max_tokens == 0 {
        builder.unbounded_output()
    } else {
        builder.max_tokens(cli.max_tokens)
    };

    let provider = cli
        .provider
        .clone()
        .or_else(|| secrets.and_then(|s| s.llm.provider.clone()));
    if let Some(p) = provider {
        builder = builder.provider_name(p);
    }
    let model = cli
        .model
        .clone()
        .or_else(|| secrets.and_then(|s| s.llm.model.clone()));
    if let Some(m) = model {
        builder = builder.model(m);
    }

    if let Some(ref path) = cli.grades_prompt {
        builder = builder.grades_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.credits_prompt {
        builder = builder.credits_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.aggregation_prompt {
        builder = builder.aggregation_prompt(read_prompt(path).await?);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}

fn print_report(cli: &Cli, report: &SgpaReport, panels_shown: bool) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }

    // Panels were already streamed by the progress callback.
    if !panels_shown {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(report.to_markdown().as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&report.stats.total_input_tokens.to_string()),
            dim(&report.stats.total_output_tokens.to_string()),
            report.stats.total_duration_ms,
        );
        if let Some(ref path) = cli.output {
            eprintln!("   → {}", bold(&path.display().to_string()));
        }
    }
    Ok(())
}
