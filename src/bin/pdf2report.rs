//! CLI binary for edgequake-pdf2report.
//!
//! A thin shim over the library crate: maps CLI flags to `ReportConfig`,
//! drives a `ReportSession` and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2report::pipeline::input;
use edgequake_pdf2report::{
    extract_text, new_session, write_report, AnalysisOutput, DefaultSession, GeneratedReport,
    Interaction, ProgressCallback, ReportConfig, ReportOutput, ReportProgressCallback, Stage,
    UploadedDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
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

/// One spinner per stage; a log line when the stage ends.
///
/// Stages never overlap, so a single slot is enough. A fresh bar is created
/// for every stage, which keeps the callback usable across the interactions
/// of an `--interactive` session.
struct CliProgressCallback {
    current: Mutex<Option<(ProgressBar, Instant)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
        })
    }

    fn spinner(stage: Stage) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_message(format!("{stage}…"));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    /// Clear the active spinner and return how long its stage ran.
    fn finish(&self) -> f64 {
        let taken = self.current.lock().ok().and_then(|mut slot| slot.take());
        match taken {
            Some((bar, started)) => {
                bar.finish_and_clear();
                started.elapsed().as_secs_f64()
            }
            None => 0.0,
        }
    }
}

impl ReportProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.finish();
        if let Ok(mut slot) = self.current.lock() {
            *slot = Some((Self::spinner(stage), Instant::now()));
        }
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let secs = self.finish();
        eprintln!(
            "  {} {:<30} {:<12} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{output_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        );
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let secs = self.finish();
        // Keep the log line on one row; the full error follows from main.
        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            let head: String = first_line.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            first_line.to_string()
        };
        eprintln!(
            "  {} {:<30} {}  {}",
            red("✗"),
            stage.to_string(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a template: table of contents + structure summary
  pdf2report template.pdf

  # Analyse and write a new report on a topic
  pdf2report template.pdf --topic "AI 윤리"

  # Save the report somewhere else
  pdf2report template.pdf --topic "탄소중립 추진 전략" -o reports/

  # Several topics against the same template (one per line, empty line skips)
  pdf2report template.pdf --interactive

  # Template from a URL
  pdf2report https://example.com/annual-report.pdf --topic "2025 사업 계획"

  # Only print the extracted text (no API key needed)
  pdf2report --extract-only template.pdf

  # JSON output
  pdf2report --json template.pdf --topic "AI 윤리" > report.json

OUTPUT:
  The report is saved as "<topic>_보고서.txt" (text/plain) in --output-dir.
  Characters that cannot appear in file names are replaced by "_".

  Only the first 4000 characters of the template are sent to the model.
  A notice is printed when the template is longer than that.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider, model gpt-4)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID (used together with the above)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)

SETUP:
  1. Nothing for pdfium: it is embedded in the binary (default build) or
     downloaded once on first run. PDFIUM_LIB_PATH overrides both.
  2. Set API key:     export OPENAI_API_KEY=sk-...
  3. Run:             pdf2report template.pdf --topic "AI 윤리"
"#;

/// Analyse a template PDF and write new reports in its style.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2report",
    version,
    about = "Analyse a template PDF and write new reports in its style using LLMs",
    long_about = "Extract the text of a template PDF (local file or URL), ask an LLM for its \
table of contents and a summary of its structure and tone, and optionally write a new report \
on a topic of your choice in the same format. Supports OpenAI, Anthropic, Google Gemini, \
Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL of the template.
    input: String,

    /// Topic of the new report. Without it only the analysis runs.
    #[arg(short, long, env = "PDF2REPORT_TOPIC")]
    topic: Option<String>,

    /// Directory the report file is written to.
    #[arg(short, long, env = "PDF2REPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// After the analysis, read topics from stdin, one per line.
    #[arg(short, long)]
    interactive: bool,

    /// Print the extracted text only; no LLM calls.
    #[arg(long)]
    extract_only: bool,

    /// Output structured JSON instead of text.
    #[arg(long, env = "PDF2REPORT_JSON")]
    json: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2REPORT_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2REPORT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2REPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2REPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "PDF2REPORT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active.
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    ensure_pdfium(&cli)?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let extracted = extract_text(&cli.input, &config)
            .await
            .context("Text extraction failed")?;
        if cli.json {
            print_json(&extracted)?;
        } else {
            print_stdout(&extracted.text)?;
            if !cli.quiet {
                eprintln!(
                    "{} {} chars extracted in {}ms",
                    green("✔"),
                    extracted.char_count(),
                    extracted.extract_duration_ms
                );
            }
        }
        return Ok(());
    }

    // ── Analysis (+ report) ──────────────────────────────────────────────
    let document = input::resolve_input(&cli.input, cli.download_timeout)
        .await
        .context("Failed to read input")?;
    let mut session = new_session(&config).context("Failed to set up LLM provider")?;

    let topic = cli.topic.clone().unwrap_or_default();
    run_interaction(&cli, &mut session, &document, &topic, true).await?;

    if cli.interactive {
        interactive_loop(&cli, &mut session, &document).await?;
    }

    Ok(())
}

/// Make sure the pdfium library is on disk before the first extraction.
///
/// The `bundled` build unpacks the embedded copy; otherwise the first run
/// downloads it into the cache, with a progress bar unless `--quiet`.
fn ensure_pdfium(cli: &Cli) -> Result<()> {
    #[cfg(feature = "bundled")]
    {
        let _ = cli;
        tokio::task::block_in_place(pdfium_auto::ensure_pdfium_bundled)
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        if cli.quiet {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        } else {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.set_message("Connecting…");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        }
    }

    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder().download_timeout_secs(cli.download_timeout);
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// One session interaction: analysis, then the report if `topic` is set.
///
/// `print_analysis` is false for follow-up topics in interactive mode, where
/// the table of contents and summary were already shown.
async fn run_interaction(
    cli: &Cli,
    session: &mut DefaultSession,
    document: &UploadedDocument,
    topic: &str,
    print_analysis: bool,
) -> Result<()> {
    let start = Instant::now();
    let state = match session
        .interact(Interaction::new(Some(document.clone()), topic))
        .await
    {
        Ok(state) => state.clone(),
        Err(e) => {
            // The report failed but the analysis went through: still show it.
            if let Some(analysis) = session.state().analysis() {
                if cli.json {
                    print_json(analysis)?;
                } else if print_analysis {
                    print_analysis_text(cli, analysis)?;
                }
            }
            return Err(e).context("Report pipeline failed");
        }
    };

    let analysis = state
        .analysis()
        .context("No analysis produced for the uploaded document")?;

    match state.report() {
        Some(report) => {
            if cli.json {
                print_json(&ReportOutput {
                    analysis: analysis.clone(),
                    report: report.clone(),
                })?;
            } else {
                if print_analysis {
                    print_analysis_text(cli, analysis)?;
                }
                print_report_text(report)?;
            }
            let path = write_report(report, &cli.output_dir)
                .await
                .context("Failed to save report")?;
            if !cli.quiet {
                eprintln!(
                    "{} {}  {}ms  →  {}",
                    green("✔"),
                    report.file_name(),
                    start.elapsed().as_millis(),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            if cli.json {
                print_json(analysis)?;
            } else {
                print_analysis_text(cli, analysis)?;
            }
            if !cli.quiet && !cli.interactive {
                eprintln!(
                    "{} Analysis done in {}ms. Pass --topic to write a report.",
                    green("✔"),
                    start.elapsed().as_millis()
                );
            }
        }
    }
    Ok(())
}

/// Read topics line by line until EOF; every non-empty line is one report.
async fn interactive_loop(
    cli: &Cli,
    session: &mut DefaultSession,
    document: &UploadedDocument,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan("topic›"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            eprintln!();
            return Ok(());
        };
        let topic = line.trim_end_matches('\r');
        if topic.trim().is_empty() {
            continue;
        }

        // A failed topic does not end the session.
        if let Err(e) = run_interaction(cli, session, document, topic, false).await {
            eprintln!("{} {:#}", red("✘"), e);
        }
    }
}

fn print_analysis_text(cli: &Cli, analysis: &AnalysisOutput) -> Result<()> {
    if analysis.excerpt_truncated && !cli.quiet {
        eprintln!(
            "{} {} has {} chars; the model only saw the first {}.",
            cyan("⚠"),
            analysis.document_name,
            analysis.extracted_chars,
            edgequake_pdf2report::prompts::EXCERPT_CHARS,
        );
    }
    let text = format!(
        "## Table of contents\n\n```markdown\n{}\n```\n\n## Structure summary\n\n{}\n",
        analysis.table_of_contents, analysis.structure_summary
    );
    print_stdout(&text)
}

fn print_report_text(report: &GeneratedReport) -> Result<()> {
    print_stdout(&format!("\n## {}\n\n{}", report.file_name(), report.text))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn print_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    // Ensure a trailing newline on stdout.
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
