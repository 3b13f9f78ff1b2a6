//! CLI binary for edgequake-anyconv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConverterConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_anyconv::convert::write_into_dir;
use edgequake_anyconv::handlers::default_registry;
use edgequake_anyconv::input::{default_output_path, input_name, resolve_input};
use edgequake_anyconv::{
    convert_stream, convert_to_file, CancelFlag, ConversionOption, ConversionProgressCallback,
    Converter, ConverterConfig, Direction, FileRecord, GraphMode, HandlerLifecycleCache,
    ProgressCallback,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner showing the hop in flight plus one
/// log line per abandoned candidate path.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Routing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("[{}/{}] {name}", index + 1, total))
        ));
    }

    fn on_route_start(&self, from: &str, to: &str) {
        self.bar.set_prefix("Routing");
        self.bar.set_message(format!("{from} → {to}"));
    }

    fn on_path_attempt(&self, attempt: usize, path: &str) {
        self.bar.set_message(format!("#{attempt} {path}"));
    }

    fn on_hop_start(&self, hop: usize, total: usize, handler: &str, from: &str, to: &str) {
        self.bar.set_prefix(format!("Hop {hop}/{total}"));
        self.bar.set_message(format!("{from} → {to} [{handler}]"));
    }

    fn on_path_failed(&self, attempt: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(100) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} attempt #{attempt}  {}", red("✗"), dim(&msg)));
    }

    fn on_route_complete(&self, success: bool, attempts: usize) {
        let mark = if success { green("✓") } else { red("✘") };
        self.bar.println(format!(
            "  {mark} {}",
            dim(&format!("{attempts} path(s) tried"))
        ));
        self.bar.set_prefix("Routing");
        self.bar.set_message("");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a file, output name derived from the input
  anyconv photo.png --to jpeg

  # Explicit output path
  anyconv notes.md --to html -o notes.html

  # Several files into a directory (Ctrl-C stops after the current file)
  anyconv a.md b.md c.md --to txt -o out/

  # Convert from a URL
  anyconv https://example.org/logo.png --to bmp

  # Pin the producing handler (format@handler)
  anyconv photo.png --to base64@base64

  # What can be converted at all?
  anyconv --list-formats

  # Dry run: show the first 5 candidate paths without converting
  anyconv photo.png --to bin --list-paths 5

  # Skip handler initialisation using a saved format cache
  anyconv --export-cache cache.json
  anyconv --cache cache.json photo.png --to jpeg

  # JSON summary (path, output sizes, failed attempts)
  anyconv --json photo.png --to jpeg

GRAPH MODES:
  simple     Formats with the same media type and code are one node,
             whichever handler declares them (default).
  advanced   Every (format, handler) pair is its own node.

ENVIRONMENT VARIABLES:
  ANYCONV_TO, ANYCONV_FROM, ANYCONV_OUTPUT   Same as the flags
  ANYCONV_MAX_HOPS                           Longest path tried (default 6)
  ANYCONV_CACHE                              Format cache snapshot to load
  RUST_LOG                                   Override the log filter
"#;

/// Convert files between formats by routing them through chains of handlers.
#[derive(Parser, Debug)]
#[command(
    name = "anyconv",
    version,
    about = "Convert files between formats by routing them through chains of handlers",
    long_about = "Convert files between formats. anyconv finds the shortest chain of built-in \
handlers that bridges the input format to the requested one, and falls back to the next chain \
whenever a step fails.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    inputs: Vec<String>,

    /// Target format: code, extension or media type (optionally `format@handler`).
    #[arg(short, long, env = "ANYCONV_TO")]
    to: Option<String>,

    /// Source format; guessed from the file extension when omitted.
    #[arg(short, long, env = "ANYCONV_FROM")]
    from: Option<String>,

    /// Output file (single input) or directory (several inputs).
    #[arg(short, long, env = "ANYCONV_OUTPUT")]
    output: Option<PathBuf>,

    /// Build the graph with one node per (format, handler) pair.
    #[arg(long, env = "ANYCONV_ADVANCED")]
    advanced: bool,

    /// Longest path (in hops) to try (1–32).
    #[arg(long, env = "ANYCONV_MAX_HOPS", default_value_t = 6)]
    max_hops: usize,

    /// Seed the format cache from this snapshot instead of initialising handlers.
    #[arg(long, env = "ANYCONV_CACHE")]
    cache: Option<PathBuf>,

    /// Write the format cache snapshot to this file.
    #[arg(long)]
    export_cache: Option<PathBuf>,

    /// List every known format and exit.
    #[arg(long)]
    list_formats: bool,

    /// Print the first N candidate paths and exit without converting.
    #[arg(long, value_name = "N")]
    list_paths: Option<usize>,

    /// Output a structured JSON summary instead of human-readable text.
    #[arg(long, env = "ANYCONV_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ANYCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANYCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ANYCONV_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ANYCONV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Serialize)]
struct FormatRow<'a> {
    format: &'a str,
    extension: &'a str,
    mime: &'a str,
    name: &'a str,
    input: bool,
    output: bool,
    handler: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; verbose mode always gets everything.
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

    // ── Build converter ──────────────────────────────────────────────────
    let cache = match cli.cache {
        Some(ref path) => HandlerLifecycleCache::load_snapshot(path)
            .await
            .context("Failed to load format cache")?,
        None => HandlerLifecycleCache::new(),
    };

    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };

    let config = build_config(&cli, progress.clone().map(|cb| cb as ProgressCallback))?;
    let converter = Converter::with_cache(default_registry(), config, Arc::new(cache)).await;

    for skipped in converter.catalog().skipped() {
        eprintln!(
            "{} handler '{}' unavailable: {}",
            cyan("⚠"),
            skipped.handler,
            skipped.reason
        );
    }

    if let Some(ref path) = cli.export_cache {
        converter
            .cache()
            .save_snapshot(path)
            .await
            .context("Failed to export format cache")?;
        if !cli.quiet {
            eprintln!("{} format cache written to {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    // ── List-formats mode ────────────────────────────────────────────────
    if cli.list_formats {
        print_formats(&converter, cli.json)?;
        return Ok(());
    }

    if cli.inputs.is_empty() {
        if cli.export_cache.is_some() {
            return Ok(());
        }
        anyhow::bail!("No input given. Pass at least one file or URL.");
    }
    let to_query = cli
        .to
        .as_deref()
        .context("Missing target format: pass --to <FORMAT>")?;
    let to = converter.find_option(to_query, Direction::Output)?;

    // ── Dry-run mode ─────────────────────────────────────────────────────
    if let Some(n) = cli.list_paths {
        let probe = FileRecord::new(input_name(&cli.inputs[0]), Vec::new());
        let from = resolve_from(&converter, cli.from.as_deref(), &probe)?;
        print_paths(&converter, from, to, n, cli.json)?;
        return Ok(());
    }

    // ── Single input ─────────────────────────────────────────────────────
    if cli.inputs.len() == 1 {
        let input = &cli.inputs[0];
        let output_path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(input, &to.format.extension));

        let output = convert_to_file(&converter, input, &output_path, cli.from.as_deref(), to_query)
            .await
            .context("Conversion failed")?;
        if let Some(ref cb) = progress {
            cb.bar.finish_and_clear();
        }

        if cli.json {
            let json = serde_json::to_string_pretty(&output.summary())
                .context("Failed to serialise output")?;
            println!("{json}");
        } else if !cli.quiet {
            eprintln!(
                "{}  {}  {}ms  →  {}",
                green("✔"),
                output.path,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            if !output.stats.failures.is_empty() {
                eprintln!(
                    "   {}",
                    dim(&format!("{} path(s) failed before this one", output.stats.failures.len()))
                );
            }
        }
        return Ok(());
    }

    // ── Batch ────────────────────────────────────────────────────────────
    let out_dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let timeout = converter.config().download_timeout_secs;
    let mut files = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        files.push(
            resolve_input(input, timeout)
                .await
                .with_context(|| format!("Failed to read {input}"))?,
        );
    }
    let from = converter.batch_input_option(&files, cli.from.as_deref())?;

    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.cancel();
        }
    });

    let total = files.len();
    let mut ok = 0usize;
    let mut summaries = Vec::new();
    let mut results = convert_stream(&converter, files, from, to, cancel.clone());
    while let Some(item) = results.next().await {
        match item.result {
            Ok(output) => {
                let written = write_into_dir(&output.files, &out_dir)
                    .await
                    .with_context(|| format!("Failed to write output for {}", item.name))?;
                ok += 1;
                if cli.json {
                    summaries.push(serde_json::json!({
                        "input": item.name,
                        "written": written,
                        "summary": output.summary(),
                    }));
                } else if !cli.quiet && !show_progress {
                    eprintln!("{} {} via {}", green("✓"), item.name, output.path);
                }
            }
            Err(e) => {
                if cli.json {
                    summaries.push(serde_json::json!({
                        "input": item.name,
                        "error": e.to_string(),
                    }));
                } else {
                    eprintln!("{} {}: {}", red("✗"), item.name, e);
                }
            }
        }
    }
    if let Some(ref cb) = progress {
        cb.bar.finish_and_clear();
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&summaries).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let failed = failure_note(total, ok, cancel.is_cancelled());
        eprintln!(
            "{} {}/{} files converted{}  →  {}",
            if ok == total { green("✔") } else { cyan("⚠") },
            bold(&ok.to_string()),
            total,
            failed,
            bold(&out_dir.display().to_string()),
        );
    }

    if ok == 0 {
        anyhow::bail!("No file was converted");
    }
    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mode = if cli.advanced {
        GraphMode::Advanced
    } else {
        GraphMode::Simple
    };

    let mut builder = ConverterConfig::builder()
        .mode(mode)
        .max_hops(cli.max_hops)
        .download_timeout_secs(cli.download_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--from` when given, otherwise a guess from the file extension.
fn resolve_from<'c>(
    converter: &'c Converter,
    query: Option<&str>,
    file: &FileRecord,
) -> Result<&'c ConversionOption> {
    match query {
        Some(q) => Ok(converter.find_option(q, Direction::Input)?),
        None => converter.catalog().guess_input(file).with_context(|| {
            format!(
                "Cannot guess the format of '{}'; pass --from <FORMAT>",
                file.name
            )
        }),
    }
}

fn failure_note(total: usize, ok: usize, cancelled: bool) -> String {
    let failed = total - ok;
    match (failed, cancelled) {
        (0, _) => String::new(),
        (n, true) => format!("  ({} failed or skipped after cancel)", red(&n.to_string())),
        (n, false) => format!("  ({} failed)", red(&n.to_string())),
    }
}

fn print_formats(converter: &Converter, json: bool) -> Result<()> {
    let rows: Vec<FormatRow<'_>> = converter
        .catalog()
        .options()
        .iter()
        .map(|o| FormatRow {
            format: &o.format.format,
            extension: &o.format.extension,
            mime: &o.format.media_type,
            name: &o.format.name,
            input: o.format.accepts_input,
            output: o.format.produces_output,
            handler: o.handler.name(),
        })
        .collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise formats")?
        );
        return Ok(());
    }

    println!(
        "{:<8} {:<6} {:<26} {:<4} {:<4} {}",
        "FORMAT", "EXT", "MEDIA TYPE", "IN", "OUT", "HANDLER"
    );
    for r in rows {
        println!(
            "{:<8} {:<6} {:<26} {:<4} {:<4} {}",
            r.format,
            r.extension,
            r.mime,
            if r.input { "✓" } else { "" },
            if r.output { "✓" } else { "" },
            r.handler
        );
    }
    let graph = converter.graph();
    eprintln!(
        "{}",
        dim(&format!(
            "{} nodes, {} edges ({} mode)",
            graph.node_count(),
            graph.edge_count(),
            graph.mode()
        ))
    );
    Ok(())
}

fn print_paths(
    converter: &Converter,
    from: &ConversionOption,
    to: &ConversionOption,
    n: usize,
    json: bool,
) -> Result<()> {
    let paths: Vec<_> = converter.search(from, to).take(n).collect();

    if json {
        let steps: Vec<_> = paths.iter().map(|p| p.steps()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&steps).context("Failed to serialise paths")?
        );
        return Ok(());
    }

    if paths.is_empty() {
        println!("No path from {from} to {to}");
        return Ok(());
    }
    for (i, path) in paths.iter().enumerate() {
        println!("{:>3}. {}  {}", i + 1, path, dim(&format!("({} hops)", path.len())));
    }
    Ok(())
}
