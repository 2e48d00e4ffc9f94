//! netwatch command-line interface.
//!
//! This binary runs offline post-capture analysis over PCAP/PCAPNG traces
//! and emits a JSON report (statistics, geo-attribution, threats, anomalies,
//! VoIP QoS) to a file path or stdout. It is a thin wrapper over the
//! `netwatch-core` analysis pipeline.
//!
//! Typical usage:
//! - `netwatch analyze capture.pcapng -o report.json`
//! - `netwatch info capture.pcap`
//! - `netwatch follow capture.pcapng -o report.json`
//!
//! Errors are reported to stderr; a non-zero exit code indicates failure to
//! read the input capture or to write the report.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use netwatch_core::error::PipelineError;
use netwatch_core::geo::NoopGeoBackend;
use netwatch_core::loader::TtlFingerprintAccumulator;
use netwatch_core::model::{AnalysisResult, ProgressEvent, Severity};
use netwatch_core::{Orchestrator, PcapCaptureReader, PipelineConfig};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netwatch")]
#[command(
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (commit ",
        env!("NETWATCH_BUILD_COMMIT"),
        ", built ",
        env!("NETWATCH_BUILD_DATE"),
        ")"
    )
)]
#[command(
    about = "Offline post-capture analyzer for PCAP/PCAPNG traces.",
    long_about = None,
    after_help = "Examples:\n  netwatch analyze capture.pcapng -o report.json\n  netwatch info capture.pcap\n  netwatch follow capture.pcapng -o report.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a capture file and write a versioned JSON report.
    #[command(alias = "analyse")]
    Analyze {
        /// Path to a .pcap or .pcapng file
        input: PathBuf,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,

        /// Exit with a non-zero code if High or Critical severity threats are present
        #[arg(long)]
        strict: bool,

        /// List detected threats after analysis
        #[arg(long)]
        list_threats: bool,

        /// Load pipeline configuration overrides from a TOML file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Follow a capture file that is still growing and rewrite full reports.
    Follow {
        /// Path to a .pcap or .pcapng file
        input: PathBuf,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,

        /// Exit with a non-zero code if High or Critical severity threats are present
        #[arg(long)]
        strict: bool,

        /// List detected threats after analysis
        #[arg(long)]
        list_threats: bool,

        /// Load pipeline configuration overrides from a TOML file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Loop interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after N iterations (tests only).
        #[arg(long, hide = true)]
        max_iterations: Option<u64>,
    },
    /// Show capture metadata (no protocol analysis).
    Info {
        /// Path to a .pcap or .pcapng file
        input: PathBuf,

        /// Output JSON metadata to stdout
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "compact")]
        pretty: bool,

        /// Compact JSON output (default)
        #[arg(long)]
        compact: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return ExitCode::from(2);
        }
    };

    let cli = Cli::parse();
    let result = runtime.block_on(dispatch(cli.command));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

async fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Analyze {
            input,
            report,
            stdout,
            pretty,
            compact,
            quiet,
            strict,
            list_threats,
            config,
        } => {
            cmd_analyze(
                input,
                report,
                stdout,
                pretty,
                compact,
                quiet,
                strict,
                list_threats,
                config,
            )
            .await
        }
        Commands::Info { input, json, pretty, compact } => cmd_info(input, json, pretty, compact).await,
        Commands::Follow {
            input,
            report,
            stdout,
            pretty,
            compact,
            quiet,
            strict,
            list_threats,
            config,
            interval_ms,
            max_iterations,
        } => {
            cmd_follow(
                input,
                report,
                stdout,
                pretty,
                compact,
                quiet,
                strict,
                list_threats,
                config,
                interval_ms,
                max_iterations,
            )
            .await
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        CliError::new(err.to_string(), None)
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&text)
        .map_err(|err| CliError::new(format!("invalid config file: {err}"), Some("check the TOML syntax".to_string())))
}

fn has_strict_violations(result: &AnalysisResult) -> bool {
    result
        .threats
        .iter()
        .any(|t| !t.is_false_positive && t.severity >= Severity::High)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_analyze(
    input: PathBuf,
    report: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    compact: bool,
    quiet: bool,
    strict: bool,
    list_threats: bool,
    config_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;
    let report = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing report output",
                Some("pass --report <FILE> or use --stdout".to_string()),
            )
        })?)
    };

    if let Some(report_path) = report.as_ref() {
        check_report_differs_from_input(report_path, &input_abs)?;
    }

    let config = load_config(config_path.as_deref())?;
    let result = run_pipeline(&resolved_input, &config, quiet).await?;
    let json = serialize_json(result.as_ref(), pretty, compact)?;

    if stdout {
        print!("{}", json);
        if list_threats && !quiet {
            print_threats_summary(&result);
        }
        if strict && has_strict_violations(&result) {
            return Err(CliError::new(
                "high or critical severity threats detected",
                Some("use --list-threats to inspect".to_string()),
            ));
        }
        return Ok(());
    }

    let report = report.ok_or_else(|| {
        CliError::new(
            "missing report output",
            Some("pass --report <FILE> or use --stdout".to_string()),
        )
    })?;
    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }
    fs::write(&report, json).with_context(|| format!("Failed to write report: {}", report.display()))?;

    if list_threats && !quiet {
        print_threats_summary(&result);
    }
    if !quiet {
        eprintln!("OK: report written -> {}", report.display());
    }
    if strict && has_strict_violations(&result) {
        return Err(CliError::new(
            "high or critical severity threats detected",
            Some("use --list-threats to inspect".to_string()),
        ));
    }
    Ok(())
}

/// Runs the full pipeline against `path`, printing progress to stderr
/// unless `quiet`.
async fn run_pipeline(path: &Path, config: &PipelineConfig, quiet: bool) -> Result<std::sync::Arc<AnalysisResult>, CliError> {
    let mut orchestrator = Orchestrator::new(
        PcapCaptureReader,
        TtlFingerprintAccumulator::new(),
        NoopGeoBackend,
        config.clone(),
    );
    let progress = move |event: ProgressEvent| {
        if quiet {
            return;
        }
        eprintln!(
            "[{:>3}%] {:?}{} - {}",
            event.percent,
            event.phase,
            event
                .sub_phase
                .as_ref()
                .map(|s| format!("/{s}"))
                .unwrap_or_default(),
            event.detail
        );
    };
    let result = orchestrator
        .analyze(path, &progress)
        .await
        .map_err(CliError::from)?;
    Ok(result)
}

fn check_report_differs_from_input(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let report_abs = report_path
        .parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose()
        .with_context(|| format!("Failed to resolve output path: {}", report_path.display()))?;
    if let Some(report_dir) = report_abs {
        let report_target = report_dir.join(
            report_path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?,
        );
        if report_target == input_abs {
            return Err(CliError::new(
                format!("report path must differ from input: {}", report_path.display()),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_follow(
    input: PathBuf,
    report: Option<PathBuf>,
    stdout: bool,
    pretty: bool,
    compact: bool,
    quiet: bool,
    strict: bool,
    list_threats: bool,
    config_path: Option<PathBuf>,
    interval_ms: u64,
    max_iterations: Option<u64>,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;

    let report = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing report output",
                Some("pass --report <FILE> or use --stdout".to_string()),
            )
        })?)
    };
    if let Some(report_path) = report.as_ref() {
        check_report_differs_from_input(report_path, &input_abs)?;
    }

    let config = load_config(config_path.as_deref())?;

    let mut last_seen: Option<FollowSeen> = None;
    let mut last_threats: Option<Vec<ThreatSummary>> = None;
    let mut last_warning: Option<Instant> = None;
    let mut iterations = 0u64;
    let interval = Duration::from_millis(interval_ms);

    loop {
        if let Some(max) = max_iterations {
            if iterations >= max {
                break;
            }
        }
        iterations += 1;

        let meta = fs::metadata(&resolved_input)
            .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
        if !meta.is_file() {
            return Err(CliError::new(
                format!("input is not a file: {}", input.display()),
                Some("use a .pcap or .pcapng file".to_string()),
            ));
        }

        let current = FollowSeen {
            size_bytes: meta.len(),
            modified: meta.modified().ok(),
        };
        let (changed, rotated) = follow_should_analyze(current, last_seen);
        if rotated {
            last_threats = None;
        }
        last_seen = Some(current);

        if !changed {
            if !quiet {
                eprintln!("follow: no change");
            }
            tokio::time::sleep(interval).await;
            continue;
        }

        if !quiet {
            eprintln!("follow: analyzing {}", resolved_input.display());
        }

        match run_pipeline(&resolved_input, &config, quiet).await {
            Ok(result) => {
                let json = serialize_json(result.as_ref(), pretty, compact)?;
                if stdout {
                    println!("{}", json);
                } else if let Some(report_path) = report.as_ref() {
                    write_report_atomic(report_path, &json)?;
                }

                if list_threats && !quiet {
                    let summary = threats_summary(&result);
                    if last_threats.as_ref() != Some(&summary) {
                        print_summary_lines(&summary);
                        last_threats = Some(summary);
                    }
                }

                if !quiet {
                    if let Some(report_path) = report.as_ref() {
                        eprintln!("OK: report written -> {}", report_path.display());
                    } else {
                        eprintln!("OK: report emitted");
                    }
                }
                if strict && has_strict_violations(&result) {
                    return Err(CliError::new(
                        "high or critical severity threats detected",
                        Some("use --list-threats to inspect".to_string()),
                    ));
                }
            }
            Err(err) => {
                if is_transient_error(&err) {
                    if !quiet && should_warn(&mut last_warning) {
                        eprintln!("warning: capture appears incomplete; retrying ({})", err);
                    }
                } else {
                    return Err(CliError::new(
                        format!("analysis failed: {err}"),
                        Some("check capture integrity or permissions".to_string()),
                    ));
                }
            }
        }

        tokio::time::sleep(interval).await;
    }

    Ok(())
}

fn serialize_json<T: Serialize>(value: &T, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(value)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(value)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ThreatSummary {
    threat_type: String,
    severity: String,
    count: u64,
}

fn threats_summary(result: &AnalysisResult) -> Vec<ThreatSummary> {
    use std::collections::HashMap;
    let mut counts: HashMap<(String, String), u64> = HashMap::new();
    for threat in &result.threats {
        if threat.is_false_positive {
            continue;
        }
        *counts
            .entry((threat.threat_type.clone(), threat.severity.to_string()))
            .or_insert(0) += 1;
    }
    let mut summary: Vec<ThreatSummary> = counts
        .into_iter()
        .map(|((threat_type, severity), count)| ThreatSummary {
            threat_type,
            severity,
            count,
        })
        .collect();
    summary.sort_by(|a, b| a.threat_type.cmp(&b.threat_type).then_with(|| a.severity.cmp(&b.severity)));
    summary
}

fn print_summary_lines(summary: &[ThreatSummary]) {
    eprintln!("Detected threats:");
    for item in summary {
        eprintln!("  {} [{}] x{}", item.threat_type, item.severity, item.count);
    }
}

fn print_threats_summary(result: &AnalysisResult) {
    print_summary_lines(&threats_summary(result));
}

#[derive(Debug, Clone, Copy)]
struct FollowSeen {
    size_bytes: u64,
    modified: Option<SystemTime>,
}

fn follow_should_analyze(current: FollowSeen, last: Option<FollowSeen>) -> (bool, bool) {
    let mut rotated = false;
    let changed = match last {
        None => true,
        Some(prev) => match current.size_bytes.cmp(&prev.size_bytes) {
            std::cmp::Ordering::Less => {
                rotated = true;
                true
            }
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => match (current.modified, prev.modified) {
                (Some(now), Some(then)) => now > then,
                _ => false,
            },
        },
    };
    (changed, rotated)
}

fn write_report_atomic(path: &Path, json: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    fs::write(&tmp_path, json).with_context(|| format!("Failed to write report: {}", tmp_path.display()))?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to replace report: {}", path.display()))?;
            fs::rename(&tmp_path, path)
                .with_context(|| format!("Failed to replace report: {}", path.display()))?;
        } else {
            return Err(CliError::new(
                format!("Failed to move report into place: {err}"),
                Some("check write permissions".to_string()),
            ));
        }
    }

    Ok(())
}

fn is_transient_error(err: &dyn std::fmt::Display) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("incomplete") || msg.contains("unexpected end") || msg.contains("eof")
}

fn should_warn(last_warning: &mut Option<Instant>) -> bool {
    let now = Instant::now();
    let emit = last_warning
        .map(|last| now.duration_since(last) >= Duration::from_secs(5))
        .unwrap_or(true);
    if emit {
        *last_warning = Some(now);
    }
    emit
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

async fn cmd_info(input: PathBuf, json: bool, pretty: bool, compact: bool) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;

    let info = collect_pcap_info(&resolved_input, meta.len()).await?;
    let json_output = json || pretty || compact;
    if json_output {
        let json = serialize_json(&info, pretty, compact)?;
        print!("{}", json);
        return Ok(());
    }

    println!("file: {}", info.path);
    println!("format: {}", info.capture_type);
    println!("bytes: {}", info.size_bytes);
    println!("packets: {}", info.packets);
    println!("time_start: {}", info.first_ts.as_deref().unwrap_or("unknown"));
    println!("time_end: {}", info.last_ts.as_deref().unwrap_or("unknown"));
    println!("duration_s: {}", info.duration_s.unwrap_or(0.0));
    Ok(())
}

#[derive(Debug, Serialize)]
struct PcapInfo {
    path: String,
    size_bytes: u64,
    capture_type: String,
    packets: u64,
    first_ts: Option<String>,
    last_ts: Option<String>,
    duration_s: Option<f64>,
}

async fn collect_pcap_info(input: &Path, size_bytes: u64) -> Result<PcapInfo, CliError> {
    use netwatch_core::CaptureReader;

    let capture_type = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("unknown")
        .to_ascii_lowercase();

    let reader = PcapCaptureReader;
    let mut handle = reader
        .start_stream(input)
        .await
        .map_err(|err| CliError::new(err.to_string(), None))?;

    let mut packets = 0u64;
    let mut first_ts: Option<u128> = None;
    let mut last_ts: Option<u128> = None;
    loop {
        match reader
            .next_packet(&mut handle)
            .await
            .map_err(|err| CliError::new(err.to_string(), None))?
        {
            Some(record) => {
                packets += 1;
                first_ts = Some(first_ts.map_or(record.timestamp_ns, |ts| ts.min(record.timestamp_ns)));
                last_ts = Some(last_ts.map_or(record.timestamp_ns, |ts| ts.max(record.timestamp_ns)));
            }
            None => break,
        }
    }
    reader.stop(handle).await;

    let duration_s = match (first_ts, last_ts) {
        (Some(start), Some(end)) if end >= start => Some((end - start) as f64 / 1_000_000_000.0),
        _ => None,
    };

    Ok(PcapInfo {
        path: input.display().to_string(),
        size_bytes,
        capture_type,
        packets,
        first_ts: ts_to_rfc3339(first_ts),
        last_ts: ts_to_rfc3339(last_ts),
        duration_s,
    })
}

fn ts_to_rfc3339(ts: Option<u128>) -> Option<String> {
    let ts = ts?;
    OffsetDateTime::from_unix_timestamp_nanos(ts as i128)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        ));
    }
    if matches.len() > 1 {
        let hint = "pass a single capture file, or run once per file".to_string();
        let mut message = format!("multiple files match pattern '{}' ({} matches)", pattern, matches.len());
        let listed = matches.iter().take(3).collect::<Vec<_>>();
        if !listed.is_empty() {
            let mut details = String::new();
            details.push_str("; matches: ");
            details.push_str(
                &listed
                    .into_iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            if matches.len() > 3 {
                details.push_str(", ...");
            }
            message.push_str(&details);
        }
        return Err(CliError::new(message, Some(hint)));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
