//! Protoscope CLI - Command-line interface
//!
//! Runs the analysis engine headless over candump captures and raw streams.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use protoscope_core::cli::report::{self, OutputFormat};
use protoscope_core::cli::{print_exit_codes, render, CliResult};
use protoscope_core::config::{AnalysisConfig, LoggingConfig};
use protoscope_core::core::analysis::frame::payloads_for_id;
use protoscope_core::core::analysis::{
    detect_checksum, progress_channel, ChecksumDiscoveryEngine, DetectOptions, DiscoveryResult, Frame,
    FramingDetector, MirrorFrameDetector, MirrorGroup, PayloadAnalysis, PayloadAnalyzer,
};
use protoscope_core::core::capture;
use protoscope_core::core::protocol::NativeChecksum;

/// Protoscope CLI
#[derive(Parser, Debug)]
#[command(
    name = "protoscope-cli",
    version,
    about = "Protocol reverse-engineering toolkit",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PROTOSCOPE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover checksums per frame ID
    Checksum {
        /// candump log
        capture: PathBuf,

        /// Only these frame IDs (hex)
        #[arg(long = "id", value_parser = parse_frame_id)]
        ids: Vec<u32>,

        /// Checksum positions, negative from the end
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        positions: Option<Vec<i32>>,

        /// Minimum frames per ID
        #[arg(long)]
        min_samples: Option<usize>,

        /// Minimum match percentage
        #[arg(long)]
        min_rate: Option<f64>,

        /// Search all CRC-16 polynomials
        #[arg(long)]
        brute_force_crc16: bool,

        /// Skip the XOR / sum-8 phase
        #[arg(long)]
        no_simple: bool,

        /// Print progress to stderr
        #[arg(long)]
        progress: bool,
    },

    /// Rank registry algorithms for one frame ID
    Detect {
        /// candump log
        capture: PathBuf,

        /// Frame ID (hex)
        #[arg(long, value_parser = parse_frame_id)]
        id: u32,

        /// Checksum position, negative from the end
        #[arg(long, allow_negative_numbers = true)]
        position: Option<i32>,

        /// Checksum width in bytes
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        bytes: Option<u8>,

        /// First byte covered by the checksum
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        calc_start: i32,

        /// End of the covered range (exclusive)
        #[arg(long, allow_negative_numbers = true)]
        calc_end: Option<i32>,

        /// Samples to test
        #[arg(long, default_value_t = 20)]
        max_samples: usize,
    },

    /// Classify byte roles and multi-byte patterns per frame ID
    Patterns {
        /// candump log
        capture: PathBuf,

        /// Only these frame IDs (hex)
        #[arg(long = "id", value_parser = parse_frame_id)]
        ids: Vec<u32>,
    },

    /// Infer framing of a raw byte stream
    Framing {
        /// Stream file
        stream: PathBuf,

        /// The file holds hex text instead of raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Find frame IDs that mirror each other
    Mirrors {
        /// candump log
        capture: PathBuf,

        /// Timestamp tolerance (µs)
        #[arg(long)]
        tolerance_us: Option<u64>,
    },

    /// Run every frame analysis over a capture
    Analyze {
        /// candump log
        capture: PathBuf,

        /// Print progress to stderr
        #[arg(long)]
        progress: bool,
    },

    /// Print the exit code table
    ExitCodes,
}

fn parse_frame_id(text: &str) -> Result<u32, String> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid frame id `{text}`: {e}"))
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    let default = if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "error".to_string()
    } else {
        logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    Ok(match path {
        Some(path) => AnalysisConfig::load_from(path)?,
        None => AnalysisConfig::load()?,
    })
}

fn load_frames(path: &Path, ids: &[u32]) -> anyhow::Result<Vec<Frame>> {
    let mut frames = capture::read_capture(path)?;
    if !ids.is_empty() {
        frames.retain(|f| ids.contains(&f.id));
    }
    tracing::info!(frames = frames.len(), path = %path.display(), "capture loaded");
    Ok(frames)
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            token.cancel();
        }
    });
}

async fn discover(frames: &[Frame], config: &AnalysisConfig, progress: bool) -> anyhow::Result<DiscoveryResult> {
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let engine = ChecksumDiscoveryEngine::new(NativeChecksum::new(), config.checksum.clone()).with_cancellation(token);
    if !progress {
        return Ok(engine.discover(frames).await?);
    }

    let (tx, mut rx) = progress_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let polys = match (event.polynomials_tested, event.polynomials_total) {
                (Some(tested), Some(total)) => format!(" {}/{}", tested, total),
                _ => String::new(),
            };
            let id = event.current_frame_id.map(|id| format!(" 0x{:X}", id)).unwrap_or_default();
            eprintln!(
                "[{}/{}]{} {:?}{}",
                event.frame_id_index + 1,
                event.total_frame_ids,
                id,
                event.phase,
                polys
            );
        }
    });

    let engine = engine.with_progress(tx);
    let result = engine.discover(frames).await;
    drop(engine);
    let _ = printer.await;
    Ok(result?)
}

fn analyze_payloads(frames: &[Frame], config: &AnalysisConfig) -> BTreeMap<u32, PayloadAnalysis> {
    let analyzer = PayloadAnalyzer::new(config.mux.clone(), config.patterns.clone());
    let mut ids: Vec<u32> = frames.iter().map(|f| f.id).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| (id, analyzer.analyze(&payloads_for_id(frames, id))))
        .collect()
}

fn payloads_text(analyses: &BTreeMap<u32, PayloadAnalysis>) -> String {
    analyses
        .iter()
        .map(|(id, analysis)| format!("0x{:03X}\n{}", id, report::payload_text(analysis)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Combined report of the `analyze` command
#[derive(Debug, Serialize)]
struct FullReport {
    frame_count: usize,
    checksums: DiscoveryResult,
    payloads: BTreeMap<u32, PayloadAnalysis>,
    mirrors: Vec<MirrorGroup>,
}

fn full_report_text(r: &FullReport) -> String {
    format!(
        "{} frames\n\n== Checksums ==\n{}\n\n== Payloads ==\n{}\n\n== Mirrors ==\n{}",
        r.frame_count,
        report::discovery_text(&r.checksums),
        payloads_text(&r.payloads),
        report::mirrors_text(&r.mirrors)
    )
}

async fn run(cli: &Cli, mut config: AnalysisConfig) -> anyhow::Result<CliResult> {
    let format = cli.format;

    match &cli.command {
        Commands::Checksum {
            capture,
            ids,
            positions,
            min_samples,
            min_rate,
            brute_force_crc16,
            no_simple,
            progress,
        } => {
            let options = &mut config.checksum;
            if let Some(positions) = positions {
                options.checksum_positions = positions.clone();
            }
            if let Some(n) = min_samples {
                options.min_samples = *n;
            }
            if let Some(rate) = min_rate {
                options.min_match_rate = *rate;
            }
            options.brute_force_crc16 |= *brute_force_crc16;
            if *no_simple {
                options.try_simple_first = false;
            }

            let frames = load_frames(capture, ids)?;
            let result = discover(&frames, &config, *progress).await?;
            println!("{}", render(format, &result, report::discovery_text)?);

            if result.summary.frames_with_checksum == 0 {
                return Ok(CliResult::not_found("No checksum found"));
            }
        }

        Commands::Detect {
            capture,
            id,
            position,
            bytes,
            calc_start,
            calc_end,
            max_samples,
        } => {
            let frames = load_frames(capture, &[*id])?;
            let payloads = payloads_for_id(&frames, *id);

            let mut options = DetectOptions::default()
                .with_max_samples(*max_samples)
                .with_calc_range(*calc_start, *calc_end);
            if let Some(position) = position {
                options = options.with_position(*position);
            }
            if let Some(bytes) = bytes {
                options = options.with_byte_count(usize::from(*bytes));
            }

            let results = detect_checksum(&NativeChecksum::new(), &payloads, &options).await?;
            println!("{}", render(format, results.as_slice(), report::detected_text)?);

            if results.is_empty() {
                return Ok(CliResult::not_found(format!("No checksum matched frame ID 0x{:X}", id)));
            }
        }

        Commands::Patterns { capture, ids } => {
            let frames = load_frames(capture, ids)?;
            let analyses = analyze_payloads(&frames, &config);
            println!("{}", render(format, &analyses, payloads_text)?);
        }

        Commands::Framing { stream, hex } => {
            let data = if *hex {
                capture::read_hex(stream)?
            } else {
                capture::read_raw(stream)?
            };
            let result = FramingDetector::new().detect(&data);
            println!("{}", render(format, &result, report::framing_text)?);

            if result.best.is_none() {
                return Ok(CliResult::not_found(result.note));
            }
        }

        Commands::Mirrors { capture, tolerance_us } => {
            if let Some(tolerance) = tolerance_us {
                config.mirror.tolerance_us = *tolerance;
            }
            let frames = load_frames(capture, &[])?;
            let groups = MirrorFrameDetector::new(config.mirror.clone()).detect_frames(&frames);
            println!("{}", render(format, groups.as_slice(), report::mirrors_text)?);
        }

        Commands::Analyze { capture, progress } => {
            let frames = load_frames(capture, &[])?;
            let full = FullReport {
                frame_count: frames.len(),
                checksums: discover(&frames, &config, *progress).await?,
                payloads: analyze_payloads(&frames, &config),
                mirrors: MirrorFrameDetector::new(config.mirror.clone()).detect_frames(&frames),
            };
            println!("{}", render(format, &full, full_report_text)?);
        }

        Commands::ExitCodes => print_exit_codes(),
    }

    Ok(CliResult::success())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return CliResult::from_error(&err).to_exit_code();
        }
    };
    init_tracing(&cli, &config.logging);

    match run(&cli, config).await {
        Ok(result) => {
            if let (false, Some(msg)) = (result.is_success(), result.message()) {
                eprintln!("{msg}");
            }
            result.to_exit_code()
        }
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("Error: {err:#}");
            CliResult::from_error(&err).to_exit_code()
        }
    }
}
