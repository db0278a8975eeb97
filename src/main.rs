use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use longjoin::config::{JoinConfig, SplitOrder};
use longjoin::pipeline::LongJoinPipeline;

/// Parse a number that may have metric suffix (k/K=1000, m/M=1e6, g/G=1e9)
fn parse_metric_number(s: &str) -> Result<u32, String> {
    if s.is_empty() {
        return Err("Empty string".to_string());
    }

    let (num_part, suffix) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - c.len_utf8()], Some(c)),
        _ => (s, None),
    };

    let base: f64 = num_part
        .parse()
        .map_err(|e| format!("Invalid number: {e}"))?;

    let multiplier = match suffix {
        Some('k') | Some('K') => 1000.0,
        Some('m') | Some('M') => 1_000_000.0,
        Some('g') | Some('G') => 1_000_000_000.0,
        Some(c) => {
            return Err(format!(
                "Unknown suffix '{c}'. Use k/K (1000), m/M (1e6), or g/G (1e9)"
            ))
        }
        None => 1.0,
    };

    let result = base * multiplier;

    if result < 0.0 {
        return Err(format!("Value {result} must not be negative"));
    }
    if result > u32::MAX as f64 {
        return Err(format!("Value {result} too large for u32"));
    }

    Ok(result as u32)
}

/// longjoin - Stitch fragmented alignment hits into chains and split chains
/// that span younger nested insertions
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path table to process (tab-separated, optionally gzipped)
    #[clap(value_name = "PATHS")]
    input: String,

    /// Output path table
    #[clap(short = 'o', long = "output")]
    output: String,

    /// Already-finalized chains consulted when splitting (not re-emitted)
    #[clap(short = 'f', long = "finalized")]
    finalized: Option<String>,

    /// Write one row per join decision and per examined chain to this file
    #[clap(short = 'a', long = "audit")]
    audit: Option<String>,

    /// Overlap allowed between joined fragments on either sequence
    #[clap(long = "max-overlap", default_value = "15", value_parser = parse_metric_number)]
    max_overlap: u32,

    /// Longest query gap that may be joined
    #[clap(long = "max-query-gap", default_value = "100k", value_parser = parse_metric_number)]
    max_gap_length_for_query: u32,

    /// Longest subject gap that may be joined
    #[clap(long = "max-subject-gap", default_value = "30k", value_parser = parse_metric_number)]
    max_gap_length_for_subject: u32,

    /// Longest mismatching stretch between joined fragments
    #[clap(long = "max-mismatch", default_value = "500", value_parser = parse_metric_number)]
    max_mismatch_length: u32,

    /// Identity difference tolerated between joined fragments (percentage points)
    #[clap(long = "identity-tolerance", default_value = "2.0")]
    identity_tolerance: f64,

    /// Fraction of a long gap nested elements must cover
    #[clap(long = "min-nested-coverage", default_value = "0.95")]
    min_nested_te_coverage: f64,

    /// Indel size joined without nested evidence
    #[clap(short = 'g', long = "max-gap", default_value = "5k", value_parser = parse_metric_number)]
    max_gap_length: u32,

    /// Minimum gap (and finalized material inside it) that splits a chain
    #[clap(long = "min-split", default_value = "100", value_parser = parse_metric_number)]
    min_length_to_split: u32,

    /// Sub-chains shorter than this are dropped after a split
    #[clap(long = "min-keep", default_value = "20", value_parser = parse_metric_number)]
    min_length_to_keep_chain: u32,

    /// Order chains are split in: "identity" (ascending) or "length" (descending)
    #[clap(long = "split-order", default_value = "identity")]
    split_order: SplitOrder,

    /// Skip the join stage
    #[clap(long = "no-join")]
    no_join: bool,

    /// Skip the split stage
    #[clap(long = "no-split")]
    no_split: bool,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value = "8")]
    threads: usize,

    /// Verbosity level (0 = warn, 1 = info, 2 = debug)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn join_config(&self) -> JoinConfig {
        JoinConfig {
            max_overlap: self.max_overlap,
            max_gap_length_for_query: self.max_gap_length_for_query,
            max_gap_length_for_subject: self.max_gap_length_for_subject,
            max_mismatch_length: self.max_mismatch_length,
            identity_tolerance: self.identity_tolerance,
            min_nested_te_coverage: self.min_nested_te_coverage,
            max_gap_length: self.max_gap_length,
            min_length_to_split: self.min_length_to_split,
            min_length_to_keep_chain: self.min_length_to_keep_chain,
            split_order: self.split_order,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Set up rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    let config = args.join_config();
    info!("{:?}", config);

    let pipeline = LongJoinPipeline::new(config)
        .with_join(!args.no_join)
        .with_split(!args.no_split);

    let report = pipeline
        .run_files(
            args.input.as_str(),
            args.finalized.as_deref(),
            args.output.as_str(),
            args.audit.as_deref(),
        )
        .with_context(|| format!("Failed to process {}", args.input))?;

    eprintln!("[longjoin] {}", report.summary);
    Ok(())
}
