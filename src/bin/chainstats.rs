/// chainstats - Statistics for path tables
///
/// Reports per-query chain and fragment counts, covered bases and mean
/// identity, and optionally lists the chains overlapping a region.
use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use std::collections::BTreeSet;

use longjoin::format_io::read_paths;
use longjoin::ids::ChainId;
use longjoin::path::{weighted_identity, Fragment};
use longjoin::range::Range;
use longjoin::range_set::{covered_length, total_length};
use longjoin::store::{ChainRangeView, FragmentStore, InMemoryStore};

#[derive(Parser)]
#[clap(name = "chainstats", about = "Statistics for path tables")]
struct Args {
    /// Path table (tab-separated, optionally gzipped)
    file: String,

    /// List chains overlapping a region, e.g. chr1:1000-5000
    #[clap(short = 'r', long)]
    region: Option<Range>,
}

#[derive(Debug, Default)]
struct QueryStats<'a> {
    chains: BTreeSet<ChainId>,
    fragments: Vec<&'a Fragment>,
}

impl QueryStats<'_> {
    fn aligned_bases(&self) -> u64 {
        let ranges: Vec<Range> = self.fragments.iter().map(|f| f.query.clone()).collect();
        total_length(&ranges)
    }

    fn covered_bases(&self) -> u64 {
        let ranges: Vec<Range> = self.fragments.iter().map(|f| f.query.clone()).collect();
        covered_length(&ranges)
    }
}

fn collect_stats(fragments: &[Fragment]) -> IndexMap<String, QueryStats<'_>> {
    let mut stats: IndexMap<String, QueryStats> = IndexMap::new();
    for f in fragments {
        let entry = stats.entry(f.query_name().to_string()).or_default();
        entry.chains.insert(f.chain_id);
        entry.fragments.push(f);
    }
    stats
}

fn print_stats(path: &str, fragments: &[Fragment]) {
    let stats = collect_stats(fragments);

    println!("\nStatistics for {path}:");
    println!("{}", "=".repeat(72));
    println!(
        "{:20} {:>8} {:>10} {:>14} {:>14} {:>8}",
        "query", "chains", "fragments", "aligned bp", "covered bp", "id%"
    );
    for (query, s) in &stats {
        println!(
            "{:20} {:>8} {:>10} {:>14} {:>14} {:>8.2}",
            query,
            s.chains.len(),
            s.fragments.len(),
            format_number(s.aligned_bases() as usize),
            format_number(s.covered_bases() as usize),
            weighted_identity(s.fragments.iter().copied())
        );
    }
    println!("{}", "-".repeat(72));
    println!(
        "Total: {} chains, {} fragments on {} queries",
        stats.values().map(|s| s.chains.len()).sum::<usize>(),
        fragments.len(),
        stats.len()
    );
}

fn print_region(store: &InMemoryStore, region: &Range) -> Result<()> {
    let hits = store.fragments_overlapping(&region.seqname, region.min(), region.max())?;
    let chains: BTreeSet<ChainId> = hits.iter().map(|f| f.chain_id).collect();

    println!("\nChains overlapping {region}:");
    for id in chains {
        let fragments = store.fragments_by_chain(id)?;
        let envelope = store
            .chain_envelope(id)
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let subjects: BTreeSet<String> =
            fragments.iter().map(|f| f.subject_name().to_string()).collect();
        println!(
            "  chain {:>8}  {:30} {:>4} fragments  {:6.2}% id  {}",
            id,
            envelope,
            fragments.len(),
            weighted_identity(&fragments),
            subjects.into_iter().collect::<Vec<_>>().join(",")
        );
    }
    Ok(())
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let fragments = read_paths(&args.file).with_context(|| format!("Failed to read {}", args.file))?;
    print_stats(&args.file, &fragments);

    if let Some(region) = &args.region {
        let store = InMemoryStore::from_fragments(fragments)?;
        print_region(&store, region)?;
    }

    Ok(())
}
