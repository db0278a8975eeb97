//! Batch harness around the join and split engines.
//!
//! A run validates its input, partitions fragments by query and processes
//! the partitions in parallel. Nothing is written unless every partition
//! succeeds and the working stores drain; outputs are committed through a
//! temporary file renamed into place.

use log::info;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::config::JoinConfig;
use crate::decision::{DecisionSummary, JoinDecision, SplitRecord};
use crate::error::{LongJoinError, Result};
use crate::format_io::{read_paths, write_decisions, write_paths};
use crate::ids::{ChainId, SequenceName};
use crate::join::join_query;
use crate::path::{Fragment, Strand};
use crate::split::{ensure_drained, split_query};
use crate::store::{sort_fragments, ChainIdAllocator, InMemoryStore};

/// Result of one run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub fragments: Vec<Fragment>,
    pub decisions: Vec<JoinDecision>,
    pub splits: Vec<SplitRecord>,
    pub summary: DecisionSummary,
}

struct QueryOutcome {
    fragments: Vec<Fragment>,
    decisions: Vec<JoinDecision>,
    splits: Vec<SplitRecord>,
}

/// Join-then-split pipeline
pub struct LongJoinPipeline {
    config: JoinConfig,
    join: bool,
    split: bool,
}

impl LongJoinPipeline {
    pub fn new(config: JoinConfig) -> Self {
        LongJoinPipeline {
            config,
            join: true,
            split: true,
        }
    }

    pub fn with_join(mut self, join: bool) -> Self {
        self.join = join;
        self
    }

    pub fn with_split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Run on in-memory fragments.
    ///
    /// `finalized` holds chains from earlier, younger rounds. They are only
    /// consulted by the split engine and are not part of the report.
    pub fn run(&self, fragments: Vec<Fragment>, finalized: Vec<Fragment>) -> Result<RunReport> {
        self.config.validate()?;
        validate_chains(&fragments)?;
        validate_chains(&finalized)?;

        let first_free = fragments
            .iter()
            .chain(finalized.iter())
            .map(|f| f.chain_id)
            .max()
            .map(|id| id.next())
            .unwrap_or(ChainId(1));
        let allocator = ChainIdAllocator::starting_at(first_free);

        let mut by_query: BTreeMap<SequenceName, Vec<Fragment>> = BTreeMap::new();
        for f in fragments {
            by_query.entry(f.query_name().clone()).or_default().push(f);
        }
        let mut reference: HashMap<SequenceName, Vec<Fragment>> = HashMap::new();
        for f in finalized {
            reference.entry(f.query_name().clone()).or_default().push(f);
        }
        info!(
            "Processing {} queries (join: {}, split: {})",
            by_query.len(),
            self.join,
            self.split
        );

        let outcomes = by_query
            .into_par_iter()
            .map(|(query, fragments)| {
                let finalized = reference.get(&query).cloned().unwrap_or_default();
                self.process_query(&query, fragments, finalized, &allocator)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = RunReport::default();
        for outcome in outcomes {
            report.fragments.extend(outcome.fragments);
            report.decisions.extend(outcome.decisions);
            report.splits.extend(outcome.splits);
        }
        sort_fragments(&mut report.fragments);
        report.summary = DecisionSummary::from_records(&report.decisions, &report.splits);
        info!("{}", report.summary);
        Ok(report)
    }

    fn process_query(
        &self,
        query: &SequenceName,
        fragments: Vec<Fragment>,
        finalized: Vec<Fragment>,
        allocator: &ChainIdAllocator,
    ) -> Result<QueryOutcome> {
        let mut working = InMemoryStore::from_fragments(fragments)?;
        let decisions = if self.join {
            join_query(&mut working, query, &self.config)?
        } else {
            Vec::new()
        };

        if !self.split {
            return Ok(QueryOutcome {
                fragments: working.into_fragments(),
                decisions,
                splits: Vec::new(),
            });
        }

        let mut output = InMemoryStore::from_fragments(finalized)?;
        let (fragments, splits) =
            split_query(&mut working, &mut output, query, allocator, &self.config)?;
        ensure_drained(&working).map_err(|e| e.with_query(query))?;
        Ok(QueryOutcome {
            fragments,
            decisions,
            splits,
        })
    }

    /// Read, run, and commit outputs only once the whole run succeeded
    pub fn run_files<P: AsRef<Path>>(
        &self,
        input: P,
        finalized: Option<P>,
        output: P,
        audit: Option<P>,
    ) -> Result<RunReport> {
        let fragments = read_paths(&input)?;
        let reference = match &finalized {
            Some(path) => read_paths(path)?,
            None => Vec::new(),
        };
        info!(
            "Loaded {} fragments and {} finalized fragments",
            fragments.len(),
            reference.len()
        );

        let report = self.run(fragments, reference)?;

        ensure_replaceable(output.as_ref())?;
        if let Some(path) = &audit {
            ensure_replaceable(path.as_ref())?;
        }
        let staged_output = stage(output.as_ref(), |w| write_paths(w, &report.fragments))?;
        let staged_audit = match &audit {
            Some(path) => Some((
                path,
                stage(path.as_ref(), |w| {
                    write_decisions(w, &report.decisions, &report.splits)
                })?,
            )),
            None => None,
        };

        persist(staged_output, output.as_ref())?;
        if let Some((path, staged)) = staged_audit {
            persist(staged, path.as_ref())?;
        }
        info!(
            "Wrote {} fragments to {}",
            report.fragments.len(),
            output.as_ref().display()
        );
        Ok(report)
    }
}

/// Write into a temporary file next to `target`
fn stage<F>(target: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut temp);
        write(&mut writer)?;
        writer.flush()?;
    }
    Ok(temp)
}

/// A commit target must be absent or a regular file
fn ensure_replaceable(target: &Path) -> Result<()> {
    match fs::metadata(target) {
        Ok(meta) if !meta.is_file() => Err(LongJoinError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exists and is not a regular file", target.display()),
        ))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn persist(temp: NamedTempFile, target: &Path) -> Result<()> {
    temp.persist(target).map_err(|e| LongJoinError::Io(e.error))?;
    Ok(())
}

/// Every chain must stay on one query, one subject and one strand
pub fn validate_chains(fragments: &[Fragment]) -> Result<()> {
    let mut seen: HashMap<ChainId, (&SequenceName, &SequenceName, Strand)> = HashMap::new();
    for f in fragments {
        let key = (f.query_name(), f.subject_name(), f.strand());
        let Some((query, subject, strand)) = seen.get(&f.chain_id).copied() else {
            seen.insert(f.chain_id, key);
            continue;
        };
        if query != key.0 || subject != key.1 {
            return Err(LongJoinError::consistency(format!(
                "chain spans {}/{} and {}/{}",
                query, subject, key.0, key.1
            ))
            .with_chain(f.chain_id)
            .with_query(f.query_name())
            .with_range(&f.query));
        }
        if strand != key.2 {
            return Err(LongJoinError::input_format(
                0,
                format!(
                    "inconsistent strand pairing in chain {} on {} at {}",
                    f.chain_id, f.query_name(), f.query
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;

    fn frag(id: u64, query: &str, qs: u32, qe: u32, ss: u32, se: u32) -> Fragment {
        Fragment::new(
            ChainId(id),
            Range::new(query, qs, qe),
            Range::new("TE1", ss, se),
            0.0,
            10,
            90.0,
        )
    }

    #[test]
    fn test_chain_validation() {
        assert!(validate_chains(&[frag(1, "chr1", 1, 100, 1, 100), frag(1, "chr1", 200, 300, 101, 201)]).is_ok());

        let err = validate_chains(&[frag(1, "chr1", 1, 100, 1, 100), frag(1, "chr2", 1, 100, 1, 100)])
            .unwrap_err();
        assert!(matches!(err, LongJoinError::Consistency { .. }));

        let err = validate_chains(&[frag(1, "chr1", 1, 100, 1, 100), frag(1, "chr1", 200, 300, 300, 200)])
            .unwrap_err();
        assert!(matches!(err, LongJoinError::InputFormat { .. }));
    }

    #[test]
    fn test_queries_processed_independently() {
        let fragments = vec![
            frag(1, "chr1", 100, 200, 50, 150),
            frag(2, "chr1", 201, 300, 151, 250),
            frag(3, "chr2", 100, 200, 50, 150),
            frag(4, "chr2", 201, 300, 151, 250),
        ];
        let report = LongJoinPipeline::new(JoinConfig::default())
            .run(fragments, Vec::new())
            .unwrap();
        let ids: Vec<u64> = report.fragments.iter().map(|f| f.chain_id.get()).collect();
        assert_eq!(ids, vec![1, 1, 3, 3]);
        assert_eq!(report.summary.joins(), 2);
        assert_eq!(report.splits.len(), 2);
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = JoinConfig {
            min_nested_te_coverage: 2.0,
            ..Default::default()
        };
        let result = LongJoinPipeline::new(config).run(vec![frag(1, "chr1", 1, 100, 1, 100)], Vec::new());
        assert!(matches!(result, Err(LongJoinError::Configuration { .. })));
    }
}
