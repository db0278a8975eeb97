//! Audit trail of join and split decisions.
//!
//! Recording a decision never affects control flow; callers use the log for
//! reporting and to reproduce a failing decision.

use crate::ids::{ChainId, SequenceName};
use crate::path::Strand;
use crate::range::Range;
use indexmap::IndexMap;
use std::fmt;

/// Why a candidate join was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    IdenticalBoundary,
    QueryGapTooLong,
    SubjectGapTooLong,
    QueryOverlap,
    SubjectOverlap,
    MismatchTooLong,
    IdentityDivergence,
    NoNestedElement,
    NestedOlder,
    NestedCoverage,
}

impl DenyReason {
    pub fn label(&self) -> &'static str {
        match self {
            DenyReason::IdenticalBoundary => "identical-boundary",
            DenyReason::QueryGapTooLong => "query-gap",
            DenyReason::SubjectGapTooLong => "subject-gap",
            DenyReason::QueryOverlap => "query-overlap",
            DenyReason::SubjectOverlap => "subject-overlap",
            DenyReason::MismatchTooLong => "mismatch",
            DenyReason::IdentityDivergence => "identity",
            DenyReason::NoNestedElement => "no-nested",
            DenyReason::NestedOlder => "nested-older",
            DenyReason::NestedCoverage => "nested-coverage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinOutcome {
    AllowSimple,
    AllowNested,
    Deny(DenyReason),
}

impl JoinOutcome {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, JoinOutcome::Deny(_))
    }
}

impl fmt::Display for JoinOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinOutcome::AllowSimple => write!(f, "allow-simple"),
            JoinOutcome::AllowNested => write!(f, "allow-nested"),
            JoinOutcome::Deny(reason) => write!(f, "deny-{}", reason.label()),
        }
    }
}

/// One evaluated adjacent pair
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDecision {
    pub query: SequenceName,
    pub subject: SequenceName,
    pub strand: Strand,
    pub prev_chain: ChainId,
    pub cur_chain: ChainId,
    pub prev_range: Range, // query envelope of the chain built so far
    pub cur_range: Range,
    pub outcome: JoinOutcome,
}

impl fmt::Display for JoinDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "join\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.query,
            self.subject,
            self.strand,
            self.prev_chain,
            self.prev_range.start,
            self.prev_range.end,
            self.cur_chain,
            self.cur_range.start,
            self.cur_range.end,
            self.outcome
        )
    }
}

/// What the split engine did to one chain
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRecord {
    pub query: SequenceName,
    pub chain_id: ChainId,
    pub resulting_ids: Vec<ChainId>, // surviving sub-chains, original id first when kept
    pub dropped_fragments: usize,
    pub dropped_length: u64,
    pub evidence: Vec<ChainId>, // finalized chains found inside the split gaps
}

impl SplitRecord {
    pub fn pieces(&self) -> usize {
        self.resulting_ids.len()
    }

    pub fn was_split(&self) -> bool {
        self.resulting_ids.len() > 1 || self.dropped_fragments > 0
    }
}

impl fmt::Display for SplitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join_ids = |ids: &[ChainId]| {
            if ids.is_empty() {
                "-".to_string()
            } else {
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }
        };
        write!(
            f,
            "split\t{}\t{}\t{}\t{}\t{}\t{}",
            self.query,
            self.chain_id,
            join_ids(&self.resulting_ids),
            self.dropped_fragments,
            self.dropped_length,
            join_ids(&self.evidence)
        )
    }
}

/// Outcome counts in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionSummary {
    pub outcomes: IndexMap<String, usize>,
    pub chains_examined: usize,
    pub chains_split: usize,
    pub sub_chains_created: usize,
    pub fragments_dropped: usize,
}

impl DecisionSummary {
    pub fn from_records(decisions: &[JoinDecision], splits: &[SplitRecord]) -> Self {
        let mut summary = DecisionSummary::default();
        for d in decisions {
            *summary.outcomes.entry(d.outcome.to_string()).or_insert(0) += 1;
        }
        for s in splits {
            summary.chains_examined += 1;
            if s.was_split() {
                summary.chains_split += 1;
            }
            summary.sub_chains_created += s.pieces().saturating_sub(1);
            summary.fragments_dropped += s.dropped_fragments;
        }
        summary
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }

    pub fn joins(&self) -> usize {
        self.count("allow-simple") + self.count("allow-nested")
    }
}

impl fmt::Display for DecisionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcomes = self
            .outcomes
            .iter()
            .map(|(label, n)| format!("{label}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            f,
            "{} pair decisions [{}]; {} of {} chains split into {} extra sub-chains, {} fragments dropped",
            self.outcomes.values().sum::<usize>(),
            outcomes,
            self.chains_split,
            self.chains_examined,
            self.sub_chains_created,
            self.fragments_dropped
        )
    }
}
