use crate::ids::{ChainId, SequenceName};
use crate::range::Range;
use std::fmt;

/// Relative strand of a fragment once the query is on the direct strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Direct,
    Reverse,
}

impl Strand {
    pub fn as_char(&self) -> char {
        match self {
            Strand::Direct => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One local alignment hit (HSP) between a query and a subject sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub chain_id: ChainId,
    pub query: Range,
    pub subject: Range,
    pub e_value: f64,
    pub score: i64,
    pub identity: f64, // percent, 0-100
}

impl Fragment {
    pub fn new(
        chain_id: ChainId,
        query: Range,
        subject: Range,
        e_value: f64,
        score: i64,
        identity: f64,
    ) -> Self {
        Fragment {
            chain_id,
            query,
            subject,
            e_value,
            score,
            identity,
        }
    }

    pub fn query_name(&self) -> &SequenceName {
        &self.query.seqname
    }

    pub fn subject_name(&self) -> &SequenceName {
        &self.subject.seqname
    }

    pub fn query_length(&self) -> u32 {
        self.query.length()
    }

    /// Strand of the subject relative to the query.
    ///
    /// Only meaningful after `normalize`, once the query is direct.
    pub fn strand(&self) -> Strand {
        if self.query.is_on_direct_strand() == self.subject.is_on_direct_strand() {
            Strand::Direct
        } else {
            Strand::Reverse
        }
    }

    /// Put the query on the direct strand, flipping the subject along with it
    pub fn normalize(&mut self) {
        if !self.query.is_on_direct_strand() {
            self.query.reverse();
            self.subject.reverse();
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.query.is_on_direct_strand()
    }

    /// Coarse view of the query footprint, tagged with the chain and subject
    pub fn to_region(&self) -> NamedRegion {
        NamedRegion {
            id: self.chain_id,
            name: self.subject.seqname.clone(),
            range: self.query.clone(),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:e}\t{}\t{}",
            self.chain_id,
            self.query.seqname,
            self.query.start,
            self.query.end,
            self.subject.seqname,
            self.subject.start,
            self.subject.end,
            self.e_value,
            self.score,
            self.identity
        )
    }
}

/// Query-length-weighted mean identity of a set of fragments
pub fn weighted_identity<'a, I>(fragments: I) -> f64
where
    I: IntoIterator<Item = &'a Fragment>,
{
    let (sum, total) = fragments
        .into_iter()
        .fold((0.0f64, 0u64), |(sum, total), f| {
            let len = f.query_length() as u64;
            (sum + f.identity * len as f64, total + len)
        });
    if total == 0 {
        0.0
    } else {
        sum / total as f64
    }
}

/// Sum of query lengths
pub fn total_query_length<'a, I>(fragments: I) -> u64
where
    I: IntoIterator<Item = &'a Fragment>,
{
    fragments.into_iter().map(|f| f.query_length() as u64).sum()
}

/// Post-merge view of one or more fragments' query footprint.
///
/// Per-fragment metrics are gone; `id` is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedRegion {
    pub id: ChainId,
    pub name: SequenceName,
    pub range: Range,
}

impl NamedRegion {
    pub fn new(id: ChainId, name: impl Into<SequenceName>, range: Range) -> Self {
        NamedRegion {
            id,
            name: name.into(),
            range,
        }
    }

    pub fn sequence_name(&self) -> &SequenceName {
        &self.range.seqname
    }

    pub fn start(&self) -> u32 {
        self.range.start
    }

    pub fn end(&self) -> u32 {
        self.range.end
    }
}
