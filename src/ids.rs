/// Typed identifiers carried as struct fields instead of being encoded in names
use std::fmt;
use std::sync::Arc;

/// Identifier shared by every fragment of one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> ChainId {
        ChainId(self.0 + 1)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// Sequence (chromosome, contig, TE consensus) name; cheap to clone
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceName(Arc<str>);

impl SequenceName {
    pub fn new(name: &str) -> Self {
        SequenceName(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SequenceName {
    fn default() -> Self {
        SequenceName::new("")
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceName {
    fn from(name: &str) -> Self {
        SequenceName::new(name)
    }
}

impl From<String> for SequenceName {
    fn from(name: String) -> Self {
        SequenceName(Arc::from(name))
    }
}

impl AsRef<str> for SequenceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
