//! Error type shared by the store, the engines and the batch harness.

use crate::ids::{ChainId, SequenceName};
use crate::range::Range;
use std::io::Error as IoError;

#[derive(Debug)]
pub enum LongJoinError {
    /// Malformed path row: too few columns, non-numeric field, bad strand pairing.
    InputFormat { line: usize, message: String },
    /// Missing or out-of-range threshold.
    Configuration {
        parameter: &'static str,
        message: String,
    },
    /// Broken invariant detected while running; the run must not be committed.
    Consistency {
        chain_id: Option<ChainId>,
        query: Option<SequenceName>,
        range: Option<Range>,
        message: String,
    },
    /// Failure surfaced by a backing repository.
    Store(String),
    Io(IoError),
}

pub type Result<T> = std::result::Result<T, LongJoinError>;

impl LongJoinError {
    pub fn input_format(line: usize, message: impl Into<String>) -> Self {
        LongJoinError::InputFormat {
            line,
            message: message.into(),
        }
    }

    pub fn configuration(parameter: &'static str, message: impl Into<String>) -> Self {
        LongJoinError::Configuration {
            parameter,
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        LongJoinError::Consistency {
            chain_id: None,
            query: None,
            range: None,
            message: message.into(),
        }
    }

    pub fn with_chain(mut self, id: ChainId) -> Self {
        if let LongJoinError::Consistency { chain_id, .. } = &mut self {
            *chain_id = Some(id);
        }
        self
    }

    pub fn with_query(mut self, name: &SequenceName) -> Self {
        if let LongJoinError::Consistency { query, .. } = &mut self {
            *query = Some(name.clone());
        }
        self
    }

    pub fn with_range(mut self, r: &Range) -> Self {
        if let LongJoinError::Consistency { range, .. } = &mut self {
            *range = Some(r.clone());
        }
        self
    }
}

impl std::fmt::Display for LongJoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LongJoinError::InputFormat { line, message } => {
                write!(f, "Input format error at line {}: {}", line, message)
            }
            LongJoinError::Configuration { parameter, message } => {
                write!(f, "Invalid configuration for '{}': {}", parameter, message)
            }
            LongJoinError::Consistency {
                chain_id,
                query,
                range,
                message,
            } => {
                write!(f, "Consistency error: {}", message)?;
                if let Some(id) = chain_id {
                    write!(f, " [chain {}]", id)?;
                }
                if let Some(q) = query {
                    write!(f, " [query {}]", q)?;
                }
                if let Some(r) = range {
                    write!(f, " [range {}]", r)?;
                }
                Ok(())
            }
            LongJoinError::Store(msg) => write!(f, "Store error: {}", msg),
            LongJoinError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for LongJoinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LongJoinError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for LongJoinError {
    fn from(e: IoError) -> Self {
        LongJoinError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_message_carries_context() {
        let query = SequenceName::from("chr1");
        let err = LongJoinError::consistency("working store not empty")
            .with_chain(ChainId(7))
            .with_query(&query)
            .with_range(&Range::new("chr1", 100, 200));
        let msg = err.to_string();
        assert!(msg.contains("chain 7"));
        assert!(msg.contains("query chr1"));
        assert!(msg.contains("chr1:100..200"));
    }

    #[test]
    fn test_context_ignored_for_other_kinds() {
        let err = LongJoinError::input_format(3, "bad field").with_chain(ChainId(1));
        assert_eq!(err.to_string(), "Input format error at line 3: bad field");
    }
}
