/// Thresholds shared by the join and split engines
use crate::error::{LongJoinError, Result};
use std::fmt;
use std::str::FromStr;

/// Order in which the split engine visits the chains of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOrder {
    AscendingIdentity, // oldest, most diverged copies first (default)
    DescendingLength,  // longest chains first
}

impl FromStr for SplitOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" | "ascending-identity" => Ok(SplitOrder::AscendingIdentity),
            "length" | "descending-length" => Ok(SplitOrder::DescendingLength),
            _ => Err(format!(
                "Unknown split order '{s}'. Use 'identity' or 'length'"
            )),
        }
    }
}

impl fmt::Display for SplitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitOrder::AscendingIdentity => write!(f, "identity"),
            SplitOrder::DescendingLength => write!(f, "length"),
        }
    }
}

/// Join/split configuration
#[derive(Debug, Clone, PartialEq)]
pub struct JoinConfig {
    pub max_overlap: u32,                // fragments may overlap by this much on either axis
    pub max_gap_length_for_query: u32,   // longest plausible query gap
    pub max_gap_length_for_subject: u32, // longest plausible subject gap
    pub max_mismatch_length: u32,
    pub identity_tolerance: f64, // percentage points
    pub min_nested_te_coverage: f64, // fraction of the gap nested material must cover
    pub max_gap_length: u32,     // indel size joined without nested evidence
    pub min_length_to_split: u32,
    pub min_length_to_keep_chain: u32,
    pub split_order: SplitOrder,
}

impl Default for JoinConfig {
    fn default() -> Self {
        JoinConfig {
            max_overlap: 15,
            max_gap_length_for_query: 100_000,
            max_gap_length_for_subject: 30_000,
            max_mismatch_length: 500,
            identity_tolerance: 2.0,
            min_nested_te_coverage: 0.95,
            max_gap_length: 5000,
            min_length_to_split: 100,
            min_length_to_keep_chain: 20,
            split_order: SplitOrder::AscendingIdentity,
        }
    }
}

impl JoinConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.identity_tolerance.is_finite()
            || !(0.0..=100.0).contains(&self.identity_tolerance)
        {
            return Err(LongJoinError::configuration(
                "identityTolerance",
                format!("{} is not within [0, 100]", self.identity_tolerance),
            ));
        }
        if !self.min_nested_te_coverage.is_finite()
            || !(0.0..=1.0).contains(&self.min_nested_te_coverage)
        {
            return Err(LongJoinError::configuration(
                "minNestedTEcoverage",
                format!("{} is not within [0, 1]", self.min_nested_te_coverage),
            ));
        }
        if self.min_length_to_split == 0 {
            return Err(LongJoinError::configuration(
                "minLengthToSplit",
                "must be at least 1",
            ));
        }
        if self.max_gap_length > self.max_gap_length_for_query {
            return Err(LongJoinError::configuration(
                "maxGapLength",
                format!(
                    "{} exceeds maxGapLengthForQuery ({})",
                    self.max_gap_length, self.max_gap_length_for_query
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = JoinConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_overlap, 15);
        assert_eq!(config.max_gap_length, 5000);
    }

    #[test]
    fn test_out_of_range_thresholds() {
        let config = JoinConfig {
            min_nested_te_coverage: 1.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("minNestedTEcoverage"), "{err}");

        let config = JoinConfig {
            identity_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = JoinConfig {
            min_length_to_split: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = JoinConfig {
            max_gap_length: 200_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_order_parse() {
        assert_eq!("identity".parse::<SplitOrder>(), Ok(SplitOrder::AscendingIdentity));
        assert_eq!("LENGTH".parse::<SplitOrder>(), Ok(SplitOrder::DescendingLength));
        assert!("random".parse::<SplitOrder>().is_err());
    }
}
