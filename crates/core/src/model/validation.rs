use serde::{Deserialize, Serialize};

use crate::model::result::percent;

/// Outcome of checking one bank against one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_supported: bool,
    pub supported_count: usize,
    pub total_count: usize,
    pub percentage: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    /// Builds the result from counts; the bank is supported when at least one
    /// question passes.
    #[must_use]
    pub fn from_counts(supported_count: usize, total_count: usize) -> Self {
        let is_supported = supported_count > 0;
        let reason = if is_supported {
            None
        } else if total_count == 0 {
            Some("bank contains no questions".to_string())
        } else {
            Some("no question in the bank is supported by this mode".to_string())
        };
        Self {
            is_supported,
            supported_count,
            total_count,
            percentage: percent(supported_count, total_count),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_support_is_supported() {
        let v = ValidationResult::from_counts(2, 3);
        assert!(v.is_supported);
        assert_eq!(v.percentage, 67);
        assert!(v.reason.is_none());
    }

    #[test]
    fn zero_support_carries_reason() {
        let v = ValidationResult::from_counts(0, 4);
        assert!(!v.is_supported);
        assert_eq!(v.percentage, 0);
        assert!(v.reason.is_some());

        let empty = ValidationResult::from_counts(0, 0);
        assert_eq!(empty.reason.as_deref(), Some("bank contains no questions"));
    }
}
