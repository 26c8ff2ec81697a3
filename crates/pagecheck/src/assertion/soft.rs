//! Assertion reporting.
//!
//! A [`Reporter`] receives every evaluated [`AssertionResult`]. The default
//! [`SoftAssertions`] either stops at the first failure or collects failures
//! until [`Reporter::finish`].

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Instant;
use tracing::warn;

use super::AssertionResult;
use crate::result::{PageError, PageResult};

/// A single assertion failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionFailure {
    /// Message describing the failure
    pub message: String,
    /// Timestamp when the failure occurred
    #[serde(skip)]
    pub timestamp: Option<Instant>,
    /// Index of the assertion in the sequence
    pub index: usize,
}

impl AssertionFailure {
    /// Create a new assertion failure
    #[must_use]
    pub fn new(message: impl Into<String>, index: usize) -> Self {
        Self {
            message: message.into(),
            timestamp: Some(Instant::now()),
            index,
        }
    }
}

/// Mode for assertion reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionMode {
    /// Collect all failures until verified
    Collect,
    /// Stop on the first failure (default)
    #[default]
    FailFast,
}

/// Receives assertion outcomes from a session
pub trait Reporter: Debug {
    /// Record one outcome; fail-fast reporters return the failure here
    fn report(&mut self, result: &AssertionResult) -> PageResult<()>;

    /// Surface anything held back
    fn finish(&mut self) -> PageResult<()>;
}

/// Summary of assertion results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionSummary {
    /// Total assertions checked
    pub total: usize,
    /// Assertions that passed
    pub passed: usize,
    /// Assertions that failed
    pub failed: usize,
}

/// Default reporter.
///
/// ```ignore
/// let mut soft = SoftAssertions::with_mode(AssertionMode::Collect);
/// soft.report(&AssertionResult::fail("missing heading"))?;
/// soft.report(&AssertionResult::fail("missing footer"))?;
/// assert!(soft.verify().is_err());
/// ```
#[derive(Debug, Default)]
pub struct SoftAssertions {
    failures: Vec<AssertionFailure>,
    mode: AssertionMode,
    assertion_count: usize,
}

impl SoftAssertions {
    /// Create a fail-fast reporter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a specific mode
    #[must_use]
    pub fn with_mode(mode: AssertionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> AssertionMode {
        self.mode
    }

    /// Collected failures
    #[must_use]
    pub fn failures(&self) -> &[AssertionFailure] {
        &self.failures
    }

    /// Number of collected failures
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of assertions reported
    #[must_use]
    pub const fn assertion_count(&self) -> usize {
        self.assertion_count
    }

    /// Whether every reported assertion passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Counts of reported assertions
    #[must_use]
    pub fn summary(&self) -> AssertionSummary {
        AssertionSummary {
            total: self.assertion_count,
            passed: self.assertion_count - self.failures.len(),
            failed: self.failures.len(),
        }
    }

    /// Error listing every collected failure, if any
    ///
    /// # Errors
    ///
    /// Returns [`PageError::AssertionsFailed`] when failures were collected
    pub fn verify(&self) -> PageResult<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let summary = self
            .failures
            .iter()
            .enumerate()
            .map(|(i, f)| format!("  {}. {}", i + 1, f.message))
            .collect::<Vec<_>>()
            .join("\n");
        Err(PageError::AssertionsFailed {
            count: self.failures.len(),
            summary,
        })
    }

    /// Forget collected failures
    pub fn clear(&mut self) {
        self.failures.clear();
        self.assertion_count = 0;
    }
}

impl Reporter for SoftAssertions {
    fn report(&mut self, result: &AssertionResult) -> PageResult<()> {
        self.assertion_count += 1;
        if result.passed {
            return Ok(());
        }
        match self.mode {
            AssertionMode::FailFast => Err(PageError::AssertionFailed {
                message: result.message.clone(),
            }),
            AssertionMode::Collect => {
                warn!(index = self.failures.len(), "{}", result.message);
                self.failures
                    .push(AssertionFailure::new(&result.message, self.failures.len()));
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> PageResult<()> {
        let outcome = self.verify();
        self.clear();
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod fail_fast {
        use super::*;

        #[test]
        fn test_default_mode_is_fail_fast() {
            assert_eq!(SoftAssertions::new().mode(), AssertionMode::FailFast);
        }

        #[test]
        fn test_failure_is_returned_immediately() {
            let mut soft = SoftAssertions::new();
            let err = soft.report(&AssertionResult::fail("no heading")).unwrap_err();
            assert!(matches!(err, PageError::AssertionFailed { ref message } if message == "no heading"));
            assert!(soft.all_passed());
        }

        #[test]
        fn test_pass_is_counted() {
            let mut soft = SoftAssertions::new();
            soft.report(&AssertionResult::pass()).unwrap();
            assert_eq!(soft.assertion_count(), 1);
        }
    }

    mod collect {
        use super::*;

        #[test]
        fn test_failures_are_collected() {
            let mut soft = SoftAssertions::with_mode(AssertionMode::Collect);
            soft.report(&AssertionResult::fail("first")).unwrap();
            soft.report(&AssertionResult::pass()).unwrap();
            soft.report(&AssertionResult::fail("second")).unwrap();

            assert_eq!(soft.failure_count(), 2);
            assert_eq!(soft.failures()[1].index, 1);
            assert_eq!(
                soft.summary(),
                AssertionSummary {
                    total: 3,
                    passed: 1,
                    failed: 2
                }
            );
        }

        #[test]
        fn test_verify_lists_failures() {
            let mut soft = SoftAssertions::with_mode(AssertionMode::Collect);
            soft.report(&AssertionResult::fail("first")).unwrap();
            soft.report(&AssertionResult::fail("second")).unwrap();

            let err = soft.verify().unwrap_err();
            let msg = err.to_string();
            assert!(msg.starts_with("2 assertion(s) failed"));
            assert!(msg.contains("1. first"));
            assert!(msg.contains("2. second"));
        }

        #[test]
        fn test_finish_resets() {
            let mut soft = SoftAssertions::with_mode(AssertionMode::Collect);
            soft.report(&AssertionResult::fail("first")).unwrap();
            assert!(soft.finish().is_err());
            assert!(soft.finish().is_ok());
            assert_eq!(soft.assertion_count(), 0);
        }
    }

    #[test]
    fn test_mode_deserializes_snake_case() {
        let mode: AssertionMode = serde_json::from_str("\"collect\"").unwrap();
        assert_eq!(mode, AssertionMode::Collect);
    }
}
