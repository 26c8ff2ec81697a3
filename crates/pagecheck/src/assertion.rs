//! Assertions for page content.
//!
//! Each check is a [`PageConstraint`]: a named predicate evaluated against the
//! current (possibly narrowed) [`Page`]. Outcomes are [`AssertionResult`]s
//! handed to a [`Reporter`](soft::Reporter).

pub mod constraints;
pub mod soft;

use std::fmt::Debug;

use crate::page::Page;
use crate::result::PageResult;

/// Result of an assertion
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
}

impl AssertionResult {
    /// Create a passing assertion result
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    /// Create a failing assertion result
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    /// Prefix the failure message with caller context
    #[must_use]
    pub fn with_context(mut self, context: Option<&str>) -> Self {
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            if !self.passed {
                self.message = format!("{context}\n{}", self.message);
            }
        }
        self
    }
}

/// A predicate over the current page.
///
/// `description` completes the sentence "Failed asserting that the page
/// [{uri}] ...", e.g. `"contains the text [Welcome]"`.
pub trait PageConstraint: Debug {
    /// Whether the page satisfies the constraint
    fn matches(&self, page: &Page) -> PageResult<bool>;

    /// Description of the satisfied state
    fn description(&self) -> String;

    /// Description of the negated state
    fn negated_description(&self) -> String;

    /// Evaluate against a page
    fn evaluate(&self, page: &Page) -> PageResult<AssertionResult> {
        if self.matches(page)? {
            Ok(AssertionResult::pass())
        } else {
            Ok(AssertionResult::fail(format!(
                "Failed asserting that the page [{}] {}.",
                page.uri(),
                self.description()
            )))
        }
    }
}

/// Reverses another constraint
#[derive(Debug, Clone)]
pub struct Negated<C>(pub C);

impl<C: PageConstraint> PageConstraint for Negated<C> {
    fn matches(&self, page: &Page) -> PageResult<bool> {
        Ok(!self.0.matches(page)?)
    }

    fn description(&self) -> String {
        self.0.negated_description()
    }

    fn negated_description(&self) -> String {
        self.0.description()
    }
}

/// Wrap a constraint in [`Negated`]
pub trait PageConstraintExt: PageConstraint + Sized {
    /// The reversed constraint
    fn negate(self) -> Negated<Self> {
        Negated(self)
    }
}

impl<C: PageConstraint> PageConstraintExt for C {}
