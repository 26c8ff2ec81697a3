//! Result and error types for pagecheck.

use thiserror::Error;

/// Result type for pagecheck operations
pub type PageResult<T> = Result<T, PageError>;

/// Errors that can occur while driving or asserting on a page
#[derive(Debug, Error)]
pub enum PageError {
    /// A selector resolved to zero elements
    #[error("Nothing matched the filter [{filter}] CSS query provided for [{uri}]")]
    NoMatch {
        /// Raw filter as supplied by the caller
        filter: String,
        /// URI of the page that was searched
        uri: String,
    },

    /// Navigation settled on a non-success status
    #[error("A request to [{uri}] failed. Received status code [{status}].{}", cause_suffix(.cause))]
    PageLoad {
        /// URI that was requested
        uri: String,
        /// Final status code observed
        status: u16,
        /// Exception captured by the response, if any
        cause: Option<String>,
    },

    /// No form (or no form owning the requested button) on the page
    #[error("{}", form_not_found_message(.button))]
    FormNotFound {
        /// Submit button label that was looked up
        button: Option<String>,
    },

    /// No link with the given text, name or id
    #[error("Could not find a link with a body, name, or ID attribute of [{name}]")]
    LinkNotFound {
        /// Link text, name or id
        name: String,
    },

    /// Redirect chain exceeded the configured limit
    #[error("Request to [{uri}] exceeded {limit} redirects")]
    TooManyRedirects {
        /// URI of the original request
        uri: String,
        /// Configured redirect limit
        limit: usize,
    },

    /// Stored input names a field the form does not have
    #[error("Unreachable field \"{name}\"")]
    UnreachableField {
        /// Field name or id
        name: String,
    },

    /// Value not accepted by a choice field
    #[error("Input \"{name}\" cannot take \"{value}\" as a value (possible values: {})", join_values(.possible))]
    InvalidFieldValue {
        /// Field name
        name: String,
        /// Rejected value
        value: String,
        /// Values the field accepts
        possible: Vec<String>,
    },

    /// CSS selector failed to parse
    #[error("Invalid selector [{selector}]: {message}")]
    InvalidSelector {
        /// Selector text
        selector: String,
        /// Parser message
        message: String,
    },

    /// URI could not be parsed or joined
    #[error("Invalid URL [{url}]: {message}")]
    InvalidUrl {
        /// URL text
        url: String,
        /// Parser message
        message: String,
    },

    /// An operation needed a loaded page but none was visited yet
    #[error("No page has been loaded; call visit() first")]
    NoPage,

    /// Assertion failed (fail-fast reporting)
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Soft assertions collected failures
    #[error("{count} assertion(s) failed:\n{summary}")]
    AssertionsFailed {
        /// Number of failures
        count: usize,
        /// One line per failure
        summary: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Test client failed to produce a response
    #[error("Transport error: {message}")]
    Transport {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Text pattern could not be compiled
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

fn cause_suffix(cause: &Option<String>) -> String {
    cause
        .as_ref()
        .map(|c| format!(" Cause: {c}"))
        .unwrap_or_default()
}

fn form_not_found_message(button: &Option<String>) -> String {
    match button {
        Some(label) => format!("Could not find a form that has submit button [{label}]"),
        None => "There is no form on the page".to_string(),
    }
}

fn join_values(values: &[String]) -> String {
    values.join(", ")
}

impl PageError {
    /// Create a no-match error for a filter on a page
    #[must_use]
    pub fn no_match(filter: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::NoMatch {
            filter: filter.into(),
            uri: uri.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error came from the assertion channel
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::AssertionFailed { .. } | Self::AssertionsFailed { .. }
        )
    }
}
