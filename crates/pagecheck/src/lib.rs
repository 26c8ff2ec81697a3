//! Pagecheck: page-interaction helpers for web-application tests
//!
//! Drives an application through a [`TestClient`]: visit pages, fill and
//! submit forms (file uploads included), follow redirects, then assert on
//! what the final page shows, optionally narrowed to a DOM sub-tree.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         PageSession                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │  InputStore ──► Form ──► Upload normalizer ──► Navigator      │
//! │      ▲           ▲                                 │          │
//! │      │      Selector resolver                      ▼          │
//! │  type/check/select/attach             TestClient ──► Page     │
//! │                                                     │         │
//! │                       Assertions (within scope) ◄───┘         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```ignore
//! use pagecheck::{MockClient, Method, PageSession, Response, SessionConfig};
//!
//! let client = MockClient::new().route(Method::Get, "/", Response::html("<h1>Hi</h1>"));
//! let mut session = PageSession::new(client, SessionConfig::default())?;
//! session.visit("/")?.see_text("Hi")?;
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Page constraints and assertion reporting
pub mod assertion;

mod client;
mod config;
mod form;
#[cfg(feature = "http")]
mod http;
mod input;
pub mod logging;
mod navigator;
mod page;
mod result;
mod selector;
mod session;
mod upload;

pub use assertion::constraints::{
    HasElement, HasInElement, HasLink, HasSource, HasText, HasValue, IsChecked, IsSelected,
};
pub use assertion::soft::{
    AssertionFailure, AssertionMode, AssertionSummary, Reporter, SoftAssertions,
};
pub use assertion::{AssertionResult, Negated, PageConstraint, PageConstraintExt};
pub use client::{Method, MockClient, Request, Response, TestClient};
pub use config::{SessionConfig, DEFAULT_BASE_URL, DEFAULT_MAX_REDIRECTS};
pub use form::{FieldKind, Form, FormField, SelectOption};
#[cfg(feature = "http")]
pub use http::HttpClient;
pub use input::{normalize_name, InputSnapshot, InputStore, InputValue, UploadMap};
pub use navigator::{parse_set_cookie, Navigator};
pub use page::{Page, ScopeStack};
pub use result::{PageError, PageResult};
pub use selector::{resolve, CompoundSelector, ANY_TAG};
pub use session::{PageSession, ScopeGuard};
pub use upload::{
    bracket_segments, normalize, FileDescriptor, UploadStatus, UploadValue, UploadedFile, Uploads,
};
