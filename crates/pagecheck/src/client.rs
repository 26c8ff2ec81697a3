//! Test client seam.
//!
//! The request/response cycle belongs to the application under test. A
//! [`TestClient`] turns a [`Request`] into a [`Response`] synchronously; the
//! crate ships an in-memory [`MockClient`] and, behind the `http` feature, a
//! reqwest-backed client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::result::{PageError, PageResult};
use crate::upload::Uploads;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Upper-case method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(PageError::transport(format!("unsupported method {other}"))),
        }
    }
}

/// A request handed to the test client
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method
    pub method: Method,
    /// Absolute target URL
    pub url: Url,
    /// Form parameters (bracketed names, in form order)
    pub params: Vec<(String, String)>,
    /// Cookies to send
    pub cookies: Vec<(String, String)>,
    /// Normalized upload payload
    pub files: Uploads,
}

impl Request {
    /// Create a request with no parameters
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            params: Vec::new(),
            cookies: Vec::new(),
            files: Uploads::new(),
        }
    }

    /// Set form parameters
    #[must_use]
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Set cookies
    #[must_use]
    pub fn with_cookies(mut self, cookies: Vec<(String, String)>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Set upload payload
    #[must_use]
    pub fn with_files(mut self, files: Uploads) -> Self {
        self.files = files;
        self
    }

    /// First parameter value by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response produced by the test client
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Headers (names as sent)
    pub headers: Vec<(String, String)>,
    /// Body text
    pub body: String,
    /// Exception the application raised while handling the request
    pub exception: Option<String>,
}

impl Response {
    /// A response with the given status and body
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            exception: None,
        }
    }

    /// 200 response with an HTML body
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200, body).with_header("Content-Type", "text/html; charset=utf-8")
    }

    /// 302 redirect to `location`
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302, "").with_header("Location", location)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a captured exception
    #[must_use]
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// First header value, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Redirect target, when this response is a redirect
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        if matches!(self.status, 201 | 301 | 302 | 303 | 307 | 308) {
            self.header("Location")
        } else {
            None
        }
    }

    /// Whether following this response would issue another request
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        self.location().is_some()
    }

    /// Whether the status is 200
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> PageResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Dispatches requests against the application under test
pub trait TestClient {
    /// Run one request/response cycle. Redirects must not be followed.
    fn dispatch(&mut self, request: &Request) -> PageResult<Response>;
}

impl<T: TestClient + ?Sized> TestClient for Box<T> {
    fn dispatch(&mut self, request: &Request) -> PageResult<Response> {
        (**self).dispatch(request)
    }
}

type Handler = Box<dyn FnMut(&Request) -> Response>;

/// In-memory client routing on method and path.
///
/// Unrouted requests get a 404. Every dispatched request is recorded.
///
/// ```ignore
/// let client = MockClient::new()
///     .route(Method::Get, "/", Response::html("<h1>Home</h1>"))
///     .handler(Method::Post, "/login", |req| match req.param("email") {
///         Some(_) => Response::redirect("/dashboard"),
///         None => Response::new(422, "missing email"),
///     });
/// ```
#[derive(Default)]
pub struct MockClient {
    routes: HashMap<(Method, String), Handler>,
    history: Vec<Request>,
}

impl fmt::Debug for MockClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockClient")
            .field("routes", &self.routes.len())
            .field("history", &self.history.len())
            .finish()
    }
}

impl MockClient {
    /// Create a client with no routes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a fixed response
    #[must_use]
    pub fn route(self, method: Method, path: impl Into<String>, response: Response) -> Self {
        self.handler(method, path, move |_| response.clone())
    }

    /// Serve a computed response
    #[must_use]
    pub fn handler<F>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&Request) -> Response + 'static,
    {
        self.routes.insert((method, path.into()), Box::new(handler));
        self
    }

    /// Requests seen so far
    #[must_use]
    pub fn history(&self) -> &[Request] {
        &self.history
    }

    /// Most recent request
    #[must_use]
    pub fn last_request(&self) -> Option<&Request> {
        self.history.last()
    }
}

impl TestClient for MockClient {
    fn dispatch(&mut self, request: &Request) -> PageResult<Response> {
        self.history.push(request.clone());
        let key = (request.method, request.url.path().to_string());
        Ok(match self.routes.get_mut(&key) {
            Some(handler) => handler(request),
            None => Response::new(404, "Not Found"),
        })
    }
}
