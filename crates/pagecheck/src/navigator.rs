//! Request dispatch and redirect following.

use tracing::{debug, info};
use url::Url;

use crate::client::{Method, Request, Response, TestClient};
use crate::config::SessionConfig;
use crate::page::Page;
use crate::result::{PageError, PageResult};
use crate::upload::Uploads;

/// Issues requests through a [`TestClient`] and settles them into pages
#[derive(Debug)]
pub struct Navigator<C> {
    client: C,
    config: SessionConfig,
    base: Url,
    cookies: Vec<(String, String)>,
    pages: u64,
}

impl<C: TestClient> Navigator<C> {
    /// Create a navigator; fails when the configured base URL is invalid
    pub fn new(client: C, config: SessionConfig) -> PageResult<Self> {
        let base = config.base_url()?;
        Ok(Self {
            client,
            config,
            base,
            cookies: Vec::new(),
            pages: 0,
        })
    }

    /// Underlying client
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Underlying client, mutably
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cookies currently held in the jar
    #[must_use]
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Absolute URIs pass through; relative ones are appended to the base
    /// URL, keeping any path the base carries
    pub fn prepare_url(&self, uri: &str) -> PageResult<Url> {
        if let Ok(url) = Url::parse(uri) {
            return Ok(url);
        }
        let joined = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            uri.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| PageError::InvalidUrl {
            url: uri.to_string(),
            message: e.to_string(),
        })
    }

    /// Send one request without following redirects or checking status
    pub fn call(
        &mut self,
        method: Method,
        uri: &str,
        params: Vec<(String, String)>,
    ) -> PageResult<Response> {
        let url = self.prepare_url(uri)?;
        self.dispatch(Request::new(method, url).with_params(params), &[])
    }

    /// Request `uri`, follow redirects and settle on a page.
    ///
    /// `cookies` are sent alongside the jar's cookies on the first request.
    pub fn navigate(
        &mut self,
        method: Method,
        uri: &str,
        params: Vec<(String, String)>,
        cookies: &[(String, String)],
        files: Uploads,
    ) -> PageResult<Page> {
        let url = self.prepare_url(uri)?;
        let request = Request::new(method, url.clone())
            .with_params(params)
            .with_files(files);
        let response = self.dispatch(request, cookies)?;
        self.settle(url, response)
    }

    /// Follow any redirect chain starting at `response` and build the page.
    ///
    /// Fails with [`PageError::TooManyRedirects`] past `max_redirects` hops
    /// and with [`PageError::PageLoad`] unless the final status is 200.
    pub fn settle(&mut self, origin: Url, mut response: Response) -> PageResult<Page> {
        let limit = self.config.max_redirects;
        let mut current = origin.clone();
        let mut hops = 0;

        while let Some(location) = response.location().map(str::to_string) {
            if hops >= limit {
                return Err(PageError::TooManyRedirects {
                    uri: origin.to_string(),
                    limit,
                });
            }
            let target = current.join(&location).map_err(|e| PageError::InvalidUrl {
                url: location.clone(),
                message: e.to_string(),
            })?;
            hops += 1;
            debug!(hop = hops, from = %current, to = %target, "following redirect");
            response = self.dispatch(Request::new(Method::Get, target.clone()), &[])?;
            current = target;
        }

        if !response.is_ok() {
            return Err(PageError::PageLoad {
                uri: current.to_string(),
                status: response.status,
                cause: response.exception,
            });
        }

        self.pages += 1;
        info!(uri = %current, redirects = hops, "page loaded");
        Ok(Page::from_response(self.pages, current, response))
    }

    fn dispatch(&mut self, request: Request, extra: &[(String, String)]) -> PageResult<Response> {
        let mut cookies = if self.config.send_cookies {
            self.cookies.clone()
        } else {
            Vec::new()
        };
        for (name, value) in extra {
            store_cookie(&mut cookies, name, value);
        }
        let request = request.with_cookies(cookies);

        debug!(
            method = %request.method,
            url = %request.url,
            params = request.params.len(),
            files = request.files.len(),
            "dispatching request"
        );
        let response = self.client.dispatch(&request)?;

        if self.config.send_cookies {
            for header in response.header_values("Set-Cookie") {
                if let Some((name, value)) = parse_set_cookie(header) {
                    store_cookie(&mut self.cookies, &name, &value);
                }
            }
        }
        Ok(response)
    }
}

/// Name and value of a `Set-Cookie` header, attributes dropped
#[must_use]
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

fn store_cookie(jar: &mut Vec<(String, String)>, name: &str, value: &str) {
    match jar.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => jar.push((name.to_string(), value.to_string())),
    }
}
