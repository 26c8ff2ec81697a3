//! Real HTTP transport (`http` feature).
//!
//! Redirects are never followed by reqwest itself; the
//! [`Navigator`](crate::navigator::Navigator) does that so hops stay visible
//! and bounded.

use reqwest::blocking::multipart;
use reqwest::blocking::Client;
use reqwest::header::COOKIE;
use reqwest::redirect::Policy;

use crate::client::{Request, Response, TestClient};
use crate::result::{PageError, PageResult};
use crate::upload::{UploadValue, UploadedFile, Uploads};

/// [`TestClient`] talking to a running server
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client with automatic redirects disabled
    pub fn new() -> PageResult<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| PageError::transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl TestClient for HttpClient {
    fn dispatch(&mut self, request: &Request) -> PageResult<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| PageError::transport(e.to_string()))?;
        let mut builder = self.client.request(method, request.url.clone());

        if !request.cookies.is_empty() {
            builder = builder.header(COOKIE, cookie_header(&request.cookies));
        }

        let files = attached_files(&request.files);
        if !files.is_empty() {
            let mut form = multipart::Form::new();
            for (name, value) in &request.params {
                form = form.text(name.clone(), value.clone());
            }
            for (name, file) in files {
                let part = multipart::Part::file(&file.path)?
                    .file_name(file.original_name.clone())
                    .mime_str(&file.mime_type)
                    .map_err(|e| PageError::transport(e.to_string()))?;
                form = form.part(name, part);
            }
            builder = builder.multipart(form);
        } else if !request.params.is_empty() {
            builder = builder.form(&request.params);
        }

        let response = builder
            .send()
            .map_err(|e| PageError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .map_err(|e| PageError::transport(e.to_string()))?;

        Ok(Response {
            status,
            headers,
            body,
            exception: None,
        })
    }
}

/// `Cookie` header value for a list of pairs
#[must_use]
pub fn cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Attached files under their bracketed multipart names
#[must_use]
pub fn attached_files(uploads: &Uploads) -> Vec<(String, UploadedFile)> {
    uploads
        .iter()
        .flat_map(|(key, value)| UploadValue::flatten(key, value))
        .filter_map(|(name, leaf)| match leaf {
            UploadValue::File(file) => Some((name, file)),
            _ => None,
        })
        .collect()
}
