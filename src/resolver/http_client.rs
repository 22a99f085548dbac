//! HTTP capability handed to resolvers and scripts.
//!
//! Resolvers never build their own clients: they receive an [`HttpFetch`] through
//! [`ResolveContext`](super::ResolveContext). [`ReqwestFetch`] is the production
//! implementation and centralizes timeout, user-agent, compression and proxy
//! policy. Tests substitute their own `HttpFetch`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Method, Proxy};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::user_agent;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Transport-level failures of an [`HttpFetch`] call.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The request did not complete in time
    #[error("request to '{url}' timed out")]
    Timeout {
        /// Target URL
        url: String,
    },

    /// Connection, TLS or body read failure
    #[error("request to '{url}' failed: {reason}")]
    Transport {
        /// Target URL
        url: String,
        /// Underlying error text
        reason: String,
    },

    /// The request could not be built (bad method, header or URL)
    #[error("invalid request to '{url}': {reason}")]
    InvalidRequest {
        /// Target URL
        url: String,
        /// What was invalid
        reason: String,
    },
}

impl HttpError {
    fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_builder() {
            Self::InvalidRequest {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Upper-case method name.
    pub method: String,
    pub url: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub follow_redirects: bool,
    /// Per-request cap on top of the client timeouts.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.trim().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
            timeout: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new("POST", url).body(body)
    }

    /// Appends a header, replacing an earlier one with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Caps the request duration; an existing tighter cap is kept.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(self.timeout.map_or(timeout, |current| current.min(timeout)));
        self
    }
}

/// A received response with the body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive lookup of the first header with `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// The HTTP capability resolvers and scripts are allowed to use.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Executes one request.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on timeout, transport failure or an unbuildable request.
    /// Non-2xx statuses are not errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Client policy for [`ReqwestFetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: user_agent::DEFAULT_BROWSER_USER_AGENT.to_string(),
        }
    }
}

/// [`HttpFetch`] backed by two `reqwest` clients, one following redirects and one not.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: Client,
    no_redirect_client: Client,
}

impl ReqwestFetch {
    /// Builds both clients with the shared policy.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidRequest`] when client construction fails.
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(settings, true)?,
            no_redirect_client: build_client(settings, false)?,
        })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|error| HttpError::InvalidRequest {
                url: request.url.clone(),
                reason: format!("invalid method: {error}"),
            })?;
        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        };

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| HttpError::from_reqwest(&request.url, &error))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|error| HttpError::from_reqwest(&request.url, &error))?;
        debug!(status, bytes = body.len(), "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn build_client(settings: &HttpSettings, follow_redirects: bool) -> Result<Client, HttpError> {
    let failure = |reason: String| HttpError::InvalidRequest {
        url: String::new(),
        reason,
    };

    match try_build_client(settings, follow_redirects, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic while reading system proxy
            // settings; env proxies still apply on the fallback path.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(settings, follow_redirects, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(failure(
                    "HTTP client construction panicked while reading proxy settings".to_string(),
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(failure(format!("HTTP client construction failed: {error}")))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => {
            Err(failure(format!("HTTP client construction failed: {error}")))
        }
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    settings: &HttpSettings,
    follow_redirects: bool,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(settings, follow_redirects);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &HttpSettings, follow_redirects: bool) -> ClientBuilder {
    let redirects = if follow_redirects {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    };
    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.read_timeout)
        .user_agent(settings.user_agent.clone())
        .redirect(redirects)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
