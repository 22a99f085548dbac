//! Provider identification and share-link resolution.
//!
//! # Architecture
//!
//! - [`Resolver`] - Async trait every provider implementation satisfies
//! - [`BuiltinProvider`] - Closed catalog of reserved provider tags and URL patterns
//! - [`ResolverConfig`] - Registration record for a custom provider, backed by a
//!   [`CompiledResolver`] factory or a sandboxed script
//! - [`ParserRegistry`] - Concurrent registry of custom providers
//! - [`HttpFetch`] - The only network capability resolvers receive
//! - [`LinkCache`] - Optional store for resolved links
//!
//! # Example
//!
//! ```no_run
//! use sharelink_core::resolver::ParserRegistry;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ParserRegistry::new();
//! registry.register_script(r#"
//! // ==UserScript==
//! // @type        demo
//! // @displayName Demo Drive
//! // @match       https://demo\.example/s/(?P<KEY>\w+)
//! // ==/UserScript==
//! fn parse(share, http, logger) {
//!     "https://cdn.demo.example/" + share.share_key
//! }
//! "#)?;
//! assert!(registry.contains("demo"));
//! # Ok(())
//! # }
//! ```

mod builtin;
mod cache;
mod config;
mod error;
mod http_client;
mod registry;
mod utils;

pub use builtin::BuiltinProvider;
pub use cache::{CachedLink, LinkCache, MemoryLinkCache};
pub use config::{CompiledResolver, ResolverConfig, ResolverSource};
pub use error::{RegistryError, ResolveError};
pub use http_client::{HttpError, HttpFetch, HttpRequest, HttpResponse, HttpSettings, ReqwestFetch};
pub use registry::{ParserRegistry, ScriptLoadReport};
pub use utils::{KEY_GROUP, PWD_GROUP};
pub(crate) use utils::compile_static_regex;

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::model::{FileInfo, ShareLinkInfo};

/// Share key and optional password extracted from a share URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareMatch {
    pub share_key: String,
    pub password: Option<String>,
}

/// A successfully resolved direct download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// The direct, usually time-limited, download URL.
    pub url: String,
    /// When the provider says the URL stops working, if known.
    pub expires_at: Option<SystemTime>,
    /// True when the URL came from the link cache instead of a resolver run.
    pub from_cache: bool,
}

impl ResolvedUrl {
    /// Creates a freshly resolved URL with unknown expiry.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
            from_cache: false,
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Capabilities handed to a resolver for one request.
#[derive(Clone)]
pub struct ResolveContext {
    /// HTTP access; resolvers must not open their own clients.
    pub http: Arc<dyn HttpFetch>,
}

impl ResolveContext {
    #[must_use]
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }
}

impl fmt::Debug for ResolveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext").finish_non_exhaustive()
    }
}

/// A provider implementation that turns a share link into a direct URL.
///
/// Implementations receive the request's [`ShareLinkInfo`] mutably so they can
/// record extra metadata (`downloadHeaders`, `fileInfo`, ...) in its parameter
/// bag; they must only add entries.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Resolves the share link to a direct download URL.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the provider rejects the link or cannot be reached.
    async fn resolve(
        &self,
        info: &mut ShareLinkInfo,
        ctx: &ResolveContext,
    ) -> Result<ResolvedUrl, ResolveError>;

    /// Lists the files behind a folder share.
    ///
    /// # Errors
    ///
    /// The default implementation returns [`ResolveError::Unsupported`].
    async fn resolve_file_list(
        &self,
        info: &mut ShareLinkInfo,
        _ctx: &ResolveContext,
    ) -> Result<Vec<FileInfo>, ResolveError> {
        Err(ResolveError::unsupported(info.parser_type(), "file listing"))
    }

    /// Resolves one file of a folder share, identified by the `paramJson`
    /// parameter.
    ///
    /// # Errors
    ///
    /// The default implementation returns [`ResolveError::Unsupported`].
    async fn resolve_by_id(
        &self,
        info: &mut ShareLinkInfo,
        _ctx: &ResolveContext,
    ) -> Result<ResolvedUrl, ResolveError> {
        Err(ResolveError::unsupported(info.parser_type(), "resolving by file id"))
    }
}
