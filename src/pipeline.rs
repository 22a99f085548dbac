//! End-to-end orchestration: identify a share link, resolve it, render client links.
//!
//! Lookup order is the built-in catalog first, then the custom
//! [`ParserRegistry`]. A resolved URL is recorded under `downloadUrl` in the
//! link's parameter bag so [`DownloadLinkMeta`](crate::clientlink::DownloadLinkMeta)
//! picks it up.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::clientlink::{ClientLinkType, GeneratedLinks, GenerationError, GeneratorRegistry};
use crate::model::{FileInfo, ShareLinkInfo, keys};
use crate::resolver::{
    BuiltinProvider, CachedLink, CompiledResolver, HttpFetch, LinkCache, ParserRegistry,
    ResolveContext, ResolveError, ResolvedUrl, Resolver, ResolverSource, ShareMatch,
};
use crate::sandbox::{SandboxLimits, ScriptedResolver};

/// How long a resolved link is cached when the resolver reports no expiry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// A share link taken all the way to client links.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The share link, with everything resolution recorded in its parameters.
    pub share: ShareLinkInfo,
    pub resolved: ResolvedUrl,
    pub links: GeneratedLinks,
}

/// Ties the registries, the HTTP capability and the optional cache together.
pub struct LinkPipeline {
    parsers: Arc<ParserRegistry>,
    generators: Arc<GeneratorRegistry>,
    builtin: DashMap<BuiltinProvider, CompiledResolver>,
    http: Arc<dyn HttpFetch>,
    cache: Option<Arc<dyn LinkCache>>,
    cache_ttl: Duration,
    sandbox_limits: SandboxLimits,
}

impl LinkPipeline {
    #[must_use]
    pub fn new(
        parsers: Arc<ParserRegistry>,
        generators: Arc<GeneratorRegistry>,
        http: Arc<dyn HttpFetch>,
    ) -> Self {
        Self {
            parsers,
            generators,
            builtin: DashMap::new(),
            http,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            sandbox_limits: SandboxLimits::default(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn LinkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_sandbox_limits(mut self, limits: SandboxLimits) -> Self {
        self.sandbox_limits = limits;
        self
    }

    #[must_use]
    pub fn parsers(&self) -> &Arc<ParserRegistry> {
        &self.parsers
    }

    #[must_use]
    pub fn generators(&self) -> &Arc<GeneratorRegistry> {
        &self.generators
    }

    /// Installs the compiled resolver for a built-in provider, returning the
    /// one it replaced.
    pub fn install_builtin(
        &self,
        provider: BuiltinProvider,
        resolver: CompiledResolver,
    ) -> Option<CompiledResolver> {
        debug!(provider = %provider, resolver = resolver.name(), "Installing built-in resolver");
        self.builtin.insert(provider, resolver)
    }

    #[must_use]
    pub fn has_builtin(&self, provider: BuiltinProvider) -> bool {
        self.builtin.contains_key(&provider)
    }

    /// Identifies the provider of `url` and builds its canonical share link.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoResolver`] when no provider pattern matches.
    pub fn share_link_from_url(&self, url: &str) -> Result<ShareLinkInfo, ResolveError> {
        if let Some((provider, share)) = BuiltinProvider::detect(url) {
            debug!(parser_type = provider.tag(), "Matched built-in provider");
            return Ok(provider.share_link_info(url, &share));
        }
        if let Some((config, share)) = self.parsers.from_share_url(url) {
            debug!(parser_type = config.parser_type(), "Matched registered provider");
            return Ok(config.share_link_info(url, &share));
        }
        Err(ResolveError::no_resolver(url))
    }

    /// Builds the share link for a known provider type and share key.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownType`] when `parser_type` is neither a
    /// built-in tag nor registered.
    pub fn share_link_from_type(
        &self,
        parser_type: &str,
        share_key: &str,
        password: Option<&str>,
    ) -> Result<ShareLinkInfo, ResolveError> {
        let share = ShareMatch {
            share_key: share_key.trim().to_string(),
            password: password
                .map(str::trim)
                .filter(|pwd| !pwd.is_empty())
                .map(str::to_string),
        };
        if share.share_key.is_empty() {
            return Err(ResolveError::resolution_failed(parser_type, "share key is empty"));
        }
        if let Some(provider) = BuiltinProvider::from_tag(parser_type) {
            return Ok(provider.share_link_from_key(&share));
        }
        self.parsers
            .get(parser_type)
            .map(|config| config.share_link_from_key(&share))
            .ok_or_else(|| {
                ResolveError::unknown_type(parser_type, "no provider is registered under this type")
            })
    }

    fn resolver_for(&self, info: &ShareLinkInfo) -> Result<Box<dyn Resolver>, ResolveError> {
        let parser_type = info.parser_type();
        if let Some(provider) = BuiltinProvider::from_tag(parser_type) {
            let installed = self.builtin.get(&provider).map(|entry| entry.value().clone());
            return match installed {
                Some(resolver) => resolver.instantiate(info),
                None => Err(ResolveError::unknown_type(
                    parser_type,
                    "built-in provider has no resolver installed",
                )),
            };
        }
        let config = self.parsers.get(parser_type).ok_or_else(|| {
            ResolveError::unknown_type(parser_type, "no provider is registered under this type")
        })?;
        match config.source() {
            ResolverSource::Compiled(resolver) => resolver.instantiate(info),
            ResolverSource::Scripted(program) => Ok(Box::new(ScriptedResolver::new(
                config.parser_type(),
                program.clone(),
                self.sandbox_limits,
            ))),
        }
    }

    fn context(&self) -> ResolveContext {
        ResolveContext::new(Arc::clone(&self.http))
    }

    /// Resolves a share link to its direct URL.
    ///
    /// A fresh cache entry short-circuits the resolver. On success the URL is
    /// recorded under `downloadUrl` and cached.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when no resolver exists for the type or the
    /// resolver fails.
    #[instrument(skip(self, info), fields(parser_type = %info.parser_type(), share_key = %info.share_key()))]
    pub async fn resolve(&self, info: &mut ShareLinkInfo) -> Result<ResolvedUrl, ResolveError> {
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get(info.parser_type(), info.share_key()).await
            && !cached.is_expired_at(SystemTime::now())
        {
            debug!("Serving resolved link from cache");
            info.insert_param(keys::DOWNLOAD_URL, cached.url.clone());
            return Ok(ResolvedUrl {
                url: cached.url,
                expires_at: Some(cached.expires_at),
                from_cache: true,
            });
        }

        let resolver = self.resolver_for(info)?;
        let resolved = resolver.resolve(info, &self.context()).await?;
        info.insert_param(keys::DOWNLOAD_URL, resolved.url.clone());

        if let Some(cache) = &self.cache {
            let expires_at = resolved
                .expires_at
                .unwrap_or_else(|| SystemTime::now() + self.cache_ttl);
            cache
                .put(
                    info.parser_type(),
                    info.share_key(),
                    CachedLink::new(resolved.url.clone(), expires_at),
                )
                .await;
        }
        info!(resolver = resolver.name(), "Resolved share link");
        Ok(resolved)
    }

    /// Lists the files behind a folder share.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsupported`] when the provider cannot list files.
    #[instrument(skip(self, info), fields(parser_type = %info.parser_type(), share_key = %info.share_key()))]
    pub async fn resolve_file_list(
        &self,
        info: &mut ShareLinkInfo,
    ) -> Result<Vec<FileInfo>, ResolveError> {
        let resolver = self.resolver_for(info)?;
        let files = resolver.resolve_file_list(info, &self.context()).await?;
        info!(files = files.len(), "Listed shared files");
        Ok(files)
    }

    /// Resolves one file of a folder share from the identifying object the
    /// provider expects under `paramJson`.
    ///
    /// The URL is recorded under `downloadUrl` but never cached, since the
    /// cache is keyed by share and not by file.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsupported`] when the provider cannot resolve
    /// single files, or the resolver's failure.
    #[instrument(skip(self, info, param_json), fields(parser_type = %info.parser_type(), share_key = %info.share_key()))]
    pub async fn resolve_by_id(
        &self,
        info: &mut ShareLinkInfo,
        param_json: Value,
    ) -> Result<ResolvedUrl, ResolveError> {
        let resolver = self.resolver_for(info)?;
        info.insert_param(keys::PARAM_JSON, param_json);
        let resolved = resolver.resolve_by_id(info, &self.context()).await?;
        info.insert_param(keys::DOWNLOAD_URL, resolved.url.clone());
        info!(resolver = resolver.name(), "Resolved shared file by id");
        Ok(resolved)
    }

    /// Resolves a file taken from [`resolve_file_list`](Self::resolve_file_list).
    ///
    /// The listed entry becomes `paramJson`, and also `fileInfo` when none is
    /// recorded yet so generated links carry the file name.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_by_id`](Self::resolve_by_id).
    pub async fn resolve_file(
        &self,
        info: &mut ShareLinkInfo,
        file: &FileInfo,
    ) -> Result<ResolvedUrl, ResolveError> {
        let file_json = serde_json::to_value(file).map_err(|error| {
            ResolveError::resolution_failed(
                info.parser_type(),
                format!("cannot encode file entry: {error}"),
            )
        })?;
        if info.param(keys::FILE_INFO).is_none() {
            info.insert_param(keys::FILE_INFO, file_json.clone());
        }
        self.resolve_by_id(info, file_json).await
    }

    /// Renders every registered client link for a resolved share link.
    #[must_use]
    pub fn generate_links(&self, info: &ShareLinkInfo) -> GeneratedLinks {
        self.generators.generate_all(info)
    }

    /// Renders one client link.
    ///
    /// # Errors
    ///
    /// Returns the generator's [`GenerationError`].
    pub fn generate_link(
        &self,
        info: &ShareLinkInfo,
        link_type: ClientLinkType,
    ) -> Result<Option<String>, GenerationError> {
        self.generators.generate(info, link_type)
    }

    /// Identifies, resolves and renders a share URL in one call.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] from identification or resolution; generator
    /// failures are reported in [`GeneratedLinks::failures`] instead.
    pub async fn resolve_url(&self, url: &str) -> Result<Resolution, ResolveError> {
        let mut share = self.share_link_from_url(url)?;
        let resolved = self.resolve(&mut share).await?;
        let links = self.generate_links(&share);
        if !links.failures.is_empty() {
            warn!(
                parser_type = share.parser_type(),
                failed = links.failures.len(),
                "Some client links could not be generated"
            );
        }
        Ok(Resolution {
            share,
            resolved,
            links,
        })
    }
}

impl std::fmt::Debug for LinkPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPipeline")
            .field("parsers", &self.parsers)
            .field("generators", &self.generators)
            .field("builtin_installed", &self.builtin.len())
            .field("cache", &self.cache.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("sandbox_limits", &self.sandbox_limits)
            .finish_non_exhaustive()
    }
}
