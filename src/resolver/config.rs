//! Registration record for a custom provider.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use url::Url;

use super::utils::{
    build_share_link, build_share_link_from_key, canonical_host, capture_share_match,
    has_key_group,
};
use super::{RegistryError, ResolveError, Resolver, ShareMatch};
use crate::model::ShareLinkInfo;
use crate::sandbox::{ENTRY_POINT_ARITY, PARSE_ENTRY_POINT, ScriptProgram};

type FactoryFn = dyn Fn(&ShareLinkInfo) -> Result<Box<dyn Resolver>, ResolveError> + Send + Sync;

/// A named factory that builds a resolver for one request.
#[derive(Clone)]
pub struct CompiledResolver {
    name: String,
    factory: Arc<FactoryFn>,
}

impl CompiledResolver {
    /// Wraps a factory closure under `name` (used in logs and validation).
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ShareLinkInfo) -> Result<Box<dyn Resolver>, ResolveError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the resolver for `info`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the factory reports.
    pub fn instantiate(&self, info: &ShareLinkInfo) -> Result<Box<dyn Resolver>, ResolveError> {
        (self.factory)(info)
    }
}

impl fmt::Debug for CompiledResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledResolver")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Where a custom provider's resolution logic comes from.
#[derive(Debug, Clone)]
pub enum ResolverSource {
    /// Rust resolver built per request by a factory.
    Compiled(CompiledResolver),
    /// Script executed in the sandbox.
    Scripted(ScriptProgram),
}

/// Configuration of one custom provider.
///
/// Build with [`ResolverConfig::new`] and the `with_*` methods, then hand to
/// [`ParserRegistry::register`](super::ParserRegistry::register), which validates it.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    parser_type: String,
    display_name: String,
    source: ResolverSource,
    match_pattern: Option<String>,
    pattern: Option<Regex>,
    standard_url_template: Option<String>,
    provider_domain: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl ResolverConfig {
    #[must_use]
    pub fn new(
        parser_type: impl Into<String>,
        display_name: impl Into<String>,
        source: ResolverSource,
    ) -> Self {
        Self {
            parser_type: parser_type.into(),
            display_name: display_name.into(),
            source,
            match_pattern: None,
            pattern: None,
            standard_url_template: None,
            provider_domain: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Shorthand for a config backed by a [`CompiledResolver`].
    #[must_use]
    pub fn compiled(
        parser_type: impl Into<String>,
        display_name: impl Into<String>,
        resolver: CompiledResolver,
    ) -> Self {
        Self::new(parser_type, display_name, ResolverSource::Compiled(resolver))
    }

    /// Sets the share-URL pattern. It must declare a `KEY` group and may declare `PWD`.
    #[must_use]
    pub fn with_match_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.pattern = Regex::new(&pattern).ok();
        self.match_pattern = Some(pattern);
        self
    }

    #[must_use]
    pub fn with_standard_url_template(mut self, template: impl Into<String>) -> Self {
        self.standard_url_template = Some(template.into());
        self
    }

    /// Sets the provider's home domain; stored as a canonical host.
    #[must_use]
    pub fn with_provider_domain(mut self, domain: &str) -> Self {
        let host = Url::parse(domain)
            .ok()
            .and_then(|url| url.host_str().map(canonical_host))
            .unwrap_or_else(|| canonical_host(domain));
        self.provider_domain = Some(host).filter(|host| !host.is_empty());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn parser_type(&self) -> &str {
        &self.parser_type
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn source(&self) -> &ResolverSource {
        &self.source
    }

    #[must_use]
    pub fn is_scripted(&self) -> bool {
        matches!(self.source, ResolverSource::Scripted(_))
    }

    #[must_use]
    pub fn match_pattern(&self) -> Option<&str> {
        self.match_pattern.as_deref()
    }

    #[must_use]
    pub fn standard_url_template(&self) -> Option<&str> {
        self.standard_url_template.as_deref()
    }

    #[must_use]
    pub fn provider_domain(&self) -> Option<&str> {
        self.provider_domain.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// True when this provider can be found from a share URL.
    #[must_use]
    pub fn supports_share_url(&self) -> bool {
        self.pattern.is_some()
    }

    /// Extracts the share key (and password, if the pattern captures one) from `url`.
    #[must_use]
    pub fn identify(&self, url: &str) -> Option<ShareMatch> {
        self.pattern
            .as_ref()
            .and_then(|regex| capture_share_match(regex, url.trim()))
    }

    /// Builds the canonical link for a share URL this provider identified.
    #[must_use]
    pub fn share_link_info(&self, share_url: &str, share: &ShareMatch) -> ShareLinkInfo {
        build_share_link(
            &self.parser_type,
            &self.display_name,
            share_url.trim(),
            self.standard_url_template.as_deref(),
            share,
        )
    }

    /// Builds the canonical link from a share key alone.
    #[must_use]
    pub fn share_link_from_key(&self, share: &ShareMatch) -> ShareLinkInfo {
        build_share_link_from_key(
            &self.parser_type,
            &self.display_name,
            self.standard_url_template.as_deref(),
            share,
        )
    }

    pub(crate) fn set_parser_type(&mut self, parser_type: String) {
        self.parser_type = parser_type;
    }

    /// Checks every registration invariant that does not depend on registry state.
    pub(crate) fn validate(&self) -> Result<(), RegistryError> {
        let parser_type = self.parser_type.as_str();
        if parser_type.trim().is_empty() {
            return Err(RegistryError::validation(
                parser_type,
                "type tag is empty",
                "Give the parser a short lower-case type tag",
            ));
        }
        if self.display_name.trim().is_empty() {
            return Err(RegistryError::validation(
                parser_type,
                "display name is empty",
                "Set a human-readable display name",
            ));
        }

        match &self.source {
            ResolverSource::Compiled(resolver) => {
                if resolver.name().trim().is_empty() {
                    return Err(RegistryError::validation(
                        parser_type,
                        "compiled resolver has no name",
                        "Name the resolver factory",
                    ));
                }
            }
            ResolverSource::Scripted(program) => {
                if program.source().trim().is_empty() {
                    return Err(RegistryError::validation(
                        parser_type,
                        "script source is empty",
                        "Provide the script text",
                    ));
                }
                if !program.has_entry_point(PARSE_ENTRY_POINT, ENTRY_POINT_ARITY) {
                    return Err(RegistryError::validation(
                        parser_type,
                        "script does not define parse(share, http, logger)",
                        "Add a `parse` function taking three parameters",
                    ));
                }
            }
        }

        if let Some(raw) = &self.match_pattern {
            let regex = Regex::new(raw).map_err(|error| {
                RegistryError::validation(
                    parser_type,
                    format!("match pattern does not compile: {error}"),
                    "Fix the regular expression syntax",
                )
            })?;
            if !has_key_group(&regex) {
                return Err(RegistryError::validation(
                    parser_type,
                    format!("match pattern '{raw}' has no KEY group"),
                    "Capture the share key with a named group, e.g. (?P<KEY>[^/]+)",
                ));
            }
        }
        Ok(())
    }
}
