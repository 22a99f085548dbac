//! Concurrent registry of client-link generators.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    ClientLinkGenerator, ClientLinkType, DownloadLinkMeta, GenerationError, default_generators,
};
use crate::model::ShareLinkInfo;

/// Output of a batch generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedLinks {
    /// Non-empty outputs, keyed and ordered by client type.
    pub links: BTreeMap<ClientLinkType, String>,
    /// Generators that failed or panicked; their types are absent from `links`.
    #[serde(skip)]
    pub failures: Vec<GenerationError>,
}

impl GeneratedLinks {
    #[must_use]
    pub fn get(&self, link_type: ClientLinkType) -> Option<&str> {
        self.links.get(&link_type).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientLinkType, &str)> {
        self.links
            .iter()
            .map(|(link_type, link)| (*link_type, link.as_str()))
    }
}

/// Generators keyed by [`ClientLinkType`]; at most one per type.
pub struct GeneratorRegistry {
    generators: DashMap<ClientLinkType, Arc<dyn ClientLinkGenerator>>,
}

impl GeneratorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generators: DashMap::new(),
        }
    }

    /// Creates a registry holding every built-in generator.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for generator in default_generators() {
            registry.register(generator);
        }
        registry
    }

    /// Registers a generator, returning the one it replaced.
    pub fn register(
        &self,
        generator: Arc<dyn ClientLinkGenerator>,
    ) -> Option<Arc<dyn ClientLinkGenerator>> {
        let link_type = generator.link_type();
        let previous = self.generators.insert(link_type, generator);
        debug!(link_type = %link_type.code(), replaced = previous.is_some(), "Generator registered");
        previous
    }

    pub fn unregister(&self, link_type: ClientLinkType) -> Option<Arc<dyn ClientLinkGenerator>> {
        let removed = self.generators.remove(&link_type).map(|(_, generator)| generator);
        if removed.is_some() {
            info!(link_type = %link_type.code(), "Generator unregistered");
        }
        removed
    }

    #[must_use]
    pub fn is_registered(&self, link_type: ClientLinkType) -> bool {
        self.generators.contains_key(&link_type)
    }

    /// Registered generators in canonical type order.
    #[must_use]
    pub fn get_all_generators(&self) -> Vec<Arc<dyn ClientLinkGenerator>> {
        ClientLinkType::ALL
            .into_iter()
            .filter_map(|link_type| self.lookup(link_type))
            .collect()
    }

    /// Generates one client output for a resolved share link.
    ///
    /// Returns `Ok(None)` when no generator is registered for `link_type`, the
    /// metadata has no URL, or the generator had nothing to emit.
    ///
    /// # Errors
    ///
    /// Returns the generator's [`GenerationError`], including a contained panic.
    pub fn generate(
        &self,
        info: &ShareLinkInfo,
        link_type: ClientLinkType,
    ) -> Result<Option<String>, GenerationError> {
        let Some(generator) = self.lookup(link_type) else {
            warn!(link_type = %link_type.code(), "No generator registered");
            return Ok(None);
        };
        let meta = DownloadLinkMeta::from_share_link_info(info);
        if !generator.supports(&meta) {
            debug!(link_type = %link_type.code(), "Generator does not support metadata");
            return Ok(None);
        }
        run_guarded(generator.as_ref(), &meta)
    }

    /// Generates every registered output for a resolved share link.
    #[must_use]
    pub fn generate_all(&self, info: &ShareLinkInfo) -> GeneratedLinks {
        self.generate_all_for_meta(&DownloadLinkMeta::from_share_link_info(info))
    }

    /// Generates every registered output for already-extracted metadata.
    ///
    /// Failures are logged and collected; one broken generator never hides the
    /// output of another.
    #[must_use]
    pub fn generate_all_for_meta(&self, meta: &DownloadLinkMeta) -> GeneratedLinks {
        let mut result = GeneratedLinks::default();
        if !meta.has_valid_url() {
            warn!("Download metadata has no URL, no client links generated");
            return result;
        }

        for generator in self.get_all_generators() {
            let link_type = generator.link_type();
            if !generator.supports(meta) {
                continue;
            }
            match run_guarded(generator.as_ref(), meta) {
                Ok(Some(link)) if !link.trim().is_empty() => {
                    result.links.insert(link_type, link);
                }
                Ok(_) => debug!(link_type = %link_type.code(), "Generator produced no output"),
                Err(error) => {
                    warn!(link_type = %link_type.code(), error = %error, "Generator failed, skipping");
                    result.failures.push(error);
                }
            }
        }
        debug!(generated = result.len(), failed = result.failures.len(), "Client links generated");
        result
    }

    fn lookup(&self, link_type: ClientLinkType) -> Option<Arc<dyn ClientLinkGenerator>> {
        self.generators
            .get(&link_type)
            .map(|entry| Arc::clone(entry.value()))
    }
}

/// Runs a generator, turning a panic into [`GenerationError::Panicked`].
fn run_guarded(
    generator: &dyn ClientLinkGenerator,
    meta: &DownloadLinkMeta,
) -> Result<Option<String>, GenerationError> {
    catch_unwind(AssertUnwindSafe(|| generator.generate(meta))).unwrap_or_else(|_| {
        Err(GenerationError::Panicked {
            link_type: generator.link_type(),
        })
    })
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = ClientLinkType::ALL
            .into_iter()
            .filter(|link_type| self.is_registered(*link_type))
            .map(ClientLinkType::code)
            .collect();
        f.debug_struct("GeneratorRegistry")
            .field("generators", &types)
            .finish()
    }
}
