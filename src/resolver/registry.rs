//! Concurrent registry of custom providers.
//!
//! The [`ParserRegistry`] holds [`ResolverConfig`]s keyed by lower-case type tag.
//! Reads never block writers on other shards and always see whole entries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use super::{BuiltinProvider, RegistryError, ResolverConfig, ShareMatch};
use crate::sandbox::loader;

#[derive(Debug, Clone)]
struct RegisteredParser {
    seq: u64,
    config: Arc<ResolverConfig>,
}

/// Outcome of [`ParserRegistry::load_script_dir`].
#[derive(Debug, Default)]
pub struct ScriptLoadReport {
    /// Type tags registered, in load order.
    pub loaded: Vec<String>,
    /// Files that failed, with the reason.
    pub failed: Vec<(PathBuf, RegistryError)>,
}

impl ScriptLoadReport {
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Registry of custom providers, safe to share across tasks.
pub struct ParserRegistry {
    parsers: DashMap<String, RegisteredParser>,
    next_seq: AtomicU64,
}

impl ParserRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Registers a custom provider.
    ///
    /// The type tag is lower-cased, then checked against the built-in catalog,
    /// then against existing entries, then validated. Nothing is stored unless
    /// every check passes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] for a built-in tag,
    /// [`RegistryError::Duplicate`] for a registered tag and
    /// [`RegistryError::Validation`] for an invalid config.
    #[tracing::instrument(skip(self, config), fields(parser_type = %config.parser_type()))]
    pub fn register(&self, mut config: ResolverConfig) -> Result<Arc<ResolverConfig>, RegistryError> {
        let parser_type = config.parser_type().trim().to_lowercase();

        if let Some(builtin) = BuiltinProvider::from_tag(&parser_type) {
            return Err(RegistryError::conflict(&parser_type, builtin.display_name()));
        }
        if self.parsers.contains_key(&parser_type) {
            return Err(RegistryError::duplicate(&parser_type));
        }

        config.set_parser_type(parser_type.clone());
        config.validate()?;
        let config = Arc::new(config);

        match self.parsers.entry(parser_type.clone()) {
            Entry::Occupied(_) => Err(RegistryError::duplicate(&parser_type)),
            Entry::Vacant(slot) => {
                slot.insert(RegisteredParser {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    config: Arc::clone(&config),
                });
                info!(
                    parser_type = %parser_type,
                    display_name = config.display_name(),
                    scripted = config.is_scripted(),
                    "Registered parser"
                );
                Ok(config)
            }
        }
    }

    /// Parses, compiles and registers a script.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Script`] when the script cannot be loaded, or any
    /// [`register`](Self::register) error.
    pub fn register_script(&self, source: &str) -> Result<Arc<ResolverConfig>, RegistryError> {
        let config =
            loader::parse_script(source).map_err(|error| RegistryError::script("<inline>", error))?;
        self.register(config)
    }

    /// Reads, compiles and registers the script at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`register_script`](Self::register_script), plus unreadable files.
    pub fn register_script_file(&self, path: &Path) -> Result<Arc<ResolverConfig>, RegistryError> {
        let config = loader::load_file(path)
            .map_err(|error| RegistryError::script(path.display().to_string(), error))?;
        self.register(config)
    }

    /// Registers every `*.rhai` script in `dir`, in file-name order.
    ///
    /// A failing file is logged and reported; it never stops the remaining files.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Script`] only when the directory itself cannot be listed.
    #[tracing::instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub fn load_script_dir(&self, dir: &Path) -> Result<ScriptLoadReport, RegistryError> {
        let files = loader::discover(dir)
            .map_err(|error| RegistryError::script(dir.display().to_string(), error))?;

        let mut report = ScriptLoadReport::default();
        for path in files {
            match self.register_script_file(&path) {
                Ok(config) => report.loaded.push(config.parser_type().to_string()),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Skipping script");
                    report.failed.push((path, error));
                }
            }
        }
        info!(
            loaded = report.loaded_count(),
            failed = report.failed_count(),
            "Script directory loaded"
        );
        Ok(report)
    }

    /// Finds the first provider, in registration order, whose pattern matches `url`.
    #[must_use]
    #[allow(clippy::wrong_self_convention)]
    pub fn from_share_url(&self, url: &str) -> Option<(Arc<ResolverConfig>, ShareMatch)> {
        let mut candidates: Vec<RegisteredParser> = self
            .parsers
            .iter()
            .filter(|entry| entry.config.supports_share_url())
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by_key(|parser| parser.seq);

        candidates.into_iter().find_map(|parser| {
            let share = parser.config.identify(url)?;
            debug!(parser_type = parser.config.parser_type(), "Share URL matched custom parser");
            Some((parser.config, share))
        })
    }

    /// Returns the provider registered under `parser_type` (case-insensitive).
    #[must_use]
    pub fn get(&self, parser_type: &str) -> Option<Arc<ResolverConfig>> {
        self.parsers
            .get(&normalize(parser_type))
            .map(|entry| Arc::clone(&entry.config))
    }

    #[must_use]
    pub fn contains(&self, parser_type: &str) -> bool {
        self.parsers.contains_key(&normalize(parser_type))
    }

    /// Removes a provider, returning it if it was registered.
    #[tracing::instrument(skip(self))]
    pub fn unregister(&self, parser_type: &str) -> Option<Arc<ResolverConfig>> {
        let removed = self
            .parsers
            .remove(&normalize(parser_type))
            .map(|(_, parser)| parser.config);
        if removed.is_some() {
            info!("Unregistered parser");
        } else {
            debug!("Unregister ignored; type not registered");
        }
        removed
    }

    /// Removes every provider.
    pub fn clear(&self) {
        self.parsers.clear();
        debug!("Parser registry cleared");
    }

    /// Snapshot of all providers in registration order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<ResolverConfig>> {
        let mut parsers: Vec<RegisteredParser> =
            self.parsers.iter().map(|entry| entry.value().clone()).collect();
        parsers.sort_by_key(|parser| parser.seq);
        parsers.into_iter().map(|parser| parser.config).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

fn normalize(parser_type: &str) -> String {
    parser_type.trim().to_lowercase()
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<String> = self
            .get_all()
            .iter()
            .map(|config| config.parser_type().to_string())
            .collect();
        f.debug_struct("ParserRegistry")
            .field("parser_count", &types.len())
            .field("parsers", &types)
            .finish()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
