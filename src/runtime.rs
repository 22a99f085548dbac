//! Merges CLI flags with file config and assembles the [`LinkPipeline`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sharelink_core::pipeline::DEFAULT_CACHE_TTL;
use sharelink_core::resolver::HttpSettings;
use sharelink_core::user_agent::resolver_user_agent;
use sharelink_core::{
    GeneratorRegistry, LinkPipeline, MemoryLinkCache, ParserRegistry, ReqwestFetch, SandboxLimits,
};
use tracing::debug;

use crate::app_config::PipelineConfig;
use crate::cli::Cli;

/// Effective settings after CLI flags override file values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSettings {
    pub(crate) script_dir: Option<PathBuf>,
    pub(crate) sandbox_limits: SandboxLimits,
    pub(crate) http: HttpSettings,
    pub(crate) cache_ttl: Duration,
}

impl RunSettings {
    pub(crate) fn from_sources(cli: &Cli, file: Option<&PipelineConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();

        let mut sandbox_limits = SandboxLimits::default();
        if let Some(secs) = cli.timeout.or(file.script_timeout_secs) {
            sandbox_limits = sandbox_limits.with_timeout(Duration::from_secs(secs));
        }
        if let Some(operations) = file.script_max_operations {
            sandbox_limits = sandbox_limits.with_max_operations(operations);
        }

        let mut http = HttpSettings::default();
        if let Some(secs) = file.http_connect_timeout_secs {
            http.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.http_read_timeout_secs {
            http.read_timeout = Duration::from_secs(secs);
        }
        http.user_agent = resolver_user_agent(file.user_agent.as_deref());

        Self {
            script_dir: cli.scripts_dir.clone().or(file.script_dir),
            sandbox_limits,
            http,
            cache_ttl: file
                .cache_ttl_secs
                .map_or(DEFAULT_CACHE_TTL, Duration::from_secs),
        }
    }
}

/// Builds the pipeline, loading scripts from the configured directory.
///
/// Individual scripts that fail to load are skipped with a warning; a missing
/// directory is an error.
pub(crate) fn build_pipeline(settings: &RunSettings) -> Result<LinkPipeline> {
    let parsers = Arc::new(ParserRegistry::new());
    if let Some(dir) = &settings.script_dir {
        if !dir.is_dir() {
            bail!("Scripts directory '{}' does not exist", dir.display());
        }
        let report = parsers
            .load_script_dir(dir)
            .with_context(|| format!("Failed to load scripts from '{}'", dir.display()))?;
        debug!(
            loaded = ?report.loaded,
            failed = report.failed_count(),
            "Script providers available"
        );
    }

    let http = ReqwestFetch::new(&settings.http).context("Failed to build HTTP client")?;

    Ok(LinkPipeline::new(
        parsers,
        Arc::new(GeneratorRegistry::with_defaults()),
        Arc::new(http),
    )
    .with_cache(Arc::new(MemoryLinkCache::new()))
    .with_cache_ttl(settings.cache_ttl)
    .with_sandbox_limits(settings.sandbox_limits))
}
