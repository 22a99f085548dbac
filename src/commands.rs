//! CLI command handlers.
//!
//! Results go to stdout; diagnostics go through tracing on stderr.

use std::io::{self, Write};

use anyhow::{Result, bail};
use sharelink_core::resolver::ResolverSource;
use sharelink_core::{BuiltinProvider, ClientLinkType, LinkPipeline};
use tracing::info;

/// Prints the direct download URL for `url`.
pub(crate) async fn run_resolve(pipeline: &LinkPipeline, url: &str) -> Result<()> {
    let mut share = pipeline.share_link_from_url(url)?;
    let resolved = pipeline.resolve(&mut share).await?;
    info!(
        parser_type = share.parser_type(),
        from_cache = resolved.from_cache,
        "Share link resolved"
    );
    writeln!(io::stdout().lock(), "{}", resolved.url)?;
    Ok(())
}

/// Prints every client link for `url`, or only the requested one.
pub(crate) async fn run_links(
    pipeline: &LinkPipeline,
    url: &str,
    link_type: Option<ClientLinkType>,
) -> Result<()> {
    let mut share = pipeline.share_link_from_url(url)?;
    pipeline.resolve(&mut share).await?;

    let mut out = io::stdout().lock();
    if let Some(link_type) = link_type {
        let Some(link) = pipeline.generate_link(&share, link_type)? else {
            bail!("No {} link could be generated for '{url}'", link_type.display_name());
        };
        writeln!(out, "{link}")?;
        return Ok(());
    }

    let links = pipeline.generate_links(&share);
    if links.is_empty() {
        bail!("No client links could be generated for '{url}'");
    }
    for (index, (link_type, link)) in links.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        writeln!(out, "# {} ({})", link_type.display_name(), link_type.code())?;
        writeln!(out, "{link}")?;
    }
    Ok(())
}

/// Prints one tab-separated line per provider: type, display name, origin.
pub(crate) fn run_providers(pipeline: &LinkPipeline) -> Result<()> {
    let mut out = io::stdout().lock();
    for provider in BuiltinProvider::ALL {
        writeln!(out, "{}\t{}\tbuilt-in", provider.tag(), provider.display_name())?;
    }
    for config in pipeline.parsers().get_all() {
        let origin = match config.source() {
            ResolverSource::Scripted(_) => "script",
            ResolverSource::Compiled(_) => "compiled",
        };
        writeln!(out, "{}\t{}\t{origin}", config.parser_type(), config.display_name())?;
    }
    Ok(())
}
