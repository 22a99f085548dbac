//! Turns script files into resolver configurations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ENTRY_POINT_ARITY, PARSE_ENTRY_POINT, SandboxError, ScriptMetadata, ScriptProgram};
use crate::resolver::{ResolverConfig, ResolverSource};

/// File extension of script resolvers.
pub(crate) const SCRIPT_EXTENSION: &str = "rhai";

/// Parses the header, compiles the body and builds the configuration.
pub(crate) fn parse_script(source: &str) -> Result<ResolverConfig, SandboxError> {
    if source.trim().is_empty() {
        return Err(SandboxError::metadata("script is empty"));
    }
    let metadata = ScriptMetadata::parse(source)?;
    let program = ScriptProgram::compile(source)?;
    if !program.has_entry_point(PARSE_ENTRY_POINT, ENTRY_POINT_ARITY) {
        return Err(SandboxError::MissingEntryPoint {
            name: PARSE_ENTRY_POINT.to_string(),
            arity: ENTRY_POINT_ARITY,
        });
    }

    let mut config = ResolverConfig::new(
        metadata.parser_type(),
        metadata.display_name(),
        ResolverSource::Scripted(program),
    );
    if let Some(pattern) = metadata.match_pattern() {
        config = config.with_match_pattern(pattern);
    }
    if let Some(template) = metadata.standard_url_template() {
        config = config.with_standard_url_template(template);
    }
    if let Some(domain) = metadata.provider_domain() {
        config = config.with_provider_domain(domain);
    }
    Ok(config.with_metadata(metadata.into_entries()))
}

/// Reads and parses one script file.
pub(crate) fn load_file(path: &Path) -> Result<ResolverConfig, SandboxError> {
    let source = fs::read_to_string(path).map_err(|error| SandboxError::Io {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    debug!(path = %path.display(), bytes = source.len(), "Loaded script file");
    parse_script(&source)
}

/// Lists `*.rhai` files directly inside `dir`, sorted by name.
pub(crate) fn discover(dir: &Path) -> Result<Vec<PathBuf>, SandboxError> {
    let io_error = |error: std::io::Error| SandboxError::Io {
        path: dir.display().to_string(),
        reason: error.to_string(),
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_script = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION));
        if is_script && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
