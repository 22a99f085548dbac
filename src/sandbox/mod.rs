//! Sandboxed execution of scripted resolvers.
//!
//! Scripts are written in [Rhai](https://rhai.rs). Each script carries a
//! `// ==UserScript==` header (see [`ScriptMetadata`]) and defines
//! `fn parse(share, http, logger)`, returning the direct URL as a string or a
//! promise that settles to one. An optional `fn parse_file_list(share, http, logger)`
//! returns an array of file maps, and an optional
//! `fn parse_by_id(share, http, logger)` resolves one listed file from the
//! `paramJson` parameter.
//!
//! Every invocation gets a fresh engine with only four capabilities: the
//! share link, an HTTP facade over the host's [`HttpFetch`](crate::resolver::HttpFetch),
//! a promise primitive and a logger. `eval` and module imports are disabled;
//! wall-clock time and operation count are bounded by [`SandboxLimits`].

mod convert;
mod engine;
mod error;
mod executor;
mod http_api;
pub(crate) mod loader;
mod logger;
mod metadata;
mod promise;
mod resolver;
mod share_api;

pub use error::SandboxError;
pub use logger::{ScriptLogEntry, ScriptLogLevel};
pub use metadata::ScriptMetadata;
pub use resolver::{ScriptReport, ScriptedResolver};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rhai::AST;

/// Name of the required resolution function.
pub const PARSE_ENTRY_POINT: &str = "parse";
/// Name of the optional folder-listing function.
pub const FILE_LIST_ENTRY_POINT: &str = "parse_file_list";
/// Name of the optional function resolving one file of a listing.
pub const BY_ID_ENTRY_POINT: &str = "parse_by_id";
/// Parameter count of every entry point: `(share, http, logger)`.
pub const ENTRY_POINT_ARITY: usize = 3;

/// Resource bounds applied to every script invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Wall-clock budget per invocation, HTTP time included.
    pub timeout: Duration,
    /// Interpreter operation budget; `0` means unlimited.
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    /// Longest string a script may build, in bytes.
    pub max_string_size: usize,
    /// Largest array or map a script may build.
    pub max_collection_size: usize,
}

impl SandboxLimits {
    /// Default wall-clock budget.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            max_operations: 50_000_000,
            max_call_levels: 64,
            max_expr_depth: 128,
            max_string_size: 16 * 1024 * 1024,
            max_collection_size: 100_000,
        }
    }
}

/// Script source together with its compiled program.
///
/// The AST is immutable and shared; each invocation evaluates it in its own
/// engine and scope.
#[derive(Clone)]
pub struct ScriptProgram {
    source: Arc<str>,
    ast: Arc<AST>,
}

impl ScriptProgram {
    /// Compiles `source` with the sandbox's restricted engine.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Compile`] with the parser diagnostic.
    pub fn compile(source: &str) -> Result<Self, SandboxError> {
        let engine = engine::restricted_engine(&SandboxLimits::default());
        let ast = engine.compile(source).map_err(|error| SandboxError::Compile {
            reason: error.to_string(),
        })?;
        Ok(Self {
            source: Arc::from(source),
            ast: Arc::new(ast),
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the script defines a function `name` taking `arity` parameters.
    #[must_use]
    pub fn has_entry_point(&self, name: &str, arity: usize) -> bool {
        self.ast
            .iter_functions()
            .any(|function| function.name == name && function.params.len() == arity)
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl fmt::Debug for ScriptProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptProgram")
            .field("source_len", &self.source.len())
            .field("functions", &self.ast.iter_functions().count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_reports_syntax_error() {
        let err = ScriptProgram::compile("fn parse(a, b, c) { let = }").unwrap_err();
        assert!(matches!(err, SandboxError::Compile { .. }), "{err}");
    }

    #[test]
    fn test_entry_point_requires_matching_arity() {
        let program = ScriptProgram::compile("fn parse(share, http) { 1 }").unwrap();
        assert!(program.has_entry_point("parse", 2));
        assert!(!program.has_entry_point(PARSE_ENTRY_POINT, ENTRY_POINT_ARITY));
    }

    #[test]
    fn test_limits_builders() {
        let limits = SandboxLimits::default()
            .with_timeout(Duration::from_secs(2))
            .with_max_operations(10);
        assert_eq!(limits.timeout, Duration::from_secs(2));
        assert_eq!(limits.max_operations, 10);
        assert_eq!(SandboxLimits::default().timeout, SandboxLimits::DEFAULT_TIMEOUT);
    }
}
