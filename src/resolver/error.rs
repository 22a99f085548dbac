//! Error types for parser registration and share-link resolution.
//!
//! Messages follow the What/Why/Suggestion layout so they read well when printed
//! straight to an operator.

use thiserror::Error;

use super::http_client::HttpError;
use crate::sandbox::SandboxError;

/// Errors returned synchronously by [`ParserRegistry`](super::ParserRegistry) mutations.
///
/// A rejected registration never changes registry state.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The config breaks one of the registration invariants
    #[error("invalid parser config for '{parser_type}': {reason}\n  Suggestion: {suggestion}")]
    Validation {
        /// Normalized type tag of the rejected config (may be empty)
        parser_type: String,
        /// Which invariant failed
        reason: String,
        /// How to fix the config
        suggestion: String,
    },

    /// The type tag is reserved by a built-in provider
    #[error(
        "type '{parser_type}' conflicts with built-in provider '{builtin}'\n  Suggestion: Choose a type tag that is not one of the built-in provider tags"
    )]
    Conflict {
        /// Rejected type tag
        parser_type: String,
        /// Display name of the built-in provider owning the tag
        builtin: String,
    },

    /// The type tag is already registered
    #[error(
        "type '{parser_type}' is already registered\n  Suggestion: Unregister the existing parser first or choose another type tag"
    )]
    Duplicate {
        /// Rejected type tag
        parser_type: String,
    },

    /// A script could not be loaded before registration
    #[error("failed to load script {origin}: {source}")]
    Script {
        /// Where the script came from (file path or `<inline>`)
        origin: String,
        /// Load-time sandbox failure
        #[source]
        source: SandboxError,
    },
}

impl RegistryError {
    /// Creates a `Validation` error.
    #[must_use]
    pub fn validation(parser_type: &str, reason: impl Into<String>, suggestion: &str) -> Self {
        Self::Validation {
            parser_type: parser_type.to_string(),
            reason: reason.into(),
            suggestion: suggestion.to_string(),
        }
    }

    /// Creates a `Conflict` error.
    #[must_use]
    pub fn conflict(parser_type: &str, builtin: &str) -> Self {
        Self::Conflict {
            parser_type: parser_type.to_string(),
            builtin: builtin.to_string(),
        }
    }

    /// Creates a `Duplicate` error.
    #[must_use]
    pub fn duplicate(parser_type: &str) -> Self {
        Self::Duplicate {
            parser_type: parser_type.to_string(),
        }
    }

    /// Wraps a load-time sandbox failure.
    #[must_use]
    pub fn script(origin: impl Into<String>, source: SandboxError) -> Self {
        Self::Script {
            origin: origin.into(),
            source,
        }
    }
}

/// Errors that can occur while identifying or resolving a share link.
///
/// Every variant names the provider type or input involved.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No built-in or registered provider recognizes the URL
    #[error("no resolver found for '{input}': {reason}\n  Suggestion: {suggestion}")]
    NoResolver {
        /// The URL no provider matched
        input: String,
        /// Why nothing matched
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// The type tag has no usable resolver
    #[error("unknown provider type '{parser_type}': {reason}\n  Suggestion: {suggestion}")]
    UnknownType {
        /// Requested type tag
        parser_type: String,
        /// Why the type cannot be served
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// The resolver ran and reported failure
    #[error("resolution failed for '{parser_type}': {reason}\n  Suggestion: {suggestion}")]
    ResolutionFailed {
        /// Provider type that failed
        parser_type: String,
        /// Failure reported by the resolver or thrown by the script
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// A scripted resolver misbehaved at run time
    #[error("script for '{parser_type}' failed in the sandbox: {source}")]
    Sandbox {
        /// Provider type of the script
        parser_type: String,
        /// Sandbox failure
        #[source]
        source: SandboxError,
    },

    /// A compiled resolver's HTTP call failed
    #[error("HTTP request for '{parser_type}' failed: {source}")]
    Http {
        /// Provider type that issued the request
        parser_type: String,
        /// Transport failure
        #[source]
        source: HttpError,
    },

    /// The resolver does not implement the requested operation
    #[error(
        "provider '{parser_type}' does not support {operation}\n  Suggestion: Use a provider that implements {operation}"
    )]
    Unsupported {
        /// Provider type
        parser_type: String,
        /// Operation that was requested
        operation: String,
    },
}

impl ResolveError {
    /// Creates a `NoResolver` error for a URL no provider matches.
    #[must_use]
    pub fn no_resolver(input: &str) -> Self {
        Self::NoResolver {
            input: input.to_string(),
            reason: "no built-in or registered provider matches this URL".to_string(),
            suggestion: "Check the share link or register a parser whose match pattern covers it"
                .to_string(),
        }
    }

    /// Creates an `UnknownType` error.
    #[must_use]
    pub fn unknown_type(parser_type: &str, reason: &str) -> Self {
        Self::UnknownType {
            parser_type: parser_type.to_string(),
            reason: reason.to_string(),
            suggestion: "Run `sharelink providers` to list available type tags".to_string(),
        }
    }

    /// Creates a `ResolutionFailed` error.
    #[must_use]
    pub fn resolution_failed(parser_type: &str, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            parser_type: parser_type.to_string(),
            reason: reason.into(),
            suggestion: "Check that the share link is still valid and the password is correct"
                .to_string(),
        }
    }

    /// Creates a `Sandbox` error.
    #[must_use]
    pub fn sandbox(parser_type: &str, source: SandboxError) -> Self {
        Self::Sandbox {
            parser_type: parser_type.to_string(),
            source,
        }
    }

    /// Creates an `Http` error.
    #[must_use]
    pub fn http(parser_type: &str, source: HttpError) -> Self {
        Self::Http {
            parser_type: parser_type.to_string(),
            source,
        }
    }

    /// Creates an `Unsupported` error.
    #[must_use]
    pub fn unsupported(parser_type: &str, operation: &str) -> Self {
        Self::Unsupported {
            parser_type: parser_type.to_string(),
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_registry_error_conflict_message() {
        let msg = RegistryError::conflict("lz", "Lanzou Cloud").to_string();
        assert!(msg.contains("'lz'"), "should name the type");
        assert!(msg.contains("Lanzou Cloud"), "should name the built-in");
        assert!(msg.contains("Suggestion"), "should have suggestion");
    }

    #[test]
    fn test_registry_error_duplicate_message() {
        let msg = RegistryError::duplicate("demo").to_string();
        assert!(msg.contains("already registered"));
        assert!(msg.contains("demo"));
    }

    #[test]
    fn test_resolve_error_no_resolver_message() {
        let msg = ResolveError::no_resolver("https://unknown.example/s/1").to_string();
        assert!(msg.contains("https://unknown.example/s/1"), "should contain input");
        assert!(msg.contains("no resolver"), "should mention no resolver");
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_resolve_error_failed_names_type_and_reason() {
        let msg = ResolveError::resolution_failed("demo", "share expired").to_string();
        assert!(msg.contains("'demo'"));
        assert!(msg.contains("share expired"));
    }

    #[test]
    fn test_resolve_error_sandbox_carries_source() {
        let err = ResolveError::sandbox(
            "demo",
            SandboxError::Timeout {
                timeout: Duration::from_secs(2),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("demo"));
        assert!(msg.contains("2s"), "should include the timeout: {msg}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_resolve_error_unsupported_message() {
        let msg = ResolveError::unsupported("lz", "file listing").to_string();
        assert!(msg.contains("does not support file listing"));
    }
}
