//! Error types for loading and running scripted resolvers.

use std::time::Duration;

use thiserror::Error;

/// Failures of the script sandbox.
///
/// Load-time variants (`Metadata`, `Compile`, `MissingEntryPoint`, `Io`) surface
/// from registration; run-time variants are wrapped in
/// [`ResolveError::Sandbox`](crate::resolver::ResolveError::Sandbox).
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    /// Header block missing or incomplete
    #[error(
        "invalid script metadata: {reason}\n  Suggestion: Start the script with a // ==UserScript== block declaring @type, @displayName and @match"
    )]
    Metadata {
        /// What is wrong with the header
        reason: String,
    },

    /// Script source does not compile
    #[error("script failed to compile: {reason}")]
    Compile {
        /// Parser diagnostic including the position
        reason: String,
    },

    /// Script lacks a required function
    #[error(
        "script does not define `{name}` with {arity} parameters\n  Suggestion: Add `fn {name}(share, http, logger) {{ ... }}`"
    )]
    MissingEntryPoint {
        /// Function name looked up
        name: String,
        /// Expected parameter count
        arity: usize,
    },

    /// Script misused a capability or hit an engine limit
    #[error("script runtime error: {reason}")]
    Runtime {
        /// Engine diagnostic
        reason: String,
    },

    /// Script exceeded its wall-clock budget
    #[error("script exceeded its time limit of {timeout:?}")]
    Timeout {
        /// Configured budget
        timeout: Duration,
    },

    /// Caller abandoned the request while the script was running
    #[error("script was cancelled by the caller")]
    Cancelled,

    /// Entry point returned a value of the wrong shape
    #[error("`{entry_point}` returned an invalid value: {reason}")]
    InvalidReturn {
        /// Function that returned the value
        entry_point: String,
        /// What was expected versus found
        reason: String,
    },

    /// Script file could not be read
    #[error("cannot read script '{path}': {reason}")]
    Io {
        /// File path
        path: String,
        /// OS error text
        reason: String,
    },
}

impl SandboxError {
    /// Creates a `Metadata` error.
    #[must_use]
    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    /// Creates a `Runtime` error.
    #[must_use]
    pub fn runtime(reason: impl Into<String>) -> Self {
        Self::Runtime {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidReturn` error.
    #[must_use]
    pub fn invalid_return(entry_point: &str, reason: impl Into<String>) -> Self {
        Self::InvalidReturn {
            entry_point: entry_point.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures detected while loading, before any invocation.
    #[must_use]
    pub fn is_load_time(&self) -> bool {
        matches!(
            self,
            Self::Metadata { .. } | Self::Compile { .. } | Self::MissingEntryPoint { .. } | Self::Io { .. }
        )
    }
}
