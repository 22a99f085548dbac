//! Error type for client-link generation.

use thiserror::Error;

use super::ClientLinkType;

/// Failure of a single generator. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Metadata cannot be expressed in the client's format
    #[error("cannot build {link_type} link: {reason}")]
    Encoding {
        link_type: ClientLinkType,
        reason: String,
    },

    /// Generator panicked; the panic was contained
    #[error(
        "{link_type} generator panicked\n  Suggestion: This is a bug in the generator, report it with the input link"
    )]
    Panicked { link_type: ClientLinkType },
}

impl GenerationError {
    #[must_use]
    pub fn encoding(link_type: ClientLinkType, reason: impl Into<String>) -> Self {
        Self::Encoding {
            link_type,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn link_type(&self) -> ClientLinkType {
        match self {
            Self::Encoding { link_type, .. } | Self::Panicked { link_type } => *link_type,
        }
    }
}
