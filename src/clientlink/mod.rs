//! Rendering resolved links for download clients.
//!
//! A resolved [`ShareLinkInfo`](crate::model::ShareLinkInfo) is reduced to a
//! [`DownloadLinkMeta`] and fanned out through every registered
//! [`ClientLinkGenerator`]. One generator per [`ClientLinkType`]; output order
//! is the declaration order of the enum.
//!
//! # Example
//!
//! ```
//! use sharelink_core::clientlink::{ClientLinkType, GeneratorRegistry};
//! use sharelink_core::model::ShareLinkInfo;
//!
//! let mut info = ShareLinkInfo::new("demo", "https://demo.example/s/k");
//! info.insert_param("downloadUrl", "https://cdn.example.com/file.zip");
//!
//! let links = GeneratorRegistry::with_defaults().generate_all(&info);
//! assert_eq!(links.len(), 9);
//! assert!(links.get(ClientLinkType::Curl).unwrap().starts_with("curl -L"));
//! ```

mod encoders;
mod error;
mod meta;
mod registry;

pub use encoders::{
    Aria2Generator, BitCometGenerator, CurlGenerator, FdmGenerator, IdmGenerator,
    MotrixGenerator, PowerShellGenerator, ThunderGenerator, WgetGenerator, default_generators,
};
pub use error::GenerationError;
pub use meta::{DownloadHeaders, DownloadLinkMeta};
pub use registry::{GeneratedLinks, GeneratorRegistry};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output protocols, in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientLinkType {
    Aria2,
    Motrix,
    BitComet,
    Thunder,
    Wget,
    Curl,
    Idm,
    Fdm,
    PowerShell,
}

impl ClientLinkType {
    /// All types in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Aria2,
        Self::Motrix,
        Self::BitComet,
        Self::Thunder,
        Self::Wget,
        Self::Curl,
        Self::Idm,
        Self::Fdm,
        Self::PowerShell,
    ];

    /// Machine code, also the serialized form.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Aria2 => "aria2",
            Self::Motrix => "motrix",
            Self::BitComet => "bitcomet",
            Self::Thunder => "thunder",
            Self::Wget => "wget",
            Self::Curl => "curl",
            Self::Idm => "idm",
            Self::Fdm => "fdm",
            Self::PowerShell => "powershell",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Aria2 => "Aria2",
            Self::Motrix => "Motrix",
            Self::BitComet => "BitComet",
            Self::Thunder => "Thunder",
            Self::Wget => "wget command",
            Self::Curl => "cURL command",
            Self::Idm => "IDM",
            Self::Fdm => "Free Download Manager",
            Self::PowerShell => "PowerShell",
        }
    }

    /// Whether the output can carry request headers (cookies, referer, ...).
    #[must_use]
    pub const fn supports_headers(self) -> bool {
        !matches!(self, Self::Thunder)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Aria2 => "aria2c command line with resume and 8 segments",
            Self::Motrix => "Motrix task import (JSON)",
            Self::BitComet => "bitcomet:// protocol link",
            Self::Thunder => "thunder:// protocol link (URL only)",
            Self::Wget => "wget command line",
            Self::Curl => "curl command line following redirects",
            Self::Idm => "idm:// protocol link",
            Self::Fdm => "Free Download Manager import text",
            Self::PowerShell => "PowerShell Invoke-WebRequest script",
        }
    }

    /// Looks a type up by its code (case-insensitive).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|link_type| link_type.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for ClientLinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Renders a [`DownloadLinkMeta`] for one client.
///
/// Implementations must be pure: no I/O, no shared mutable state.
pub trait ClientLinkGenerator: Send + Sync {
    fn link_type(&self) -> ClientLinkType;

    /// Produces the client output, or `Ok(None)` when there is nothing to emit.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Encoding`] when the metadata cannot be expressed
    /// in this client's format.
    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError>;

    fn supports(&self, meta: &DownloadLinkMeta) -> bool {
        meta.has_valid_url()
    }
}
