//! Shell command lines for curl, wget and aria2c.

use super::shell_quote;
use crate::clientlink::{ClientLinkGenerator, ClientLinkType, DownloadLinkMeta, GenerationError};

/// Header arguments as `name: value` pairs.
fn header_lines(meta: &DownloadLinkMeta) -> impl Iterator<Item = String> + '_ {
    meta.headers()
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
}

pub struct CurlGenerator;

impl ClientLinkGenerator for CurlGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Curl
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let mut parts = vec!["curl -L".to_string()];
        parts.extend(header_lines(meta).map(|header| format!("-H {}", shell_quote(&header))));
        if let Some(file_name) = meta.file_name() {
            parts.push(format!("-o {}", shell_quote(file_name)));
        }
        parts.push(shell_quote(meta.url()));
        Ok(Some(parts.join(" \\\n  ")))
    }
}

pub struct WgetGenerator;

impl ClientLinkGenerator for WgetGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Wget
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let mut parts = vec!["wget".to_string()];
        parts.extend(header_lines(meta).map(|header| format!("--header={}", shell_quote(&header))));
        if let Some(file_name) = meta.file_name() {
            parts.push(format!("-O {}", shell_quote(file_name)));
        }
        parts.push(shell_quote(meta.url()));
        Ok(Some(parts.join(" \\\n     ")))
    }
}

pub struct Aria2Generator;

impl Aria2Generator {
    const TRANSFER_FLAGS: [&'static str; 5] =
        ["--continue", "--max-tries=3", "--retry-wait=5", "-s 8", "-x 8"];
}

impl ClientLinkGenerator for Aria2Generator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Aria2
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let mut parts = vec!["aria2c".to_string()];
        parts.extend(header_lines(meta).map(|header| format!("--header={}", shell_quote(&header))));
        if let Some(file_name) = meta.file_name() {
            parts.push(format!("--out={}", shell_quote(file_name)));
        }
        parts.extend(Self::TRANSFER_FLAGS.map(str::to_string));
        parts.push(shell_quote(meta.url()));
        Ok(Some(parts.join(" \\\n       ")))
    }
}
