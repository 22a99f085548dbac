//! Protocol-handler links: `thunder://`, `bitcomet://` and `idm://`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::clientlink::{ClientLinkGenerator, ClientLinkType, DownloadLinkMeta, GenerationError};

/// `thunder://` + base64 of `AA{url}ZZ`. Headers cannot be carried.
pub struct ThunderGenerator;

impl ClientLinkGenerator for ThunderGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Thunder
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let wrapped = format!("AA{}ZZ", meta.url());
        Ok(Some(format!("thunder://{}", STANDARD.encode(wrapped))))
    }
}

pub struct BitCometGenerator;

impl ClientLinkGenerator for BitCometGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::BitComet
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        Ok(Some(handler_link("bitcomet", meta)))
    }
}

pub struct IdmGenerator;

impl ClientLinkGenerator for IdmGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Idm
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        Ok(Some(handler_link("idm", meta)))
    }
}

/// `{scheme}:///?url=..[&header=..][&filename=..]` with base64, percent-encoded
/// values. Headers are joined with CRLF, so header or file-name text containing
/// control characters would corrupt the block; such links degrade to the raw URL.
fn handler_link(scheme: &str, meta: &DownloadLinkMeta) -> String {
    let header_block = meta
        .headers()
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\r\n");
    let file_name = meta.file_name().unwrap_or_default();

    let has_control = |text: &str| text.chars().any(char::is_control);
    let header_unsafe = meta
        .headers()
        .iter()
        .any(|(name, value)| has_control(name) || has_control(value));
    if header_unsafe || has_control(file_name) {
        return format!("{scheme}:///?url={}", meta.url());
    }

    let encode = |text: &str| urlencoding::encode(&STANDARD.encode(text)).into_owned();
    let mut link = format!("{scheme}:///?url={}", encode(meta.url()));
    if !header_block.is_empty() {
        link.push_str("&header=");
        link.push_str(&encode(&header_block));
    }
    if !file_name.is_empty() {
        link.push_str("&filename=");
        link.push_str(&encode(file_name));
    }
    link
}
