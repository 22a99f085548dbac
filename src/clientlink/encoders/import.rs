//! Task-import formats for Motrix (JSON) and Free Download Manager (text).

use std::fmt::Write as _;

use serde::Serialize;

use crate::clientlink::{
    ClientLinkGenerator, ClientLinkType, DownloadHeaders, DownloadLinkMeta, GenerationError,
};

#[derive(Serialize)]
struct MotrixTask<'a> {
    url: &'a str,
    filename: &'a str,
    headers: &'a DownloadHeaders,
    out: &'a str,
}

pub struct MotrixGenerator;

impl ClientLinkGenerator for MotrixGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Motrix
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let file_name = meta.file_name().unwrap_or_default();
        let task = MotrixTask {
            url: meta.url(),
            filename: file_name,
            headers: meta.headers(),
            out: file_name,
        };
        serde_json::to_string_pretty(&task)
            .map(Some)
            .map_err(|error| GenerationError::encoding(ClientLinkType::Motrix, error.to_string()))
    }
}

/// One `Key=value` per line; line breaks inside a value cannot be represented.
pub struct FdmGenerator;

impl ClientLinkGenerator for FdmGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Fdm
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let headers = meta
            .headers()
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ");
        let fields = [
            ("URL", meta.url()),
            ("Filename", meta.file_name().unwrap_or_default()),
            ("Headers", headers.as_str()),
            ("Referer", meta.referer().unwrap_or_default()),
            ("User-Agent", meta.user_agent()),
        ];

        let mut out = String::new();
        for (key, value) in fields {
            if value.contains(['\r', '\n']) {
                return Err(GenerationError::encoding(
                    ClientLinkType::Fdm,
                    format!("{key} contains a line break"),
                ));
            }
            let _ = writeln!(out, "{key}={value}");
        }
        Ok(Some(out))
    }
}
