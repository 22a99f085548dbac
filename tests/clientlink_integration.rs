//! Integration tests for download-metadata extraction and client-link generation.

use std::sync::Arc;

use serde_json::json;
use sharelink_core::clientlink::DownloadHeaders;
use sharelink_core::user_agent::DEFAULT_BROWSER_USER_AGENT;
use sharelink_core::{
    ClientLinkGenerator, ClientLinkType, DownloadLinkMeta, GenerationError, GeneratorRegistry,
    ShareLinkInfo,
};

fn share() -> ShareLinkInfo {
    ShareLinkInfo::new("demo", "https://demo.example/s/k").with_share_key("k")
}

#[test]
fn test_download_url_beats_fallback_keys() {
    let info = share()
        .with_param("url", "https://fallback.example/a")
        .with_param("downloadUrl", "https://cdn.example.com/a");
    let meta = DownloadLinkMeta::from_share_link_info(&info);
    assert_eq!(meta.url(), "https://cdn.example.com/a");
}

#[test]
fn test_fallback_key_used_when_download_url_blank() {
    let info = share()
        .with_param("downloadUrl", "  ")
        .with_param("fileUrl", "https://files.example/b");
    let meta = DownloadLinkMeta::from_share_link_info(&info);
    assert_eq!(meta.url(), "https://files.example/b");
}

#[test]
fn test_empty_params_fall_back_to_share_url() {
    let meta = DownloadLinkMeta::from_share_link_info(&share());
    assert_eq!(meta.url(), "https://demo.example/s/k");
    assert!(meta.has_valid_url());
    assert_eq!(meta.user_agent(), DEFAULT_BROWSER_USER_AGENT);
    assert!(meta.headers().is_empty());
    assert!(meta.file_name().is_none());
}

#[test]
fn test_headers_referer_user_agent_and_file_name() {
    let info = share()
        .with_param("downloadUrl", "https://cdn.example.com/a")
        .with_param(
            "downloadHeaders",
            json!({ "Cookie": "sid=1", "Referer": "https://demo.example/", "X-Count": 3, "User-Agent": "Agent/2" }),
        )
        .with_param("fileInfo", json!({ "fileName": "report.pdf", "size": 10 }))
        .with_param("region", "eu");
    let meta = DownloadLinkMeta::from_share_link_info(&info);

    let names: Vec<&str> = meta.headers().iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["Cookie", "Referer", "User-Agent"]);
    assert_eq!(meta.referer(), Some("https://demo.example/"));
    assert_eq!(meta.user_agent(), "Agent/2");
    assert_eq!(meta.file_name(), Some("report.pdf"));
    assert_eq!(meta.ext_params().get("region"), Some(&json!("eu")));
    assert!(meta.ext_params().get("downloadUrl").is_none());
}

#[test]
fn test_download_referer_beats_header() {
    let info = share()
        .with_param("downloadUrl", "https://cdn.example.com/a")
        .with_param("downloadReferer", "https://explicit.example/")
        .with_param("downloadHeaders", json!({ "referer": "https://header.example/" }));
    let meta = DownloadLinkMeta::from_share_link_info(&info);
    assert_eq!(meta.referer(), Some("https://explicit.example/"));
}

#[test]
fn test_all_nine_links_for_resolved_share() {
    let info = share()
        .with_param("downloadUrl", "http://example.com/file.zip")
        .with_param("downloadHeaders", json!({ "Cookie": "a=1" }))
        .with_param("fileInfo", json!({ "fileName": "file.zip" }));
    let links = GeneratorRegistry::with_defaults().generate_all(&info);

    let order: Vec<ClientLinkType> = links.iter().map(|(link_type, _)| link_type).collect();
    assert_eq!(order, ClientLinkType::ALL);
    assert!(links.failures.is_empty());

    assert_eq!(
        links.get(ClientLinkType::Curl),
        Some("curl -L \\\n  -H \"Cookie: a=1\" \\\n  -o \"file.zip\" \\\n  \"http://example.com/file.zip\"")
    );
    assert_eq!(
        links.get(ClientLinkType::Thunder),
        Some("thunder://QUFodHRwOi8vZXhhbXBsZS5jb20vZmlsZS56aXBaWg==")
    );
    let aria2 = links.get(ClientLinkType::Aria2).unwrap();
    assert!(aria2.contains("--out=\"file.zip\""));
    for flag in ["--continue", "--max-tries=3", "--retry-wait=5", "-s 8", "-x 8"] {
        assert!(aria2.contains(&format!("{flag} \\\n")), "missing {flag}");
    }
    assert!(aria2.ends_with("\"http://example.com/file.zip\""));

    let motrix: serde_json::Value =
        serde_json::from_str(links.get(ClientLinkType::Motrix).unwrap()).unwrap();
    assert_eq!(motrix["headers"]["Cookie"], "a=1");
    assert_eq!(motrix["out"], "file.zip");

    let serialized = serde_json::to_value(&links).unwrap();
    assert_eq!(serialized["links"]["thunder"], links.get(ClientLinkType::Thunder).unwrap());
}

#[test]
fn test_fdm_failure_is_isolated() {
    let info = share()
        .with_param("downloadUrl", "http://example.com/file.zip")
        .with_param("downloadReferer", "line\nbreak");
    let links = GeneratorRegistry::with_defaults().generate_all(&info);

    assert_eq!(links.len(), ClientLinkType::ALL.len() - 1);
    assert!(links.get(ClientLinkType::Fdm).is_none());
    assert_eq!(links.failures.len(), 1);
    assert_eq!(links.failures[0].link_type(), ClientLinkType::Fdm);
}

struct Aria2Rpc;

impl ClientLinkGenerator for Aria2Rpc {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::Aria2
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let headers: &DownloadHeaders = meta.headers();
        Ok(Some(format!("aria2.addUri {} ({} headers)", meta.url(), headers.len())))
    }
}

#[test]
fn test_custom_generator_replaces_builtin() {
    let registry = GeneratorRegistry::with_defaults();
    let previous = registry.register(Arc::new(Aria2Rpc));
    assert!(previous.is_some());

    let info = share().with_param("downloadUrl", "https://cdn.example.com/a");
    assert_eq!(
        registry.generate(&info, ClientLinkType::Aria2).unwrap().as_deref(),
        Some("aria2.addUri https://cdn.example.com/a (0 headers)")
    );
}

#[test]
fn test_unregistered_type_generates_nothing() {
    let registry = GeneratorRegistry::with_defaults();
    registry.unregister(ClientLinkType::PowerShell);
    let info = share().with_param("downloadUrl", "https://cdn.example.com/a");

    assert_eq!(registry.generate(&info, ClientLinkType::PowerShell).unwrap(), None);
    let links = registry.generate_all(&info);
    assert_eq!(links.len(), 8);
    assert!(!registry.is_registered(ClientLinkType::PowerShell));
}
