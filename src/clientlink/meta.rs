//! Download metadata extracted from a resolved share link.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::keys::{
    DOWNLOAD_HEADERS, DOWNLOAD_REFERER, DOWNLOAD_URL, FALLBACK_URL_KEYS, FILE_INFO,
};
use crate::model::ShareLinkInfo;
use crate::user_agent::DEFAULT_BROWSER_USER_AGENT;

const USER_AGENT: &str = "User-Agent";
const REFERER: &str = "Referer";

/// Request headers in insertion order. Lookups compare names case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadHeaders(Vec<(String, String)>);

impl DownloadHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, keeping the original position when the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Adds a header at the end without looking for an existing one.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First header with `name`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for DownloadHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DownloadHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Everything a download client needs to fetch the file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLinkMeta {
    url: String,
    headers: DownloadHeaders,
    referer: Option<String>,
    user_agent: String,
    file_name: Option<String>,
    ext_params: Map<String, Value>,
}

impl DownloadLinkMeta {
    /// Metadata for a bare URL with the default user agent.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: DownloadHeaders::new(),
            referer: None,
            user_agent: DEFAULT_BROWSER_USER_AGENT.to_string(),
            file_name: None,
            ext_params: Map::new(),
        }
    }

    /// Derives metadata from what resolution recorded in the parameter bag.
    ///
    /// The URL is taken from `downloadUrl`, then from the alternate URL keys,
    /// then from the share URL itself.
    #[must_use]
    pub fn from_share_link_info(info: &ShareLinkInfo) -> Self {
        let params = info.other_params();
        let url = std::iter::once(DOWNLOAD_URL)
            .chain(FALLBACK_URL_KEYS)
            .find_map(|key| non_empty_str(params.get(key)))
            .unwrap_or_else(|| info.share_url())
            .to_string();

        let mut headers = DownloadHeaders::new();
        if let Some(fields) = params.get(DOWNLOAD_HEADERS).and_then(Value::as_object) {
            for (name, value) in fields {
                if let Some(value) = value.as_str() {
                    headers.append(name.as_str(), value);
                }
            }
        }

        let referer = non_empty_str(params.get(DOWNLOAD_REFERER))
            .or_else(|| headers.get(REFERER).filter(|value| !value.is_empty()))
            .map(str::to_string);
        let user_agent = headers
            .get(USER_AGENT)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_BROWSER_USER_AGENT)
            .to_string();
        let file_name = params
            .get(FILE_INFO)
            .and_then(|file| non_empty_str(file.get("fileName")))
            .map(|name| name.trim().to_string());

        let ext_params = params
            .iter()
            .filter(|(key, _)| {
                ![DOWNLOAD_URL, DOWNLOAD_HEADERS, DOWNLOAD_REFERER, FILE_INFO].contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            url,
            headers,
            referer,
            user_agent,
            file_name,
            ext_params,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into()).filter(|name| !name.trim().is_empty());
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &DownloadHeaders {
        &self.headers
    }

    #[must_use]
    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    #[must_use]
    pub fn ext_params(&self) -> &Map<String, Value> {
        &self.ext_params
    }

    /// True when there is a URL to hand to a client.
    #[must_use]
    pub fn has_valid_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}
