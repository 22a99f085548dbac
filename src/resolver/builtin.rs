//! Closed catalog of built-in share providers.
//!
//! Built-in tags are reserved: custom parsers may not register them. The scraping
//! logic for each provider is supplied by the host through
//! [`LinkPipeline::install_builtin`](crate::pipeline::LinkPipeline::install_builtin).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::ShareMatch;
use super::utils::{
    build_share_link, build_share_link_from_key, capture_share_match, compile_static_regex,
};
use crate::model::ShareLinkInfo;

/// Built-in providers, in identification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinProvider {
    Lz,
    Fj,
    Le,
    Fc,
    Iz,
    Qq,
    Ws,
    Ye,
    Ec,
    Cow,
    Ce,
}

static PATTERNS: LazyLock<[Regex; 11]> =
    LazyLock::new(|| BuiltinProvider::ALL.map(|provider| compile_static_regex(provider.pattern())));

impl BuiltinProvider {
    /// Every provider in identification order.
    pub const ALL: [Self; 11] = [
        Self::Lz,
        Self::Fj,
        Self::Le,
        Self::Fc,
        Self::Iz,
        Self::Qq,
        Self::Ws,
        Self::Ye,
        Self::Ec,
        Self::Cow,
        Self::Ce,
    ];

    /// Lower-case type tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Lz => "lz",
            Self::Fj => "fj",
            Self::Le => "le",
            Self::Fc => "fc",
            Self::Iz => "iz",
            Self::Qq => "qq",
            Self::Ws => "ws",
            Self::Ye => "ye",
            Self::Ec => "ec",
            Self::Cow => "cow",
            Self::Ce => "ce",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Lz => "蓝奏云",
            Self::Fj => "小飞机网盘",
            Self::Le => "联想乐云",
            Self::Fc => "亿方云",
            Self::Iz => "蓝奏云优享",
            Self::Qq => "QQ邮箱中转站",
            Self::Ws => "文叔叔",
            Self::Ye => "123网盘",
            Self::Ec => "移动云空间",
            Self::Cow => "奶牛快传",
            Self::Ce => "huang1111",
        }
    }

    /// Anchored share-URL pattern with a `KEY` group.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Lz => r"^https://(?:[a-z]+)?\.?lanzou[a-z]\.com/(?:.+/)?(?P<KEY>[^/]+)$",
            Self::Fj => r"^https://(?:share\.feijipan\.com|www\.feijix\.com)/s/(?P<KEY>.+)$",
            Self::Le => r"^https://lecloud?\.lenovo\.com/share/(?P<KEY>.+)$",
            Self::Fc => r"^https://v2\.fangcloud\.(?:com|cn)/(?:s|sharing)/(?P<KEY>[^/]+)$",
            Self::Iz => r"^https://www\.ilanzou\.com/s/(?P<KEY>.+)$",
            Self::Qq => r"^https://i?wx\.mail\.qq\.com/ftn/download\?(?P<KEY>.+)$",
            Self::Ws => r"^https://(?:f\.ws59\.cn|www\.wenshushu\.cn)/f/(?P<KEY>.+)$",
            Self::Ye => r"^https://www\.123pan\.com/s/(?P<KEY>.+)\.html$",
            Self::Ec => {
                r"^https://www\.ecpan\.cn/web(?:/%23|/#)?/yunpanProxy\?path=.*&data=(?P<KEY>[^&]+)&isShare=1$"
            }
            Self::Cow => r"^https://(?:.*)cowtransfer\.com/s/(?P<KEY>.+)$",
            Self::Ce => r"^https://pan\.huang1111\.cn/s/(?P<KEY>.+)$",
        }
    }

    /// Standard URL template with `{shareKey}` placeholder.
    #[must_use]
    pub const fn standard_url_template(self) -> &'static str {
        match self {
            Self::Lz => "https://lanzoux.com/{shareKey}",
            Self::Fj => "https://www.feijix.com/s/{shareKey}",
            Self::Le => "https://lecloud.lenovo.com/share/{shareKey}",
            Self::Fc => "https://v2.fangcloud.com/s/{shareKey}",
            Self::Iz => "https://www.ilanzou.com/s/{shareKey}",
            Self::Qq => "https://iwx.mail.qq.com/ftn/download/{shareKey}",
            Self::Ws => "https://f.ws59.cn/f/{shareKey}",
            Self::Ye => "https://www.123pan.com/s/{shareKey}.html",
            Self::Ec => {
                "https://www.ecpan.cn/web/#/yunpanProxy?path=%2F%23%2Fdrive%2Foutside&data={shareKey}&isShare=1"
            }
            Self::Cow => "https://cowtransfer.com/s/{shareKey}",
            Self::Ce => "https://pan.huang1111.cn/s/{shareKey}",
        }
    }

    /// Looks a provider up by tag, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|provider| provider.tag().eq_ignore_ascii_case(tag))
    }

    fn regex(self) -> &'static Regex {
        &PATTERNS[self as usize]
    }

    /// Extracts the share key and password if `url` belongs to this provider.
    #[must_use]
    pub fn identify(self, url: &str) -> Option<ShareMatch> {
        capture_share_match(self.regex(), url.trim())
    }

    /// Finds the first provider whose pattern matches `url`.
    #[must_use]
    pub fn detect(url: &str) -> Option<(Self, ShareMatch)> {
        Self::ALL
            .into_iter()
            .find_map(|provider| provider.identify(url).map(|share| (provider, share)))
    }

    /// Builds the canonical link for a share URL this provider identified.
    #[must_use]
    pub fn share_link_info(self, share_url: &str, share: &ShareMatch) -> ShareLinkInfo {
        build_share_link(
            self.tag(),
            self.display_name(),
            share_url.trim(),
            Some(self.standard_url_template()),
            share,
        )
    }

    /// Builds the canonical link from a share key alone.
    #[must_use]
    pub fn share_link_from_key(self, share: &ShareMatch) -> ShareLinkInfo {
        build_share_link_from_key(
            self.tag(),
            self.display_name(),
            Some(self.standard_url_template()),
            share,
        )
    }
}

impl fmt::Display for BuiltinProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::utils::has_key_group;

    #[test]
    fn test_every_pattern_compiles_with_key_group() {
        for provider in BuiltinProvider::ALL {
            assert!(has_key_group(provider.regex()), "{provider} lacks KEY");
            assert!(provider.standard_url_template().contains("{shareKey}"));
        }
    }

    #[test]
    fn test_all_order_matches_discriminants() {
        for (index, provider) in BuiltinProvider::ALL.into_iter().enumerate() {
            assert_eq!(provider as usize, index);
        }
    }

    #[test]
    fn test_from_tag_is_case_insensitive() {
        assert_eq!(BuiltinProvider::from_tag("LZ"), Some(BuiltinProvider::Lz));
        assert_eq!(BuiltinProvider::from_tag(" cow "), Some(BuiltinProvider::Cow));
        assert_eq!(BuiltinProvider::from_tag("demo"), None);
    }

    #[test]
    fn test_detect_lanzou_subdomain() {
        let (provider, share) = BuiltinProvider::detect("https://wwx.lanzoui.com/iAbc123").unwrap();
        assert_eq!(provider, BuiltinProvider::Lz);
        assert_eq!(share.share_key, "iAbc123");
    }

    #[test]
    fn test_detect_123pan_strips_html_suffix() {
        let (provider, share) =
            BuiltinProvider::detect("https://www.123pan.com/s/abc-Def.html").unwrap();
        assert_eq!(provider, BuiltinProvider::Ye);
        assert_eq!(share.share_key, "abc-Def");
    }

    #[test]
    fn test_detect_ecpan_data_parameter() {
        let url = "https://www.ecpan.cn/web/#/yunpanProxy?path=%2F%23%2Fdrive%2Foutside&data=4b3d7a&isShare=1";
        let (provider, share) = BuiltinProvider::detect(url).unwrap();
        assert_eq!(provider, BuiltinProvider::Ec);
        assert_eq!(share.share_key, "4b3d7a");
    }

    #[test]
    fn test_detect_unknown_host_is_none() {
        assert!(BuiltinProvider::detect("https://example.com/s/abc").is_none());
    }

    #[test]
    fn test_share_link_info_uses_standard_template() {
        let (provider, share) =
            BuiltinProvider::detect("https://share.feijipan.com/s/xYz").unwrap();
        let info = provider.share_link_info("https://share.feijipan.com/s/xYz", &share);
        assert_eq!(info.parser_type(), "fj");
        assert_eq!(info.share_key(), "xYz");
        assert_eq!(info.standard_url(), "https://www.feijix.com/s/xYz");
        assert_eq!(info.provider_name(), "小飞机网盘");
        assert_eq!(info.share_url(), "https://share.feijipan.com/s/xYz");
    }
}
