//! Canonical request model shared by resolvers, scripts and link generators.
//!
//! - [`ShareLinkInfo`] - one identified share link plus the open parameter bag
//!   resolvers write into
//! - [`FileInfo`] - file metadata a resolver may attach or a script may list

mod file_info;
mod share_link;

pub use file_info::FileInfo;
pub use share_link::ShareLinkInfo;

/// Well-known keys inside [`ShareLinkInfo::other_params`].
pub mod keys {
    /// Direct download URL recorded after a successful resolution.
    pub const DOWNLOAD_URL: &str = "downloadUrl";
    /// String map of request headers the download must carry.
    pub const DOWNLOAD_HEADERS: &str = "downloadHeaders";
    /// Referer the download must carry.
    pub const DOWNLOAD_REFERER: &str = "downloadReferer";
    /// Serialized [`FileInfo`](super::FileInfo) object.
    pub const FILE_INFO: &str = "fileInfo";
    /// Object identifying one file of a folder share for by-id resolution.
    pub const PARAM_JSON: &str = "paramJson";

    /// Alternate direct-URL keys some resolvers write, in lookup priority order.
    pub const FALLBACK_URL_KEYS: [&str; 7] = [
        "directLink",
        "url",
        "link",
        "download_link",
        "direct_link",
        "fileUrl",
        "file_url",
    ];
}
