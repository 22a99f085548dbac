use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Metadata about one shared file.
///
/// Every field is optional because providers expose wildly different subsets.
/// Fields of an unexpected JSON type are dropped rather than rejecting the
/// whole object: numbers are accepted as numeric strings or floats, and text
/// fields accept bare numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileInfo {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub file_id: Option<String>,
    /// `"file"` or `"folder"` for providers that list directories.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub file_type: Option<String>,
    /// Size in bytes.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub size: Option<u64>,
    /// Size as the provider formats it, e.g. `"1.2 MB"`.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub size_str: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub update_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub create_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub download_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub file_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub pan_type: Option<String>,
    /// Share URL that resolves this entry on its own.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub parser_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub preview_url: Option<String>,
}

impl FileInfo {
    /// Returns the file name when present and non-blank.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_u64().or_else(|| whole_number(number.as_f64()?)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| whole_number(text.parse::<f64>().ok()?))
        }
        _ => None,
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn whole_number(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0 && value < u64::MAX as f64).then(|| value.trunc() as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_partial_camel_case_object() {
        let info: FileInfo = serde_json::from_value(json!({
            "fileName": "report.pdf",
            "size": 2048,
            "downloadCount": 7
        }))
        .unwrap();
        assert_eq!(info.display_name(), Some("report.pdf"));
        assert_eq!(info.size, Some(2048));
        assert_eq!(info.download_count, Some(7));
        assert!(info.file_id.is_none());
    }

    #[test]
    fn test_blank_file_name_has_no_display_name() {
        let info = FileInfo {
            file_name: Some("  ".into()),
            ..FileInfo::default()
        };
        assert_eq!(info.display_name(), None);
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let info = FileInfo {
            file_name: Some("a.zip".into()),
            ..FileInfo::default()
        };
        assert_eq!(serde_json::to_value(&info).unwrap(), json!({"fileName": "a.zip"}));
    }

    #[test]
    fn test_size_accepts_numeric_strings_and_floats() {
        let info: FileInfo = serde_json::from_value(json!({
            "fileName": "report.pdf",
            "size": "1024",
            "downloadCount": 3.0
        }))
        .unwrap();
        assert_eq!(info.size, Some(1024));
        assert_eq!(info.download_count, Some(3));

        let info: FileInfo =
            serde_json::from_value(json!({ "fileName": "a.zip", "size": 1.5e6 })).unwrap();
        assert_eq!(info.size, Some(1_500_000));
    }

    #[test]
    fn test_mistyped_fields_are_dropped_not_fatal() {
        let info: FileInfo = serde_json::from_value(json!({
            "fileName": "a.zip",
            "fileId": 42,
            "size": "1.2 MB",
            "downloadCount": -1,
            "createTime": { "seconds": 1 },
            "parserUrl": null
        }))
        .unwrap();
        assert_eq!(info.display_name(), Some("a.zip"));
        assert_eq!(info.file_id.as_deref(), Some("42"));
        assert!(info.size.is_none());
        assert!(info.download_count.is_none());
        assert!(info.create_time.is_none());
        assert!(info.parser_url.is_none());
    }
}
