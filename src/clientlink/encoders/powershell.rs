//! PowerShell `Invoke-WebRequest` script.

use crate::clientlink::{ClientLinkGenerator, ClientLinkType, DownloadLinkMeta, GenerationError};

pub struct PowerShellGenerator;

impl ClientLinkGenerator for PowerShellGenerator {
    fn link_type(&self) -> ClientLinkType {
        ClientLinkType::PowerShell
    }

    fn generate(&self, meta: &DownloadLinkMeta) -> Result<Option<String>, GenerationError> {
        let mut lines = vec![
            "$session = New-Object Microsoft.PowerShell.Commands.WebRequestSession".to_string(),
        ];
        if !meta.user_agent().trim().is_empty() {
            lines.push(format!("$session.UserAgent = {}", quote(meta.user_agent())));
        }

        let mut params = vec![
            "Invoke-WebRequest".to_string(),
            "-UseBasicParsing".to_string(),
            format!("-Uri {}", quote(meta.url())),
            "-WebSession $session".to_string(),
        ];

        // User-Agent travels on the session; the header table rejects it.
        let entries: Vec<String> = meta
            .headers()
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("User-Agent"))
            .map(|(name, value)| format!("    {} = {}", quote(name), quote(value)))
            .collect();
        if !entries.is_empty() {
            params.push(format!("-Headers @{{\n{}\n  }}", entries.join("\n")));
        }
        if let Some(file_name) = meta.file_name() {
            params.push(format!("-OutFile {}", quote(file_name)));
        }

        lines.push(params.join(" `\n  "));
        Ok(Some(lines.join("\n")))
    }
}

/// Double-quoted PowerShell string with backtick, `"` and `$` escaped by a backtick.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '`' | '"' | '$') {
            quoted.push('`');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_with_backtick() {
        assert_eq!(quote(r#"a`b"c$d"#), r#""a``b`"c`$d""#);
    }

    #[test]
    fn test_script_layout() {
        let meta = DownloadLinkMeta::new("https://cdn.example.com/a?x=$y")
            .with_header("Cookie", "sid=\"1\"")
            .with_header("User-Agent", "UA/1")
            .with_user_agent("UA/1")
            .with_file_name("a.zip");
        let out = PowerShellGenerator.generate(&meta).unwrap().unwrap();
        assert_eq!(
            out,
            "$session = New-Object Microsoft.PowerShell.Commands.WebRequestSession\n\
             $session.UserAgent = \"UA/1\"\n\
             Invoke-WebRequest `\n  \
             -UseBasicParsing `\n  \
             -Uri \"https://cdn.example.com/a?x=`$y\" `\n  \
             -WebSession $session `\n  \
             -Headers @{\n    \"Cookie\" = \"sid=`\"1`\"\"\n  } `\n  \
             -OutFile \"a.zip\""
        );
    }

    #[test]
    fn test_no_headers_block_when_only_user_agent() {
        let meta = DownloadLinkMeta::new("https://cdn.example.com/a").with_header("user-agent", "UA/2");
        let out = PowerShellGenerator.generate(&meta).unwrap().unwrap();
        assert!(!out.contains("-Headers"));
        assert!(out.ends_with("-WebSession $session"));
    }
}
