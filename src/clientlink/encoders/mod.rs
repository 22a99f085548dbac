//! The built-in generators, one per [`ClientLinkType`](super::ClientLinkType).

mod command;
mod import;
mod powershell;
mod protocol;

pub use command::{Aria2Generator, CurlGenerator, WgetGenerator};
pub use import::{FdmGenerator, MotrixGenerator};
pub use powershell::PowerShellGenerator;
pub use protocol::{BitCometGenerator, IdmGenerator, ThunderGenerator};

use std::sync::Arc;

use super::ClientLinkGenerator;

/// One instance of every built-in generator, in canonical order.
#[must_use]
pub fn default_generators() -> Vec<Arc<dyn ClientLinkGenerator>> {
    vec![
        Arc::new(Aria2Generator),
        Arc::new(MotrixGenerator),
        Arc::new(BitCometGenerator),
        Arc::new(ThunderGenerator),
        Arc::new(WgetGenerator),
        Arc::new(CurlGenerator),
        Arc::new(IdmGenerator),
        Arc::new(FdmGenerator),
        Arc::new(PowerShellGenerator),
    ]
}

/// Wraps `value` in double quotes for a POSIX shell, escaping `\`, `"`, `$` and backtick.
pub(crate) fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clientlink::ClientLinkType;

    #[test]
    fn test_default_generators_cover_every_type_in_order() {
        let types: Vec<_> = default_generators()
            .iter()
            .map(|generator| generator.link_type())
            .collect();
        assert_eq!(types, ClientLinkType::ALL);
    }

    #[test]
    fn test_shell_quote_escapes_expansions() {
        assert_eq!(shell_quote("plain"), "\"plain\"");
        assert_eq!(shell_quote(r#"a"b$c`d\e"#), r#""a\"b\$c\`d\\e""#);
    }
}
