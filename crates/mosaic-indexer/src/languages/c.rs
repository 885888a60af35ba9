//! C / C++ quoted include scanning

use super::{BareLookup, LanguageSupport, line_of, mask};
use mosaic_core::{Anchor, ImportRef};
use regex::Regex;
use std::sync::LazyLock;

// Angle-bracket includes are system headers and never edges.
static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*"([^"\n]+)""#).expect("valid regex")
});

pub struct CSupport;

impl LanguageSupport for CSupport {
    fn scan(&self, source: &str) -> Option<Vec<ImportRef>> {
        let masked = mask::c_like(source, &["include"]);
        Some(
            INCLUDE
                .captures_iter(&masked)
                .filter_map(|caps| caps.get(1))
                .map(|m| ImportRef::new(m.as_str(), m.as_str(), Some(line_of(&masked, m.start()))))
                .collect(),
        )
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[""]
    }

    fn bare_lookup(&self) -> BareLookup {
        BareLookup::DirectoryThenRoot
    }

    fn render(&self, _import: &ImportRef, anchor: Anchor, path: &str) -> Option<String> {
        match anchor {
            Anchor::Directory => Some(path.strip_prefix("./").unwrap_or(path).to_string()),
            Anchor::Root => Some(path.to_string()),
        }
    }
}
