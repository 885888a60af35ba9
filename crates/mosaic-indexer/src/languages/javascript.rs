//! JavaScript / TypeScript import scanning and rendering

use super::{BareLookup, LanguageSupport, line_of, mask};
use mosaic_core::{Anchor, ImportRef, ImportStyle};
use regex::Regex;
use std::sync::LazyLock;

/// `import x from '...'`, `import type {..} from "..."`, `export * from '...'`
static FROM_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^\w$.])(?:import|export)\s+(?:type\s+)?[^'";]*?\bfrom\s*['"]([^'"\n]+)['"]"#)
        .expect("valid regex")
});

/// `import '...'`
static SIDE_EFFECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[;\s])import\s*['"]([^'"\n]+)['"]"#).expect("valid regex")
});

/// `require('...')`, `import('...')`
static CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^\w$.])(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#)
        .expect("valid regex")
});

const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net", "os",
    "path", "process", "stream", "url", "util", "zlib",
];

pub struct JavaScriptSupport;

impl LanguageSupport for JavaScriptSupport {
    fn scan(&self, source: &str) -> Option<Vec<ImportRef>> {
        let masked = mask::c_like(source, &["from", "import"]);
        let mut found: Vec<(usize, ImportRef)> = Vec::new();
        for regex in [&*FROM_CLAUSE, &*SIDE_EFFECT, &*CALL] {
            for caps in regex.captures_iter(&masked) {
                let Some(specifier) = caps.get(1) else {
                    continue;
                };
                let line = Some(line_of(&masked, specifier.start()));
                found.push((
                    specifier.start(),
                    ImportRef::new(specifier.as_str(), specifier.as_str(), line),
                ));
            }
        }
        found.sort_by_key(|(offset, _)| *offset);
        found.dedup_by_key(|(offset, _)| *offset);
        Some(found.into_iter().map(|(_, import)| import).collect())
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[
            "", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", "/index.ts", "/index.tsx",
            "/index.js", "/index.jsx",
        ]
    }

    fn bare_lookup(&self) -> BareLookup {
        BareLookup::External
    }

    fn is_builtin(&self, import: &ImportRef) -> bool {
        import.specifier.starts_with("node:")
            || NODE_BUILTINS.contains(&super::leading_segment(&import.specifier).as_str())
    }

    fn package_name(&self, import: &ImportRef) -> String {
        let mut segments = import.specifier.split('/');
        match (segments.next(), segments.next()) {
            (Some(scope), Some(name)) if scope.starts_with('@') => format!("{scope}/{name}"),
            _ => super::leading_segment(&import.specifier),
        }
    }

    fn render(&self, import: &ImportRef, anchor: Anchor, path: &str) -> Option<String> {
        match anchor {
            Anchor::Directory => Some(path.to_string()),
            Anchor::Root if import.style == ImportStyle::RootAbsolute => Some(format!("/{path}")),
            Anchor::Root => None,
        }
    }
}
