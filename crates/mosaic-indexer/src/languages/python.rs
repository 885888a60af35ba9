//! Python import scanning and rendering

use super::{BareLookup, LanguageSupport, line_of, mask};
use mosaic_core::{Anchor, ImportRef};
use regex::Regex;
use std::sync::LazyLock;

static FROM_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*from[ \t]+(\.*[\w.]*)[ \t]+import[ \t]+(\([^)]*\)|[^\n#;]+)")
        .expect("valid regex")
});

static PLAIN_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([^\n#;]+)").expect("valid regex"));

/// Modules shipped with the interpreter; never reported as packages.
const STDLIB: &[&str] = &[
    "__future__", "abc", "argparse", "asyncio", "base64", "bisect", "collections", "contextlib",
    "copy", "csv", "dataclasses", "datetime", "decimal", "email", "enum", "fractions",
    "functools", "glob", "hashlib", "heapq", "http", "inspect", "io", "itertools", "json",
    "logging", "math", "operator", "os", "pathlib", "pickle", "queue", "random", "re", "shutil",
    "signal", "socket", "sqlite3", "statistics", "string", "struct", "subprocess", "sys",
    "tempfile", "textwrap", "threading", "time", "traceback", "types", "typing", "unittest",
    "urllib", "uuid", "warnings", "xml",
];

pub struct PythonSupport;

impl PythonSupport {
    /// `..a.b` -> `../a/b`, `.` -> `.`, `a.b` -> `a/b`.
    fn module_to_specifier(module: &str) -> String {
        let dots = module.chars().take_while(|c| *c == '.').count();
        let rest = module[dots..].replace('.', "/");
        if dots == 0 {
            return rest;
        }
        let mut prefix = if dots == 1 {
            ".".to_string()
        } else {
            vec![".."; dots - 1].join("/")
        };
        if !rest.is_empty() {
            prefix.push('/');
            prefix.push_str(&rest);
        }
        prefix
    }

    fn imported_names(names: &str) -> Vec<String> {
        names
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .filter_map(|item| item.split_whitespace().next())
            .filter(|name| is_identifier(name))
            .map(str::to_string)
            .collect()
    }

    /// Name of a `from <module> import <name>` submodule guess, whose raw
    /// text is the module and whose specifier is the module path plus the name.
    fn submodule_name(import: &ImportRef) -> Option<&str> {
        if !import.speculative || Self::module_to_specifier(&import.raw) == import.specifier {
            return None;
        }
        import.specifier.rsplit('/').next()
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

impl LanguageSupport for PythonSupport {
    fn scan(&self, source: &str) -> Option<Vec<ImportRef>> {
        let masked = mask::python(source);
        let mut found: Vec<(usize, ImportRef)> = Vec::new();

        for caps in FROM_IMPORT.captures_iter(&masked) {
            let (Some(module), Some(names)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if module.as_str().is_empty() {
                continue;
            }
            let line = Some(line_of(&masked, module.start()));
            let specifier = Self::module_to_specifier(module.as_str());
            let package_only = module.as_str().chars().all(|c| c == '.');

            let mut import = ImportRef::new(module.as_str(), specifier.clone(), line);
            if package_only {
                // `from . import x` only points at a file when the package has an __init__
                import = import.speculative();
            }
            found.push((module.start(), import));

            for name in Self::imported_names(names.as_str()) {
                let submodule = if specifier == "." {
                    format!("./{name}")
                } else {
                    format!("{specifier}/{name}")
                };
                found.push((
                    module.start(),
                    ImportRef::new(module.as_str(), submodule, line).speculative(),
                ));
            }
        }

        for caps in PLAIN_IMPORT.captures_iter(&masked) {
            let Some(list) = caps.get(1) else {
                continue;
            };
            let line = Some(line_of(&masked, list.start()));
            for item in list.as_str().split(',') {
                let mut words = item.split_whitespace();
                let Some(module) = words.next() else {
                    continue;
                };
                if !module.split('.').all(is_identifier) {
                    continue;
                }
                let mut import = ImportRef::new(module, Self::module_to_specifier(module), line);
                // Without an alias the dotted name is what the body refers to
                if words.next() != Some("as") {
                    import = import.name_bound();
                }
                found.push((list.start(), import));
            }
        }

        found.sort_by_key(|(offset, _)| *offset);
        Some(found.into_iter().map(|(_, import)| import).collect())
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[".py", "/__init__.py", ".pyi", "/__init__.pyi"]
    }

    fn bare_lookup(&self) -> BareLookup {
        BareLookup::RootThenExternal
    }

    fn is_builtin(&self, import: &ImportRef) -> bool {
        STDLIB.contains(&super::leading_segment(&import.specifier).as_str())
    }

    fn render(&self, import: &ImportRef, anchor: Anchor, path: &str) -> Option<String> {
        // A submodule is renamed through its parent: `from <parent> import <name>`
        let path = match Self::submodule_name(import) {
            Some(name) => match path.rsplit_once('/') {
                Some((parent, last)) if last == name => parent,
                _ => return None,
            },
            None => path,
        };
        let segments: Vec<&str> = path.split('/').collect();
        match anchor {
            Anchor::Directory => {
                let (dots, rest) = match segments.first() {
                    Some(&".") => (1, &segments[1..]),
                    _ => {
                        let ups = segments.iter().take_while(|s| **s == "..").count();
                        if ups == 0 {
                            return None;
                        }
                        (ups + 1, &segments[ups..])
                    }
                };
                if !rest.iter().all(|s| is_identifier(s)) {
                    return None;
                }
                Some(format!("{}{}", ".".repeat(dots), rest.join(".")))
            }
            Anchor::Root => {
                if segments.is_empty() || !segments.iter().all(|s| is_identifier(s)) {
                    return None;
                }
                Some(segments.join("."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(source: &str) -> Vec<(String, String, bool)> {
        PythonSupport
            .scan(source)
            .unwrap()
            .into_iter()
            .map(|i| (i.raw, i.specifier, i.speculative))
            .collect()
    }

    fn submodule(raw: &str, specifier: &str) -> ImportRef {
        ImportRef::new(raw, specifier, None).speculative()
    }

    #[test]
    fn test_scan_absolute_and_relative() {
        let found = specifiers(
            "import os, numpy.linalg as la\nfrom ..core.db import Session\nfrom . import models\n",
        );
        assert_eq!(
            found,
            vec![
                ("os".into(), "os".into(), false),
                ("numpy.linalg".into(), "numpy/linalg".into(), false),
                ("..core.db".into(), "../core/db".into(), false),
                ("..core.db".into(), "../core/db/Session".into(), true),
                (".".into(), ".".into(), true),
                (".".into(), "./models".into(), true),
            ]
        );
    }

    #[test]
    fn test_scan_parenthesized_names_and_lines() {
        let imports = PythonSupport
            .scan("\n\nfrom pkg.sub import (\n    a,\n    b as c,\n)\n")
            .unwrap();
        assert_eq!(imports[0].specifier, "pkg/sub");
        assert_eq!(imports[0].line, Some(3));
        let names: Vec<_> = imports[1..].iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(names, vec!["pkg/sub/a", "pkg/sub/b"]);
    }

    #[test]
    fn test_render() {
        let import = ImportRef::new("x", "x", None);
        assert_eq!(PythonSupport.render(&import, Anchor::Directory, "../core/db").as_deref(), Some("..core.db"));
        assert_eq!(PythonSupport.render(&import, Anchor::Directory, "./db").as_deref(), Some(".db"));
        assert_eq!(PythonSupport.render(&import, Anchor::Directory, "../..").as_deref(), Some("..."));
        assert_eq!(PythonSupport.render(&import, Anchor::Directory, ".").as_deref(), Some("."));
        assert_eq!(PythonSupport.render(&import, Anchor::Root, "core/db").as_deref(), Some("core.db"));
        assert_eq!(PythonSupport.render(&import, Anchor::Root, "my-pkg/db"), None);
    }

    #[test]
    fn test_render_submodule_through_parent() {
        let models = submodule(".", "./models");
        assert_eq!(PythonSupport.render(&models, Anchor::Directory, "./api/models").as_deref(), Some(".api"));
        assert_eq!(PythonSupport.render(&models, Anchor::Directory, "../models").as_deref(), Some(".."));
        assert_eq!(PythonSupport.render(&models, Anchor::Directory, "./api/other"), None);

        let db = submodule("core", "core/db");
        assert_eq!(PythonSupport.render(&db, Anchor::Root, "lib/core/db").as_deref(), Some("lib.core"));
        assert_eq!(PythonSupport.render(&db, Anchor::Root, "db"), None);
    }

    #[test]
    fn test_scan_ignores_strings_and_comments() {
        let source = "\"\"\"Usage:\n\nimport secretlib\nfrom core import db\n\"\"\"\n\
                      # import commented\n\
                      HELP = 'from fake import thing'\n\
                      import real\n";
        let found = specifiers(source);
        assert_eq!(found, vec![("real".into(), "real".into(), false)]);
        assert_eq!(PythonSupport.scan(source).unwrap()[0].line, Some(8));
    }

    #[test]
    fn test_plain_imports_bind_their_name() {
        let imports = PythonSupport.scan("import pkg.b\nimport numpy.linalg as la, os\n").unwrap();
        let bound: Vec<_> = imports.iter().map(|i| (i.raw.as_str(), i.name_bound)).collect();
        assert_eq!(bound, vec![("pkg.b", true), ("numpy.linalg", false), ("os", true)]);
    }

    #[test]
    fn test_stdlib_is_builtin() {
        assert!(PythonSupport.is_builtin(&ImportRef::new("os.path", "os/path", None)));
        assert!(!PythonSupport.is_builtin(&ImportRef::new("requests", "requests", None)));
    }
}
