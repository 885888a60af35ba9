//! Per-language import scanning, resolution rules and import rendering

pub mod c;
pub mod javascript;
pub mod mask;
pub mod python;

use mosaic_core::{Anchor, ImportRef, Language};

/// Where a bare specifier (`a/b`, neither relative nor rooted) is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BareLookup {
    /// Tree root first, external package otherwise (Python absolute imports).
    RootThenExternal,
    /// Importing file's directory, then tree root (C quoted includes).
    DirectoryThenRoot,
    /// Always an external package (JS bare specifiers).
    External,
}

/// Language-specific knowledge the builder and the rewriter need.
pub trait LanguageSupport: Send + Sync {
    /// Tokenize import statements. `None` when the language has no scanner.
    fn scan(&self, source: &str) -> Option<Vec<ImportRef>>;

    /// Appended to a joined specifier when probing for the target file, in order.
    fn suffixes(&self) -> &'static [&'static str];

    fn bare_lookup(&self) -> BareLookup;

    /// Runtime-provided modules; unresolved references to them are not edges.
    fn is_builtin(&self, _import: &ImportRef) -> bool {
        false
    }

    /// External package a non-resolving reference stands for.
    fn package_name(&self, import: &ImportRef) -> String {
        leading_segment(&import.specifier)
    }

    /// Render a new target path in source syntax.
    ///
    /// `path` is `./x` / `../x` for directory anchors and `a/b` for root anchors,
    /// already stripped of the resolution suffix.
    fn render(&self, import: &ImportRef, anchor: Anchor, path: &str) -> Option<String>;
}

/// Fallback for languages whose imports arrive pre-tokenized.
pub struct GenericSupport;

impl LanguageSupport for GenericSupport {
    fn scan(&self, _source: &str) -> Option<Vec<ImportRef>> {
        None
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &[""]
    }

    fn bare_lookup(&self) -> BareLookup {
        BareLookup::RootThenExternal
    }

    fn render(&self, import: &ImportRef, anchor: Anchor, path: &str) -> Option<String> {
        match (anchor, import.style) {
            (Anchor::Directory, _) => Some(path.to_string()),
            (Anchor::Root, mosaic_core::ImportStyle::RootAbsolute) => Some(format!("/{path}")),
            (Anchor::Root, _) => Some(path.to_string()),
        }
    }
}

static PYTHON: python::PythonSupport = python::PythonSupport;
static JAVASCRIPT: javascript::JavaScriptSupport = javascript::JavaScriptSupport;
static C_FAMILY: c::CSupport = c::CSupport;
static GENERIC: GenericSupport = GenericSupport;

/// Get the language support for a file's language.
pub fn support_for(language: Language) -> &'static dyn LanguageSupport {
    match language {
        Language::Python => &PYTHON,
        Language::JavaScript | Language::TypeScript => &JAVASCRIPT,
        Language::C | Language::Cpp => &C_FAMILY,
        _ => &GENERIC,
    }
}

/// First meaningful segment of a slash specifier (`../foo/bar` -> `foo`).
pub fn leading_segment(specifier: &str) -> String {
    specifier
        .split('/')
        .find(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(specifier)
        .to_string()
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(source: &str, offset: usize) -> u32 {
    source[..offset].bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | '@' | '$')
}

/// Replace the first whole-token occurrence of `old` in `line`.
pub fn replace_token(line: &str, old: &str, new: &str) -> Option<String> {
    if old.is_empty() {
        return None;
    }
    let mut from = 0;
    while let Some(pos) = line[from..].find(old) {
        let start = from + pos;
        let end = start + old.len();
        let before_ok = line[..start].chars().next_back().map_or(true, |c| !is_token_char(c));
        let after_ok = line[end..].chars().next().map_or(true, |c| !is_token_char(c));
        if before_ok && after_ok {
            let mut out = String::with_capacity(line.len() + new.len());
            out.push_str(&line[..start]);
            out.push_str(new);
            out.push_str(&line[end..]);
            return Some(out);
        }
        from = start + old.len().max(1);
    }
    None
}
