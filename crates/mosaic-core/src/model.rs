//! Core data structures for the synthesis pipeline

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::paths::normalize_relative;

/// Stable identifier of a file inside an `ImportGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct FileId(pub u32);

/// Language tag of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    // ── Scanned for imports ─────────────────────────────────
    Python,
    JavaScript,
    TypeScript,
    C,
    Cpp,

    // ── Code without a scanner (imports must be supplied) ───
    Rust,
    Go,
    Java,

    // ── Data files, never carry imports ─────────────────────
    Markdown,
    Json,
    Toml,
    Yaml,

    // ── Fallback ────────────────────────────────────────────
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => Language::Python,
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Language::JavaScript,
            Some("ts") | Some("tsx") | Some("mts") | Some("cts") => Language::TypeScript,
            Some("c") | Some("h") => Language::C,
            Some("cpp") | Some("cc") | Some("cxx") | Some("hpp") | Some("hh") => Language::Cpp,
            Some("rs") => Language::Rust,
            Some("go") => Language::Go,
            Some("java") => Language::Java,
            Some("md") | Some("mdx") => Language::Markdown,
            Some("json") | Some("jsonc") => Language::Json,
            Some("toml") => Language::Toml,
            Some("yml") | Some("yaml") => Language::Yaml,
            _ => Language::Other,
        }
    }

    /// Whether files in this language can reference other files at all.
    pub fn is_code(&self) -> bool {
        !matches!(
            self,
            Language::Markdown | Language::Json | Language::Toml | Language::Yaml | Language::Other
        )
    }
}

/// How an import specifier is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStyle {
    /// `./x`, `../x`: resolved against the importing file's directory.
    Relative,
    /// `/x`: resolved against the tree root.
    RootAbsolute,
    /// `x/y`: language decides between the tree root and an external package.
    Bare,
}

/// One tokenized import statement target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRef {
    /// Text as written in the file. Empty when the reference cannot be rewritten in place.
    pub raw: String,
    /// Slash-separated specifier, e.g. `../core/db` or `numpy/linalg`.
    pub specifier: String,
    pub style: ImportStyle,
    /// 1-based line of the statement, when known.
    pub line: Option<u32>,
    /// A guess that only counts when it resolves inside the tree
    /// (e.g. `from pkg import name` where `name` may be a submodule).
    #[serde(default)]
    pub speculative: bool,
    /// The written text is also a name the file body uses (`import a.b`
    /// binds `a.b`), so changing it would break the file.
    #[serde(default)]
    pub name_bound: bool,
}

impl ImportRef {
    pub fn new(raw: impl Into<String>, specifier: impl Into<String>, line: Option<u32>) -> Self {
        let specifier = specifier.into();
        let style = if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            ImportStyle::Relative
        } else if specifier.starts_with('/') {
            ImportStyle::RootAbsolute
        } else {
            ImportStyle::Bare
        };
        ImportRef {
            raw: raw.into(),
            specifier,
            style,
            line,
            speculative: false,
            name_bound: false,
        }
    }

    pub fn speculative(mut self) -> Self {
        self.speculative = true;
        self
    }

    pub fn name_bound(mut self) -> Self {
        self.name_bound = true;
        self
    }
}

/// A file of the source tree, as delivered by the upstream fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the tree root.
    pub path: PathBuf,
    pub language: Language,
    pub content: Vec<u8>,
    /// Pre-tokenized imports. `None` means the builder scans `content` itself.
    pub imports: Option<Vec<ImportRef>>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let raw: PathBuf = path.into();
        let path = normalize_relative(&raw).unwrap_or(raw);
        let language = Language::from_path(&path);
        SourceFile {
            path,
            language,
            content: content.into(),
            imports: None,
        }
    }

    pub fn with_imports(mut self, imports: Vec<ImportRef>) -> Self {
        self.imports = Some(imports);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Content as UTF-8, if it is valid.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// The normalized input tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTree {
    pub files: Vec<SourceFile>,
}

impl SourceTree {
    pub fn new(files: Vec<SourceFile>) -> Self {
        SourceTree { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Where an import edge points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeTarget {
    Internal(FileId),
    External(String),
}

/// Directory an internal import was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// The importing file's directory.
    Directory,
    /// The tree root.
    Root,
}

/// How an internal edge was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub anchor: Anchor,
    /// What was appended to the specifier to reach the target file
    /// (`""`, `".py"`, `"/index.js"`, ...).
    pub suffix: String,
}

/// A directed edge of the import graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    pub source: FileId,
    pub target: EdgeTarget,
    pub import: ImportRef,
    /// Set for internal edges only.
    pub resolution: Option<Resolution>,
}

impl ImportEdge {
    pub fn internal_target(&self) -> Option<FileId> {
        match self.target {
            EdgeTarget::Internal(id) => Some(id),
            EdgeTarget::External(_) => None,
        }
    }

    pub fn external_package(&self) -> Option<&str> {
        match &self.target {
            EdgeTarget::External(name) => Some(name),
            EdgeTarget::Internal(_) => None,
        }
    }
}
