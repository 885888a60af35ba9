//! Import graph construction
//!
//! A single pass over every file's import references: each reference is
//! resolved to a file of the tree or, failing that, to an external package.
//! Nothing is traversed here, so import cycles are simply stored.

use crate::languages::{BareLookup, LanguageSupport, support_for};
use mosaic_core::paths::{join_specifier, parent_dir};
use mosaic_core::{
    Anchor, EdgeTarget, FileId, ImportEdge, ImportGraph, ImportRef, ImportStyle, SourceFile,
    SourceTree, Warning, WarningKind,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of building an import graph.
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: ImportGraph,
    pub warnings: Vec<Warning>,
}

/// Why a file contributed no edges.
enum Skip {
    NoScanner,
    NotUtf8,
}

/// Build the import graph for a whole tree.
pub fn build_tree(tree: &SourceTree) -> BuildOutput {
    build(tree.files.clone())
}

/// Build the import graph from a list of files. Best effort: problems become warnings.
pub fn build(files: Vec<SourceFile>) -> BuildOutput {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(files.len());
    for file in files {
        if seen.insert(file.path.clone()) {
            unique.push(file);
        } else {
            warnings.push(
                Warning::new(
                    WarningKind::DuplicateFile,
                    file.path.display().to_string(),
                    "path appears more than once in the tree; keeping the first copy",
                )
                .logged(),
            );
        }
    }

    // Tokenizing is the expensive part; collect keeps input order.
    let tokenized: Vec<Result<Vec<ImportRef>, Skip>> = unique.par_iter().map(tokenize).collect();

    let mut graph = ImportGraph::new();
    let ids: Vec<FileId> = unique.iter().map(|file| graph.add_file(file.clone())).collect();
    let directories = code_directories(&unique);

    for ((file, id), imports) in unique.iter().zip(ids).zip(tokenized) {
        let imports = match imports {
            Ok(imports) => imports,
            Err(reason) => {
                let message = match reason {
                    Skip::NoScanner => format!(
                        "no import scanner for {:?} and no pre-tokenized imports; imports skipped",
                        file.language
                    ),
                    Skip::NotUtf8 => "content is not valid UTF-8; imports skipped".to_string(),
                };
                warnings.push(
                    Warning::new(WarningKind::UnparseableFile, file.path.display().to_string(), message)
                        .logged(),
                );
                continue;
            }
        };

        let support = support_for(file.language);
        for import in imports {
            if let Some(edge) = resolve_import(&graph, &directories, support, file, id, import) {
                graph.add_edge(edge);
            }
        }
    }

    info!(
        "Built import graph: {} files, {} edges, {} external packages",
        graph.file_count(),
        graph.edge_count(),
        graph.external_packages().count()
    );

    BuildOutput { graph, warnings }
}

fn tokenize(file: &SourceFile) -> Result<Vec<ImportRef>, Skip> {
    if let Some(imports) = &file.imports {
        return Ok(imports.clone());
    }
    if !file.language.is_code() {
        return Ok(Vec::new());
    }
    let support = support_for(file.language);
    let text = file.text().ok_or(Skip::NotUtf8)?;
    support.scan(text).ok_or(Skip::NoScanner)
}

/// Every directory that holds a code file, at any depth.
fn code_directories(files: &[SourceFile]) -> HashSet<PathBuf> {
    files
        .iter()
        .filter(|file| file.language.is_code())
        .flat_map(|file| file.path.ancestors().skip(1))
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect()
}

/// Turn one reference into an edge, or nothing for builtins and unresolved guesses.
fn resolve_import(
    graph: &ImportGraph,
    directories: &HashSet<PathBuf>,
    support: &dyn LanguageSupport,
    file: &SourceFile,
    source: FileId,
    import: ImportRef,
) -> Option<ImportEdge> {
    let dir = parent_dir(&file.path);
    let specifier = import.specifier.clone();

    let found = match import.style {
        ImportStyle::Relative => probe(graph, support, &dir, &specifier, Anchor::Directory),
        ImportStyle::RootAbsolute => probe(
            graph,
            support,
            Path::new(""),
            specifier.trim_start_matches('/'),
            Anchor::Root,
        ),
        ImportStyle::Bare => match support.bare_lookup() {
            BareLookup::RootThenExternal => probe(graph, support, Path::new(""), &specifier, Anchor::Root),
            BareLookup::DirectoryThenRoot => probe(graph, support, &dir, &specifier, Anchor::Directory)
                .or_else(|| probe(graph, support, Path::new(""), &specifier, Anchor::Root)),
            BareLookup::External => None,
        },
    };

    if let Some((target, resolution)) = found {
        if target == source {
            debug!("{}: self import {:?} ignored", file.path.display(), specifier);
            return None;
        }
        debug!("{}: {:?} -> internal {:?}", file.path.display(), specifier, target);
        return Some(ImportEdge {
            source,
            target: EdgeTarget::Internal(target),
            import,
            resolution: Some(resolution),
        });
    }

    if import.speculative || support.is_builtin(&import) {
        return None;
    }
    // A package directory without an index file still belongs to the tree
    if import.style == ImportStyle::Bare
        && support.bare_lookup() == BareLookup::RootThenExternal
        && directories.contains(Path::new(&specifier))
    {
        debug!("{}: {:?} names a tree directory, no edge", file.path.display(), specifier);
        return None;
    }

    let package = support.package_name(&import);
    if package.is_empty() || package == "." || package == ".." {
        debug!("{}: unresolvable reference {:?} dropped", file.path.display(), specifier);
        return None;
    }
    debug!("{}: {:?} -> external {}", file.path.display(), specifier, package);
    Some(ImportEdge {
        source,
        target: EdgeTarget::External(package),
        import,
        resolution: None,
    })
}

/// Try every suffix of the language against `base` joined with `specifier`.
fn probe(
    graph: &ImportGraph,
    support: &dyn LanguageSupport,
    base: &Path,
    specifier: &str,
    anchor: Anchor,
) -> Option<(FileId, mosaic_core::Resolution)> {
    let joined = join_specifier(base, specifier)?;
    // `.` and `..` name a directory: only index-file suffixes apply
    let names_directory = matches!(specifier.rsplit('/').next(), Some(".") | Some("..") | Some(""));

    for suffix in support.suffixes() {
        if names_directory && !suffix.starts_with('/') {
            continue;
        }
        let Some(candidate) = apply_suffix(&joined, suffix) else {
            continue;
        };
        if let Some(id) = graph.file_id(&candidate) {
            return Some((
                id,
                mosaic_core::Resolution {
                    anchor,
                    suffix: suffix.to_string(),
                },
            ));
        }
    }
    None
}

fn apply_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    if suffix.is_empty() {
        return (!path.as_os_str().is_empty()).then(|| path.to_path_buf());
    }
    if let Some(index) = suffix.strip_prefix('/') {
        return Some(path.join(index));
    }
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!("{name}{suffix}")))
}
