//! Import rewriting for files that changed place
//!
//! Only references whose meaning would change are touched: a directory
//! anchored reference when the relative offset between importer and target
//! moved, a root anchored one when the target itself moved.

use crate::languages::{replace_token, support_for};
use mosaic_core::paths::{parent_dir, relative_specifier, to_slash};
use mosaic_core::{Anchor, FileId, ImportEdge, ImportGraph, SourceFile, Warning, WarningKind};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rewritten content of one file.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub content: Vec<u8>,
    pub rewritten: usize,
    pub warnings: Vec<Warning>,
}

/// Rewrite the imports of `id` for the given destinations.
///
/// `destinations` must cover every internal target of `id`.
pub fn rewrite_file(
    graph: &ImportGraph,
    id: FileId,
    destinations: &BTreeMap<FileId, PathBuf>,
) -> RewriteOutcome {
    let Some(file) = graph.file(id) else {
        return RewriteOutcome {
            content: Vec::new(),
            rewritten: 0,
            warnings: Vec::new(),
        };
    };
    let unchanged = || RewriteOutcome {
        content: file.content.clone(),
        rewritten: 0,
        warnings: Vec::new(),
    };

    let Some(text) = file.text() else {
        return unchanged();
    };
    let Some(destination) = destinations.get(&id) else {
        return unchanged();
    };

    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut warnings = Vec::new();
    let mut done: HashSet<(Option<u32>, String)> = HashSet::new();
    let mut rewritten = 0;

    for edge in graph.edges_from(id) {
        let Some(new_path) = moved_reference(graph, file, destination, edge, destinations) else {
            continue;
        };
        let import = &edge.import;
        if import.raw.is_empty() {
            warnings.push(unrewritable(file, &import.specifier, "reference text is unknown"));
            continue;
        }
        if !done.insert((import.line, import.raw.clone())) {
            continue;
        }
        if import.name_bound {
            warnings.push(unrewritable(file, &import.raw, "the imported name is used by the file body"));
            continue;
        }
        if new_path.is_empty() {
            warnings.push(unrewritable(file, &import.raw, "target path cannot be expressed"));
            continue;
        }

        let support = support_for(file.language);
        let anchor = edge.resolution.as_ref().map_or(Anchor::Directory, |r| r.anchor);
        let Some(rendered) = support.render(import, anchor, &new_path) else {
            warnings.push(unrewritable(
                file,
                &import.raw,
                &format!("`{new_path}` cannot be written in this file's import syntax"),
            ));
            continue;
        };

        if replace_in_lines(&mut lines, import.line, &import.raw, &rendered) {
            debug!("{}: rewrote {:?} -> {:?}", file.path.display(), import.raw, rendered);
            rewritten += 1;
        } else {
            warnings.push(unrewritable(file, &import.raw, "reference text not found in the file"));
        }
    }

    if rewritten == 0 {
        return RewriteOutcome {
            warnings,
            ..unchanged()
        };
    }
    RewriteOutcome {
        content: lines.join("\n").into_bytes(),
        rewritten,
        warnings,
    }
}

/// New suffix-stripped path for a reference that no longer points at its target.
fn moved_reference(
    graph: &ImportGraph,
    file: &SourceFile,
    destination: &Path,
    edge: &ImportEdge,
    destinations: &BTreeMap<FileId, PathBuf>,
) -> Option<String> {
    let target_id = edge.internal_target()?;
    let resolution = edge.resolution.as_ref()?;
    let target = graph.file(target_id)?;
    let target_destination = destinations.get(&target_id)?;

    let new_path = match resolution.anchor {
        Anchor::Directory => {
            let before = relative_specifier(&parent_dir(&file.path), &target.path);
            let after = relative_specifier(&parent_dir(destination), target_destination);
            if before == after {
                return None;
            }
            after
        }
        Anchor::Root => {
            if &target.path == target_destination {
                return None;
            }
            to_slash(target_destination)
        }
    };

    // Empty when the suffix no longer fits the new path
    Some(
        new_path
            .strip_suffix(resolution.suffix.as_str())
            .unwrap_or_default()
            .to_string(),
    )
}

fn replace_in_lines(lines: &mut [String], line: Option<u32>, old: &str, new: &str) -> bool {
    let index = line.and_then(|l| (l as usize).checked_sub(1));
    match index {
        Some(index) => {
            let Some(current) = lines.get_mut(index) else {
                return false;
            };
            match replace_token(current, old, new) {
                Some(replaced) => {
                    *current = replaced;
                    true
                }
                None => false,
            }
        }
        None => {
            for current in lines.iter_mut() {
                if let Some(replaced) = replace_token(current, old, new) {
                    *current = replaced;
                    return true;
                }
            }
            false
        }
    }
}

fn unrewritable(file: &SourceFile, reference: &str, reason: &str) -> Warning {
    Warning::new(
        WarningKind::UnrewritableImport,
        file.path.display().to_string(),
        format!("import `{reference}` must change but was left as is: {reason}"),
    )
    .logged()
}
