//! Component extraction: seed matching, transitive closure, placement

use crate::error::{ExtractError, Result};
use crate::layout::{self, LayoutEntry};
use crate::pattern::SeedPattern;
use crate::rewrite::rewrite_file;
use mosaic_core::{FileId, ImportGraph, SynthesisConfig, Warning, WarningKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A component to extract: a name and the patterns selecting its seed files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRequest {
    pub name: String,
    pub seed_patterns: Vec<String>,
}

impl ComponentRequest {
    pub fn new(name: impl Into<String>, seed_patterns: &[&str]) -> Self {
        ComponentRequest {
            name: name.into(),
            seed_patterns: seed_patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ComponentStatus {
    Extracted,
    Assembled,
    Failed { reason: String },
}

/// A closure file and where it goes under the component root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub is_seed: bool,
    /// Content to write, imports already rewritten.
    #[serde(skip)]
    pub content: Vec<u8>,
    pub rewritten_imports: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub seed_patterns: Vec<String>,
    /// Sorted by source path.
    pub files: Vec<PlacedFile>,
    /// External packages referenced from the closure, sorted and deduplicated.
    pub external_refs: Vec<String>,
    pub status: ComponentStatus,
    pub warnings: Vec<Warning>,
}

impl Component {
    fn empty(request: &ComponentRequest) -> Self {
        Component {
            name: request.name.clone(),
            seed_patterns: request.seed_patterns.clone(),
            files: Vec::new(),
            external_refs: Vec::new(),
            status: ComponentStatus::Extracted,
            warnings: Vec::new(),
        }
    }

    /// A component that never got extracted.
    pub fn failed(request: &ComponentRequest, reason: impl Into<String>) -> Self {
        let mut component = Component::empty(request);
        component.mark_failed(reason);
        component
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ComponentStatus::Failed { .. })
    }

    pub fn source_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.source.as_path())
    }

    pub fn contains_source(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.source == path)
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = ComponentStatus::Failed {
            reason: reason.into(),
        };
    }
}

/// Seed files of a request, each with the first pattern that matched it.
pub fn match_seeds(
    request: &ComponentRequest,
    graph: &ImportGraph,
    warnings: &mut Vec<Warning>,
) -> BTreeMap<FileId, SeedPattern> {
    let mut seeds = BTreeMap::new();

    for raw in &request.seed_patterns {
        let pattern = match SeedPattern::compile(raw) {
            Ok(pattern) => pattern,
            Err(e) => {
                warnings.push(
                    Warning::new(WarningKind::InvalidPattern, &request.name, e.to_string()).logged(),
                );
                continue;
            }
        };

        let mut matched = 0;
        for (id, file) in graph.files() {
            if pattern.is_match(&file.path) {
                matched += 1;
                seeds.entry(id).or_insert_with(|| pattern.clone());
            }
        }
        debug!("Pattern {:?} of {} matched {} files", raw, request.name, matched);

        if matched == 0 {
            warnings.push(
                Warning::new(
                    WarningKind::EmptySeed,
                    &request.name,
                    format!("pattern `{raw}` matched no files"),
                )
                .logged(),
            );
        }
    }

    seeds
}

/// Breadth-first closure over internal edges.
pub fn closure(
    graph: &ImportGraph,
    seeds: impl IntoIterator<Item = FileId>,
    max_files: usize,
) -> Result<BTreeSet<FileId>> {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();

    for seed in seeds {
        if visited.insert(seed) {
            queue.push_back(seed);
        }
    }

    while let Some(current) = queue.pop_front() {
        if visited.len() > max_files {
            return Err(ExtractError::TooManyFiles {
                count: visited.len(),
                max: max_files,
            });
        }
        for target in graph.internal_targets(current) {
            if visited.insert(target) {
                queue.push_back(target);
            }
        }
    }

    if visited.len() > max_files {
        return Err(ExtractError::TooManyFiles {
            count: visited.len(),
            max: max_files,
        });
    }
    Ok(visited)
}

/// Extract one component. Never fails outright: problems become warnings
/// or a `Failed` status on the component.
pub fn extract(request: &ComponentRequest, graph: &ImportGraph, config: &SynthesisConfig) -> Component {
    let mut component = Component::empty(request);
    let seeds = match_seeds(request, graph, &mut component.warnings);

    let members = match closure(graph, seeds.keys().copied(), config.max_component_files) {
        Ok(members) => members,
        Err(e) => {
            component.warnings.push(
                Warning::new(WarningKind::ComponentFailed, &request.name, e.to_string()).logged(),
            );
            component.mark_failed(e.to_string());
            return component;
        }
    };

    let entries: Vec<LayoutEntry> = members
        .iter()
        .filter_map(|id| {
            let file = graph.file(*id)?;
            Some(LayoutEntry {
                id: *id,
                source: file.path.clone(),
                hoisted: seeds.get(id).and_then(|pattern| pattern.hoisted(&file.path)),
            })
        })
        .collect();
    let destinations = layout::plan(&entries, config.layout);

    let mut external = BTreeSet::new();
    for entry in &entries {
        for edge in graph.edges_from(entry.id) {
            if let Some(package) = edge.external_package() {
                external.insert(package.to_string());
            }
        }

        let outcome = rewrite_file(graph, entry.id, &destinations);
        component.warnings.extend(outcome.warnings);
        component.files.push(PlacedFile {
            source: entry.source.clone(),
            destination: destinations
                .get(&entry.id)
                .cloned()
                .unwrap_or_else(|| entry.source.clone()),
            is_seed: seeds.contains_key(&entry.id),
            content: outcome.content,
            rewritten_imports: outcome.rewritten,
        });
    }

    component.files.sort_by(|a, b| a.source.cmp(&b.source));
    component.external_refs = external.into_iter().collect();

    info!(
        "Extracted component {}: {} seeds, {} files, {} external packages",
        component.name,
        seeds.len(),
        component.files.len(),
        component.external_refs.len()
    );
    component
}
