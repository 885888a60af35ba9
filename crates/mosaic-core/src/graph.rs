//! Import graph using petgraph::StableDiGraph with a sorted path index

use crate::model::*;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A node of the import graph: a file of the tree or an external package.
#[derive(Debug, Clone)]
pub enum GraphNode {
    File(SourceFile),
    Package(String),
}

/// The import graph. Built once per job, then shared read-only.
pub struct ImportGraph {
    inner: StableDiGraph<GraphNode, ImportEdge>,
    paths: BTreeMap<PathBuf, FileId>,
    packages: BTreeMap<String, NodeIndex>,
}

impl std::fmt::Debug for ImportGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportGraph")
            .field("file_count", &self.paths.len())
            .field("package_count", &self.packages.len())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl ImportGraph {
    pub fn new() -> Self {
        ImportGraph {
            inner: StableDiGraph::new(),
            paths: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }

    /// Add a file. A file with an already known path returns the existing id.
    pub fn add_file(&mut self, file: SourceFile) -> FileId {
        if let Some(id) = self.paths.get(&file.path) {
            return *id;
        }
        let path = file.path.clone();
        let idx = self.inner.add_node(GraphNode::File(file));
        let id = FileId(idx.index() as u32);
        self.paths.insert(path, id);
        id
    }

    /// Add an edge. External targets get a package node on first use.
    pub fn add_edge(&mut self, edge: ImportEdge) {
        let source = NodeIndex::new(edge.source.0 as usize);
        let target = match &edge.target {
            EdgeTarget::Internal(id) => NodeIndex::new(id.0 as usize),
            EdgeTarget::External(name) => self.package_node(name),
        };
        self.inner.add_edge(source, target, edge);
    }

    fn package_node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.packages.get(name) {
            return *idx;
        }
        let idx = self.inner.add_node(GraphNode::Package(name.to_string()));
        self.packages.insert(name.to_string(), idx);
        idx
    }

    /// Get a file by id.
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        match self.inner.node_weight(NodeIndex::new(id.0 as usize)) {
            Some(GraphNode::File(file)) => Some(file),
            _ => None,
        }
    }

    /// Look up a file by its tree-relative path.
    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.paths.get(path).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.paths.contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.paths.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all files in path order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.paths
            .values()
            .filter_map(move |id| self.file(*id).map(|file| (*id, file)))
    }

    /// External package names referenced anywhere in the tree, sorted.
    pub fn external_packages(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Iterate over all edges in insertion order.
    pub fn all_edges(&self) -> impl Iterator<Item = &ImportEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Outgoing edges of a file, in insertion order.
    pub fn edges_from(&self, source: FileId) -> Vec<&ImportEdge> {
        self.directed(source, Direction::Outgoing)
    }

    /// Incoming edges of a file, in insertion order.
    pub fn edges_to(&self, target: FileId) -> Vec<&ImportEdge> {
        self.directed(target, Direction::Incoming)
    }

    fn directed(&self, id: FileId, direction: Direction) -> Vec<&ImportEdge> {
        let idx = NodeIndex::new(id.0 as usize);
        // Stable graphs hand adjacent edges back newest first.
        let mut ids: Vec<EdgeIndex> = self
            .inner
            .edges_directed(idx, direction)
            .map(|edge_ref| edge_ref.id())
            .collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|eid| self.inner.edge_weight(eid))
            .collect()
    }

    /// Files directly imported by `source`, deduplicated, in first-import order.
    pub fn internal_targets(&self, source: FileId) -> Vec<FileId> {
        let mut seen = Vec::new();
        for edge in self.edges_from(source) {
            if let Some(target) = edge.internal_target() {
                if !seen.contains(&target) {
                    seen.push(target);
                }
            }
        }
        seen
    }

    /// Check if `source` imports `target` directly.
    pub fn has_edge_between(&self, source: FileId, target: FileId) -> bool {
        self.edges_from(source)
            .iter()
            .any(|e| e.internal_target() == Some(target))
    }
}

impl Default for ImportGraph {
    fn default() -> Self {
        Self::new()
    }
}
