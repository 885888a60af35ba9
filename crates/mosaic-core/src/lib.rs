//! Mosaic Core — source tree model, import graph, warnings and configuration

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod paths;
pub mod warning;


pub use config::{LayoutMode, SynthesisConfig};
pub use error::CoreError;
pub use graph::{GraphNode, ImportGraph};
pub use model::{
    Anchor, EdgeTarget, FileId, ImportEdge, ImportRef, ImportStyle, Language, Resolution, SourceFile,
    SourceTree,
};
pub use warning::{Warning, WarningKind};
