//! Import scanning, graph building and component extraction

pub mod builder;
pub mod error;
pub mod extractor;
pub mod languages;
pub mod layout;
pub mod pattern;
pub mod rewrite;


pub use builder::{BuildOutput, build, build_tree};
pub use error::ExtractError;
pub use extractor::{Component, ComponentRequest, ComponentStatus, PlacedFile, closure, extract};
pub use languages::{LanguageSupport, support_for};
pub use pattern::SeedPattern;
