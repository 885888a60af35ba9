//! Dependency merging for Mosaic
//!
//! Raw dependency strings from several sources are normalized into
//! declarations, grouped by canonical package name, checked for conflicts
//! and resolved to concrete versions through an injected `VersionOracle`.

pub mod conflict;
pub mod error;
pub mod normalize;
pub mod oracle;
pub mod resolver;
pub mod version;


pub use conflict::{Conflict, ConflictReason, PackageGroup, Severity, detect, group};
pub use error::VersionError;
pub use normalize::{
    DependencyDeclaration, DependencySet, ManifestFormat, RawDependencySpec, canonical_name, normalize,
    normalize_all,
};
pub use oracle::{CachingOracle, StaticOracle, VersionOracle};
pub use resolver::{
    RelaxationEntry, RelaxationOutcome, ResolutionResult, ResolveOutput, ResolvedDependency, Resolver,
    resolve_specs,
};
pub use version::{Constraint, Version};
