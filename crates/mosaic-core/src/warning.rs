//! Recoverable problems, reported as data

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of per-item problem a warning describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    // ── Graph building ──────────────────────────────────────
    UnparseableFile,
    DuplicateFile,

    // ── Extraction ──────────────────────────────────────────
    InvalidPattern,
    EmptySeed,
    UnrewritableImport,
    UndeclaredPackage,
    ComponentFailed,

    // ── Dependencies ────────────────────────────────────────
    MalformedConstraint,
    UnresolvedConflict,
    NoMatchingVersion,
    OracleUnavailable,

    // ── Job ─────────────────────────────────────────────────
    JobFailed,
    AssemblyFailed,
    Cancelled,
}

/// A recoverable problem attached to the thing it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// File path, package name or component name the warning is about.
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Mirror the warning into the log and hand it back.
    pub fn logged(self) -> Self {
        tracing::warn!(kind = ?self.kind, subject = %self.subject, "{}", self.message);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.subject, self.message)
    }
}
