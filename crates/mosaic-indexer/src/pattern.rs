//! Seed pattern compilation

use crate::error::{ExtractError, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};

const META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// A compiled seed pattern.
#[derive(Debug, Clone)]
pub struct SeedPattern {
    pub raw: String,
    matcher: GlobMatcher,
    /// Literal directory prefix of the pattern (`api` for `api/**/*.py`).
    base: PathBuf,
}

impl SeedPattern {
    /// Compile a pattern. `*` stays within one path segment, `**` spans segments.
    pub fn compile(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_start_matches("./");
        let matcher = GlobBuilder::new(trimmed)
            .literal_separator(true)
            .build()
            .map_err(|source| ExtractError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(SeedPattern {
            raw: raw.to_string(),
            matcher,
            base: literal_base(trimmed),
        })
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path of a matched file with the literal prefix removed.
    pub fn hoisted(&self, path: &Path) -> Option<PathBuf> {
        let stripped = path.strip_prefix(&self.base).ok()?;
        (!stripped.as_os_str().is_empty()).then(|| stripped.to_path_buf())
    }
}

fn literal_base(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let literal = segments
        .iter()
        .take_while(|segment| !segment.contains(META))
        .count();
    // A fully literal pattern names one file; its base is the containing directory
    let take = if literal == segments.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };
    segments[..take].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_stays_in_segment() {
        let pattern = SeedPattern::compile("api/*").unwrap();
        assert!(pattern.is_match(Path::new("api/routes.py")));
        assert!(!pattern.is_match(Path::new("api/v1/routes.py")));

        let deep = SeedPattern::compile("api/**/*.py").unwrap();
        assert!(deep.is_match(Path::new("api/v1/routes.py")));
        assert!(deep.is_match(Path::new("api/routes.py")));
    }

    #[test]
    fn test_literal_base() {
        assert_eq!(SeedPattern::compile("api/*").unwrap().base(), Path::new("api"));
        assert_eq!(SeedPattern::compile("src/**/*.ts").unwrap().base(), Path::new("src"));
        assert_eq!(SeedPattern::compile("src/lib/util.py").unwrap().base(), Path::new("src/lib"));
        assert_eq!(SeedPattern::compile("*.py").unwrap().base(), Path::new(""));
        assert_eq!(SeedPattern::compile("./web/*").unwrap().base(), Path::new("web"));
    }

    #[test]
    fn test_hoisted() {
        let pattern = SeedPattern::compile("api/**/*.py").unwrap();
        assert_eq!(
            pattern.hoisted(Path::new("api/v1/routes.py")),
            Some(PathBuf::from("v1/routes.py"))
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = SeedPattern::compile("api/[").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPattern { .. }));
    }
}
