//! Lexical path helpers for tree-relative paths

use std::path::{Component, Path, PathBuf};

/// Normalize a tree-relative path lexically, resolving `.` and `..`.
///
/// Returns `None` when the path escapes the root or is absolute.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.iter().collect())
}

/// Join a slash-separated specifier onto a tree-relative directory.
pub fn join_specifier(base: &Path, specifier: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if !joined.pop() {
                    return None;
                }
            }
            other => joined.push(other),
        }
    }
    Some(joined)
}

/// Directory containing a tree-relative file (the root is the empty path).
pub fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Relative path from directory `from` to `to`, using `/` separators.
///
/// The result always starts with `./` or `../`.
pub fn relative_specifier(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

    let mut segments: Vec<String> = Vec::new();
    for _ in common..from.len() {
        segments.push("..".to_string());
    }
    for component in &to[common..] {
        segments.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if segments.first().map_or(true, |s| s != "..") {
        segments.insert(0, ".".to_string());
    }
    segments.join("/")
}

/// Render a tree-relative path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative(Path::new("a/./b/../c")), Some(PathBuf::from("a/c")));
        assert_eq!(normalize_relative(Path::new("../a")), None);
        assert_eq!(normalize_relative(Path::new("/a")), None);
    }

    #[test]
    fn test_relative_specifier() {
        assert_eq!(relative_specifier(Path::new("api"), Path::new("core/db.py")), "../core/db.py");
        assert_eq!(relative_specifier(Path::new(""), Path::new("core/db.py")), "./core/db.py");
        assert_eq!(relative_specifier(Path::new("a/b"), Path::new("a/c.js")), "../c.js");
        assert_eq!(relative_specifier(Path::new("a"), Path::new("a/c.js")), "./c.js");
    }

    #[test]
    fn test_join_specifier() {
        assert_eq!(join_specifier(Path::new("api"), "../core/db"), Some(PathBuf::from("core/db")));
        assert_eq!(join_specifier(Path::new(""), "../x"), None);
        assert_eq!(join_specifier(Path::new("a"), "./b"), Some(PathBuf::from("a/b")));
    }
}
