//! Writing extracted components and the resolution manifest to disk

use crate::error::AssemblyError;
use mosaic_deps::ResolutionResult;
use mosaic_indexer::{Component, ComponentStatus};
use std::path::{Component as PathPart, Path, PathBuf};
use tracing::debug;

pub const RESOLUTION_MANIFEST: &str = "resolution.json";

/// The directory a component is written to.
pub fn component_root(output_root: &Path, name: &str) -> Result<PathBuf, AssemblyError> {
    let mut parts = Path::new(name).components();
    match (parts.next(), parts.next()) {
        (Some(PathPart::Normal(_)), None) => Ok(output_root.join(name)),
        _ => Err(AssemblyError::InvalidName(name.to_string())),
    }
}

/// Write every placed file of `component` under `output_root/<name>/`.
///
/// On success the component is marked `Assembled`. Returns the number of files written.
pub async fn write_component(output_root: &Path, component: &mut Component) -> Result<usize, AssemblyError> {
    let root = component_root(output_root, &component.name)?;

    for file in &component.files {
        let path = root.join(&file.destination);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AssemblyError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, &file.content)
            .await
            .map_err(|source| AssemblyError::Io {
                path: path.clone(),
                source,
            })?;
        debug!("Wrote {}", path.display());
    }

    component.status = ComponentStatus::Assembled;
    Ok(component.files.len())
}

/// Write `resolution.json` at the output root.
pub async fn write_resolution(output_root: &Path, resolution: &ResolutionResult) -> Result<PathBuf, AssemblyError> {
    let path = output_root.join(RESOLUTION_MANIFEST);
    let json = serde_json::to_vec_pretty(resolution)?;
    tokio::fs::create_dir_all(output_root)
        .await
        .map_err(|source| AssemblyError::Io {
            path: output_root.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| AssemblyError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_root_rejects_nested_names() {
        let root = Path::new("/out");
        assert_eq!(component_root(root, "api").unwrap(), PathBuf::from("/out/api"));
        assert!(component_root(root, "../api").is_err());
        assert!(component_root(root, "a/b").is_err());
        assert!(component_root(root, "").is_err());
        assert!(component_root(root, "/abs").is_err());
    }
}
