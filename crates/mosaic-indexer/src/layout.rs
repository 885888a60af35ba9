//! Destination paths of extracted files under a component root

use mosaic_core::{FileId, LayoutMode};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

/// One file of a closure, as seen by the layout planner.
#[derive(Debug, Clone)]
pub struct LayoutEntry {
    pub id: FileId,
    pub source: PathBuf,
    /// Where the file would go if hoisted. Only seeds have one.
    pub hoisted: Option<PathBuf>,
}

/// Map every closure file to its destination.
///
/// Non-seed files keep their tree path. A hoisted seed lands on its hoisted
/// path only when no other file claims that path, otherwise it keeps its tree
/// path too, so destinations are always distinct.
pub fn plan(entries: &[LayoutEntry], mode: LayoutMode) -> BTreeMap<FileId, PathBuf> {
    let occupied: HashSet<&PathBuf> = entries.iter().map(|e| &e.source).collect();

    let mut claims: HashMap<&PathBuf, usize> = HashMap::new();
    if mode == LayoutMode::HoistSeeds {
        for hoisted in entries.iter().filter_map(|e| e.hoisted.as_ref()) {
            *claims.entry(hoisted).or_default() += 1;
        }
    }

    entries
        .iter()
        .map(|entry| {
            let destination = match (&entry.hoisted, mode) {
                (Some(hoisted), LayoutMode::HoistSeeds)
                    if claims.get(hoisted) == Some(&1)
                        && (hoisted == &entry.source || !occupied.contains(hoisted)) =>
                {
                    hoisted.clone()
                }
                _ => entry.source.clone(),
            };
            (entry.id, destination)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, source: &str, hoisted: Option<&str>) -> LayoutEntry {
        LayoutEntry {
            id: FileId(id),
            source: PathBuf::from(source),
            hoisted: hoisted.map(PathBuf::from),
        }
    }

    #[test]
    fn test_seeds_hoisted_others_kept() {
        let entries = vec![
            entry(0, "api/routes.py", Some("routes.py")),
            entry(1, "core/db.py", None),
        ];
        let plan = plan(&entries, LayoutMode::HoistSeeds);
        assert_eq!(plan[&FileId(0)], PathBuf::from("routes.py"));
        assert_eq!(plan[&FileId(1)], PathBuf::from("core/db.py"));
    }

    #[test]
    fn test_collisions_fall_back_to_tree_path() {
        let entries = vec![
            entry(0, "a/util.py", Some("util.py")),
            entry(1, "b/util.py", Some("util.py")),
            entry(2, "api/x.py", Some("x.py")),
            entry(3, "x.py", None),
        ];
        let plan = plan(&entries, LayoutMode::HoistSeeds);
        assert_eq!(plan[&FileId(0)], PathBuf::from("a/util.py"));
        assert_eq!(plan[&FileId(1)], PathBuf::from("b/util.py"));
        assert_eq!(plan[&FileId(2)], PathBuf::from("api/x.py"));
        assert_eq!(plan[&FileId(3)], PathBuf::from("x.py"));
    }

    #[test]
    fn test_preserve_mode() {
        let entries = vec![entry(0, "api/routes.py", Some("routes.py"))];
        let plan = plan(&entries, LayoutMode::Preserve);
        assert_eq!(plan[&FileId(0)], PathBuf::from("api/routes.py"));
    }
}
