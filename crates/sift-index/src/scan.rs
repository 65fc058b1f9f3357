//! File discovery: project-type detection, indexable predicate, tree walk.

use std::path::{Path, PathBuf};

use crate::config::ScanConfig;

/// Marker files at a root and the extra directories they exclude.
const PROJECT_MARKERS: &[(&str, &[&str])] = &[
    ("Cargo.toml", &["target"]),
    ("package.json", &["node_modules", "dist", "build", ".next"]),
    ("go.mod", &["vendor"]),
    ("pyproject.toml", &["__pycache__", ".venv", "venv", ".tox", ".mypy_cache"]),
    ("requirements.txt", &["__pycache__", ".venv", "venv", ".tox"]),
    ("pom.xml", &["target"]),
    ("build.gradle", &["build", ".gradle"]),
];

/// Detect project type(s) by marker files at `root` and collect their
/// exclude directories.
#[must_use]
pub fn detect_project_excludes(root: &Path) -> Vec<String> {
    let mut excludes = Vec::new();
    for (marker, dirs) in PROJECT_MARKERS {
        if root.join(marker).is_file() {
            for dir in *dirs {
                if !excludes.iter().any(|e| e == dir) {
                    excludes.push((*dir).to_string());
                }
            }
        }
    }
    excludes
}

/// Whether a file passes every indexability check, applied in order:
/// hidden, binary extension, excluded name, common excludes, project-type
/// excludes, then the supported-extension allowlist.
#[must_use]
pub fn is_indexable(rel_path: &Path, config: &ScanConfig, project_excludes: &[String]) -> bool {
    let components: Vec<&str> = rel_path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    if components
        .iter()
        .any(|c| c.starts_with('.') && *c != "." && *c != "..")
    {
        return false;
    }

    let Some(file_name) = components.last() else {
        return false;
    };

    let extension = rel_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if config.binary_extensions.iter().any(|e| *e == extension) {
        return false;
    }
    if config.exclude_file_names.iter().any(|n| n == file_name) {
        return false;
    }
    if components
        .iter()
        .any(|c| config.common_excludes.iter().any(|e| e == c))
    {
        return false;
    }
    if components
        .iter()
        .any(|c| project_excludes.iter().any(|e| e == c))
    {
        return false;
    }

    config.supported_extensions.iter().any(|e| *e == extension)
}

/// Walk `root` and collect every regular file passing the indexable
/// predicate, relative paths resolved against `root`.
#[must_use]
pub fn collect_files(root: &Path, config: &ScanConfig) -> Vec<PathBuf> {
    let project_excludes = detect_project_excludes(root);

    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).unwrap_or(e.path());
            is_indexable(rel, config, &project_excludes).then(|| e.path().to_path_buf())
        })
        .collect();

    files.sort();
    files
}
