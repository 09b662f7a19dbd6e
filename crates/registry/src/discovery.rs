use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Directory holding a package's entity modules
pub const ENTITY_DIRECTORY: &str = "bus";

/// Directory that may wrap [`ENTITY_DIRECTORY`] (`src/bus`)
pub const SOURCE_DIRECTORY: &str = "src";

/// Options for entity file discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// File extensions (without the dot) that mark candidate entity files
    pub extensions: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["js".to_string()],
        }
    }
}

impl DiscoveryOptions {
    /// `greeter.js` matches `js`; `types.d.ts` matches `d.ts` and `ts`
    pub fn matches(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|extension| {
            file_name
                .strip_suffix(extension.as_str())
                .and_then(|stem| stem.strip_suffix('.'))
                .is_some_and(|stem| !stem.is_empty())
        })
    }
}

/// Scanner for entity files laid out by the `bus` / `src/bus` convention
pub struct EntityScanner {
    options: DiscoveryOptions,
}

impl EntityScanner {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self { options }
    }

    /// Scan base directories for entity files.
    ///
    /// Output order is base order, then package name, then file name; a path
    /// reachable from several bases is reported once.
    pub async fn scan(&self, base_directories: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for base in base_directories {
            let base = absolutize(base);
            for path in self.scan_base(&base).await {
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        log::info!("Found {} entity files", files.len());
        files
    }

    async fn scan_base(&self, base: &Path) -> Vec<PathBuf> {
        if let Some(entity_dir) = locate_entity_directory(base).await {
            return self.entity_files(&entity_dir).await;
        }

        // Multi-package layout: each direct subdirectory may be a package root
        let mut files = Vec::new();
        for package_root in package_roots(base).await {
            if let Some(entity_dir) = locate_entity_directory(&package_root).await {
                files.extend(self.entity_files(&entity_dir).await);
            }
        }

        if files.is_empty() {
            log::debug!("No entity directory under {}", base.display());
        }
        files
    }

    /// Regular files directly inside an entity directory, sorted by name
    async fn entity_files(&self, entity_dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for path in read_dir_sorted(entity_dir).await {
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !self.options.matches(file_name) {
                continue;
            }

            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log::warn!("Failed to stat {}: {e}", path.display()),
            }
        }

        log::debug!(
            "Entity directory {} holds {} candidate files",
            entity_dir.display(),
            files.len()
        );
        files
    }
}

/// Find entity files under the given base directories
pub async fn discover_entity_paths(
    base_directories: &[PathBuf],
    options: &DiscoveryOptions,
) -> Vec<PathBuf> {
    EntityScanner::new(options.clone())
        .scan(base_directories)
        .await
}

/// `root/bus` if it is a directory, else `root/src/bus`
async fn locate_entity_directory(root: &Path) -> Option<PathBuf> {
    let direct = root.join(ENTITY_DIRECTORY);
    if is_dir(&direct).await {
        return Some(direct);
    }

    let nested = root.join(SOURCE_DIRECTORY).join(ENTITY_DIRECTORY);
    if is_dir(&nested).await {
        return Some(nested);
    }

    None
}

/// Direct subdirectories of `base` that may be package roots, in name order.
///
/// Hidden directories (leading `.`) are skipped, as a dot-less glob would
/// skip them. Installed dependencies under `node_modules` are skipped too:
/// they are never part of the workspace's own entity set.
async fn package_roots(base: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();

    for path in read_dir_sorted(base).await {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.starts_with('.') || IGNORED_PACKAGE_ROOTS.contains(&name) {
            continue;
        }
        if is_dir(&path).await {
            roots.push(path);
        }
    }

    roots
}

async fn read_dir_sorted(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot read directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => paths.push(entry.path()),
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to read entry in {}: {e}", dir.display());
                break;
            }
        }
    }

    paths.sort();
    paths
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

const IGNORED_PACKAGE_ROOTS: &[&str] = &["node_modules"];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"module.exports = {};").unwrap();
    }

    async fn discover(bases: &[PathBuf]) -> Vec<PathBuf> {
        discover_entity_paths(bases, &DiscoveryOptions::default()).await
    }

    #[test]
    fn extension_matching_requires_a_stem() {
        let options = DiscoveryOptions {
            extensions: vec!["js".to_string(), "d.ts".to_string()],
        };
        assert!(options.matches("greeter.js"));
        assert!(options.matches("greeter.d.ts"));
        assert!(!options.matches("greeter.ts"));
        assert!(!options.matches(".js"));
        assert!(!options.matches("greeterjs"));
    }

    #[tokio::test]
    async fn no_convention_means_no_paths() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("lib").join("greeter.js"));
        touch(&temp.path().join("pkg").join("lib").join("bus").join("deep.js"));

        assert!(discover(&[temp.path().to_path_buf()]).await.is_empty());
    }

    #[tokio::test]
    async fn missing_base_directory_is_not_an_error() {
        let temp = tempdir().unwrap();
        assert!(discover(&[temp.path().join("missing")]).await.is_empty());
    }

    #[tokio::test]
    async fn bus_takes_precedence_over_src_bus() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("bus").join("a.js"));
        touch(&temp.path().join("src").join("bus").join("b.js"));

        let paths = discover(&[temp.path().to_path_buf()]).await;
        assert_eq!(paths, vec![temp.path().join("bus").join("a.js")]);
    }

    #[tokio::test]
    async fn src_bus_is_used_when_bus_is_absent() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("src").join("bus").join("b.js"));
        touch(&temp.path().join("src").join("bus").join("notes.md"));
        fs::create_dir_all(temp.path().join("src").join("bus").join("dir.js")).unwrap();

        let paths = discover(&[temp.path().to_path_buf()]).await;
        assert_eq!(paths, vec![temp.path().join("src").join("bus").join("b.js")]);
    }

    #[tokio::test]
    async fn packages_one_level_down_are_scanned_in_name_order() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("pkg-b").join("bus").join("logger.js"));
        touch(&temp.path().join("pkg-a").join("src").join("bus").join("greeter.js"));
        touch(&temp.path().join("pkg-a").join("src").join("bus").join("admin.js"));
        touch(&temp.path().join("node_modules").join("dep").join("bus").join("x.js"));
        touch(&temp.path().join("node_modules").join("bus").join("y.js"));
        touch(&temp.path().join(".hidden").join("bus").join("z.js"));

        let paths = discover(&[temp.path().to_path_buf()]).await;
        assert_eq!(
            paths,
            vec![
                temp.path().join("pkg-a").join("src").join("bus").join("admin.js"),
                temp.path().join("pkg-a").join("src").join("bus").join("greeter.js"),
                temp.path().join("pkg-b").join("bus").join("logger.js"),
            ]
        );
    }

    #[tokio::test]
    async fn repeated_bases_do_not_duplicate_paths() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("bus").join("a.js"));
        let base = temp.path().to_path_buf();

        let paths = discover(&[base.clone(), base]).await;
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn discovery_is_idempotent() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("one").join("bus").join("a.js"));
        touch(&temp.path().join("two").join("bus").join("b.js"));
        let bases = vec![temp.path().to_path_buf()];

        assert_eq!(discover(&bases).await, discover(&bases).await);
    }
}
