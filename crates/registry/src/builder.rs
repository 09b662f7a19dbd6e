use crate::config::RegistryConfig;
use crate::discovery::discover_entity_paths;
use crate::error::{RegistryError, Result};
use crate::extractor::EntityExtractor;
use crate::model::Entity;
use crate::registry::EntityRegistry;
use crate::stats::{elapsed_ms, ReloadStats, UpdateStats};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex as TokioMutex};

/// Outcome of extracting one discovered path
#[derive(Debug)]
enum Extraction {
    Entity(Entity),
    NotAnEntity,
    /// `"<path>: <error>"`
    Failed(String),
}

/// Extract every path concurrently; results come back in input order
async fn extract_all(paths: &[PathBuf], extractor: &EntityExtractor) -> Vec<Extraction> {
    let mut tasks = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.clone();
        let extractor = *extractor;
        let task = tokio::spawn(async move { extractor.extract(&path).await });
        tasks.push(task);
    }

    let mut results = Vec::with_capacity(paths.len());
    for (path, task) in paths.iter().zip(tasks) {
        let extraction = match task.await {
            Ok(Ok(Some(entity))) => Extraction::Entity(entity),
            Ok(Ok(None)) => {
                log::debug!("{} declares no entity", path.display());
                Extraction::NotAnEntity
            }
            Ok(Err(e)) => Extraction::Failed(format!("{}: {e}", path.display())),
            Err(e) => Extraction::Failed(format!(
                "{}: {}",
                path.display(),
                RegistryError::TaskFailed(e.to_string())
            )),
        };
        results.push(extraction);
    }

    results
}

/// Insert `entity`, letting it win over an existing entity of the same name
fn merge(registry: &mut EntityRegistry, entity: Arc<Entity>) {
    let location = entity.location.clone();
    if let Some(displaced) = registry.insert(entity) {
        log::warn!(
            "Entity {} declared in both {} and {}; keeping the latter",
            displaced.name,
            displaced.location.path.display(),
            location.path.display()
        );
    }
}

/// Build a registry from scratch out of the given entity paths.
///
/// Paths are merged in the order given, so on a name collision the later
/// path wins regardless of which extraction finished first.
pub async fn build_registry(
    paths: &[PathBuf],
    extractor: &EntityExtractor,
) -> (EntityRegistry, ReloadStats) {
    let start = Instant::now();
    let mut stats = ReloadStats::new();
    stats.paths = paths.len();

    let mut registry = EntityRegistry::new();
    for extraction in extract_all(paths, extractor).await {
        match extraction {
            Extraction::Entity(entity) => merge(&mut registry, Arc::new(entity)),
            Extraction::NotAnEntity => stats.skipped += 1,
            Extraction::Failed(failure) => {
                log::warn!("Skipping entity file {failure}");
                stats.add_failure(failure);
            }
        }
    }

    stats.entities = registry.len();
    stats.time_ms = elapsed_ms(start);
    (registry, stats)
}

/// Bring `prior` in line with the currently discovered paths.
///
/// Entities whose file is still present are carried over as-is (same `Arc`),
/// entities of vanished files are dropped, and every path not backing a
/// carried-over entity is extracted. Fresh entities win name collisions.
pub async fn reconcile(
    prior: &EntityRegistry,
    current_paths: &[PathBuf],
    extractor: &EntityExtractor,
) -> (EntityRegistry, UpdateStats) {
    let start = Instant::now();
    let mut stats = UpdateStats::new();
    stats.paths = current_paths.len();

    let current: HashSet<&Path> = current_paths.iter().map(PathBuf::as_path).collect();

    let mut registry = EntityRegistry::new();
    for entity in prior.shared() {
        if current.contains(entity.location.path.as_path()) {
            registry.insert(Arc::clone(entity));
        }
    }

    let retained_paths = registry.path_set();
    let fresh_paths: Vec<PathBuf> = current_paths
        .iter()
        .filter(|path| !retained_paths.contains(*path))
        .cloned()
        .collect();

    for extraction in extract_all(&fresh_paths, extractor).await {
        match extraction {
            Extraction::Entity(entity) => merge(&mut registry, Arc::new(entity)),
            Extraction::NotAnEntity => stats.skipped += 1,
            Extraction::Failed(failure) => {
                log::warn!("Skipping entity file {failure}");
                stats.add_failure(failure);
            }
        }
    }

    stats.retained_count = prior
        .shared()
        .filter(|entity| {
            registry
                .get_shared(&entity.name)
                .is_some_and(|current| Arc::ptr_eq(current, entity))
        })
        .count();
    stats.unloaded_count = prior.len() - stats.retained_count;
    stats.loaded_count = registry.len() - stats.retained_count;
    stats.time_ms = elapsed_ms(start);

    (registry, stats)
}

/// Owner of the live registry.
///
/// Refreshes are serialized; each one builds a new [`EntityRegistry`] and
/// publishes it in a single step, so readers only ever observe complete
/// snapshots.
pub struct RegistryBuilder {
    config: RegistryConfig,
    extractor: EntityExtractor,
    published: watch::Sender<Arc<EntityRegistry>>,
    refresh_lock: TokioMutex<()>,
}

impl RegistryBuilder {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate().map_err(RegistryError::InvalidConfig)?;

        let extractor = EntityExtractor::new(config.processor_options());
        let (published, _) = watch::channel(Arc::new(EntityRegistry::new()));

        Ok(Self {
            config,
            extractor,
            published,
            refresh_lock: TokioMutex::new(()),
        })
    }

    /// Latest published registry
    pub fn snapshot(&self) -> Arc<EntityRegistry> {
        self.published.borrow().clone()
    }

    /// Receiver notified whenever a new registry is published
    pub fn subscribe(&self) -> watch::Receiver<Arc<EntityRegistry>> {
        self.published.subscribe()
    }

    /// Entity files under the workspace roots and the configured extra roots
    pub async fn discover(&self, workspace_roots: &[PathBuf]) -> Vec<PathBuf> {
        let roots = self.config.roots(workspace_roots);
        discover_entity_paths(&roots, &self.config.discovery_options()).await
    }

    /// Rebuild the registry from every discovered entity file
    pub async fn reload(&self, workspace_roots: &[PathBuf]) -> ReloadStats {
        let _guard = self.refresh_lock.lock().await;

        let paths = self.discover(workspace_roots).await;
        let (registry, stats) = build_registry(&paths, &self.extractor).await;
        self.published.send_replace(Arc::new(registry));

        log::info!(
            "Registry reloaded: {} entities from {} files ({} skipped, {} failed) in {}ms",
            stats.entities,
            stats.paths,
            stats.skipped,
            stats.failures.len(),
            stats.time_ms
        );
        stats
    }

    /// Re-extract only files that do not already back a registered entity
    pub async fn incremental_update(&self, workspace_roots: &[PathBuf]) -> UpdateStats {
        let _guard = self.refresh_lock.lock().await;

        let prior = self.snapshot();
        let paths = self.discover(workspace_roots).await;
        let (registry, stats) = reconcile(&prior, &paths, &self.extractor).await;
        self.published.send_replace(Arc::new(registry));

        log::info!(
            "Registry updated: {} loaded, {} unloaded, {} retained ({} failed) in {}ms",
            stats.loaded_count,
            stats.unloaded_count,
            stats.retained_count,
            stats.failures.len(),
            stats.time_ms
        );
        stats
    }

    /// Publish an empty registry
    pub async fn clear(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.published.send_replace(Arc::new(EntityRegistry::new()));
    }
}
