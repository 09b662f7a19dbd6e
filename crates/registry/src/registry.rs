use crate::model::{Entity, Function, Location};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable name-keyed snapshot of all known entities.
///
/// Entities are shared via `Arc` so an incremental update can carry
/// unchanged entries into the next snapshot without copying them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityRegistry {
    entities: BTreeMap<String, Arc<Entity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, returning the one it displaced
    pub(crate) fn insert(&mut self, entity: Arc<Entity>) -> Option<Arc<Entity>> {
        self.entities.insert(entity.name.clone(), entity)
    }

    pub(crate) fn get_shared(&self, name: &str) -> Option<&Arc<Entity>> {
        self.entities.get(name)
    }

    pub(crate) fn shared(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name).map(Arc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entity names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().map(Arc::as_ref)
    }

    pub fn function(&self, entity: &str, function: &str) -> Option<&Function> {
        self.get(entity)?.function(function)
    }

    /// Entities whose name starts with `prefix`, sorted by name
    pub fn complete_entities<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.entities
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(name, _)| name.starts_with(prefix))
            .map(|(_, entity)| entity.as_ref())
    }

    /// Functions of `entity` whose name starts with `prefix`, in declaration order
    pub fn complete_functions<'a>(&'a self, entity: &str, prefix: &'a str) -> Vec<&'a Function> {
        self.get(entity)
            .map(|entity| {
                entity
                    .functions
                    .iter()
                    .filter(|function| function.name.starts_with(prefix))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Declaration site of an entity, or of one of its functions
    pub fn definition(&self, entity: &str, function: Option<&str>) -> Option<&Location> {
        let entity = self.get(entity)?;
        match function {
            Some(name) => entity.function(name).map(|function| &function.location),
            None => Some(&entity.location),
        }
    }

    /// Entities declared in `path`
    pub fn entities_in<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a Entity> {
        self.iter().filter(move |entity| entity.location.path == path)
    }

    /// Distinct files backing the registered entities
    pub fn paths(&self) -> BTreeSet<&Path> {
        self.iter()
            .map(|entity| entity.location.path.as_path())
            .collect()
    }

    pub(crate) fn path_set(&self) -> BTreeSet<PathBuf> {
        self.paths().into_iter().map(Path::to_path_buf).collect()
    }
}

impl FromIterator<Entity> for EntityRegistry {
    /// Later entities replace earlier ones with the same name
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut registry = Self::new();
        for entity in iter {
            registry.insert(Arc::new(entity));
        }
        registry
    }
}
