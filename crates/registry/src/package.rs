use crate::discovery::{ENTITY_DIRECTORY, SOURCE_DIRECTORY};
use crate::error::{RegistryError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const PACKAGE_DESCRIPTOR: &str = "package.json";

/// Location of the package descriptor owning an entity file.
///
/// `pkg/src/bus/x.js` resolves two levels up from the entity directory,
/// `pkg/bus/x.js` one level up.
pub fn descriptor_path_for(entity_path: &Path) -> Option<PathBuf> {
    let entity_dir = entity_path.parent()?;
    let package_root = if is_src_bus(entity_dir) {
        entity_dir.parent()?.parent()?
    } else {
        entity_dir.parent()?
    };
    Some(package_root.join(PACKAGE_DESCRIPTOR))
}

fn is_src_bus(dir: &Path) -> bool {
    let is_named = |path: Option<&Path>, name: &str| {
        path.and_then(Path::file_name)
            .is_some_and(|file_name| file_name == name)
    };

    is_named(Some(dir), ENTITY_DIRECTORY) && is_named(dir.parent(), SOURCE_DIRECTORY)
}

/// Service (package) name for an entity file.
///
/// A missing descriptor or one without a string `name` yields an empty name;
/// an unreadable or malformed descriptor is an error.
pub async fn read_service_name(entity_path: &Path) -> Result<String> {
    let Some(path) = descriptor_path_for(entity_path) else {
        return Ok(String::new());
    };

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No package descriptor at {}", path.display());
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };

    let descriptor: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|source| RegistryError::PackageDescriptor {
            path: path.clone(),
            source,
        })?;

    Ok(descriptor
        .get("name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string())
}
