//! # Harconist Registry
//!
//! Discovers message-handling entities in JavaScript workspaces and keeps a
//! name-keyed registry of their documented API.
//!
//! ## Pipeline
//!
//! ```text
//! workspace roots
//!     │  discovery: <root>/bus, <root>/src/bus, one level of packages
//!     ▼
//! entity files ──► extractor (doclets + package.json) ──► Entity
//!                                                           │
//!                        RegistryBuilder::reload / incremental_update
//!                                                           ▼
//!                                     Arc<EntityRegistry> snapshot (watch)
//! ```
//!
//! An entity file is a module whose export is an object (or a reference to
//! one) carrying a string `name` property; its function-valued members are the
//! entity's callable functions.
//!
//! ## Example
//!
//! ```no_run
//! use harconist_registry::{RegistryBuilder, RegistryConfig};
//! use std::path::PathBuf;
//!
//! # async fn run() -> harconist_registry::Result<()> {
//! let builder = RegistryBuilder::new(RegistryConfig::default())?;
//! let stats = builder.reload(&[PathBuf::from("/path/to/workspace")]).await;
//! println!("{} entities", stats.entities);
//!
//! let registry = builder.snapshot();
//! if let Some(location) = registry.definition("Greeter", Some("hello")) {
//!     println!("{}:{}", location.path.display(), location.line);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod discovery;
mod error;
mod extractor;
mod model;
mod package;
mod registry;
mod stats;

pub use builder::{build_registry, reconcile, RegistryBuilder};
pub use config::{ProcessorOptions, RegistryConfig};
pub use discovery::{
    discover_entity_paths, DiscoveryOptions, EntityScanner, ENTITY_DIRECTORY, SOURCE_DIRECTORY,
};
pub use error::{RegistryError, Result};
pub use extractor::{EntityExtractor, LIFECYCLE_FUNCTION_NAMES};
pub use model::{Entity, Function, Location, Parameter};
pub use package::{descriptor_path_for, read_service_name, PACKAGE_DESCRIPTOR};
pub use registry::EntityRegistry;
pub use stats::{ReloadStats, UpdateStats};
