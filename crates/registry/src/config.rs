use crate::discovery::DiscoveryOptions;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filtering policy applied to an entity's member functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorOptions {
    /// Drop functions named `init` and `close`
    pub drop_lifecycle_functions: bool,

    /// Drop functions whose name starts with `_`
    pub drop_underscore_functions: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            drop_lifecycle_functions: true,
            drop_underscore_functions: true,
        }
    }
}

impl ProcessorOptions {
    /// Keep every documented function
    pub const fn keep_all() -> Self {
        Self {
            drop_lifecycle_functions: false,
            drop_underscore_functions: false,
        }
    }
}

/// Host-supplied settings, keyed the way the editor stores them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    pub drop_lifecycle_functions: bool,

    pub drop_underscore_functions: bool,

    /// Roots searched in addition to the workspace folders
    pub extra_roots: Vec<PathBuf>,

    /// Entity file extensions, without the leading dot
    pub extensions: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let processor = ProcessorOptions::default();
        Self {
            drop_lifecycle_functions: processor.drop_lifecycle_functions,
            drop_underscore_functions: processor.drop_underscore_functions,
            extra_roots: Vec::new(),
            extensions: DiscoveryOptions::default().extensions,
        }
    }
}

impl RegistryConfig {
    /// Parse and validate a JSON settings blob; missing keys take defaults
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| RegistryError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(RegistryError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.extensions.is_empty() {
            return Err("extensions must list at least one file extension".to_string());
        }

        for extension in &self.extensions {
            if extension.is_empty() {
                return Err("extensions must not contain empty entries".to_string());
            }
            if extension.starts_with('.') {
                return Err(format!(
                    "extension '{extension}' must be given without the leading dot"
                ));
            }
            if extension.contains(['/', '\\']) {
                return Err(format!("extension '{extension}' must not contain a path separator"));
            }
        }

        Ok(())
    }

    pub const fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            drop_lifecycle_functions: self.drop_lifecycle_functions,
            drop_underscore_functions: self.drop_underscore_functions,
        }
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            extensions: self.extensions.clone(),
        }
    }

    /// Workspace roots followed by the configured extra roots
    pub fn roots(&self, workspace_roots: &[PathBuf]) -> Vec<PathBuf> {
        workspace_roots
            .iter()
            .chain(self.extra_roots.iter())
            .cloned()
            .collect()
    }
}
