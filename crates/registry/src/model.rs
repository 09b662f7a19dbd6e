use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where an entity or function was declared
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Location {
    /// Absolute path of the entity file
    pub path: PathBuf,

    /// Line of the declaring construct (1-indexed)
    pub line: usize,
}

impl Location {
    pub fn new(path: impl AsRef<Path>, line: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            line,
        }
    }
}

/// A documented parameter; `properties` holds nested `param.field` entries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,

    /// Type expression, empty when undocumented
    #[serde(rename = "type")]
    pub type_name: String,

    pub documentation: String,

    #[serde(default)]
    pub properties: Vec<Parameter>,
}

/// A callable member of an entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Function {
    pub location: Location,

    /// Unique within the owning entity
    pub name: String,

    pub documentation: String,

    pub parameters: Vec<Parameter>,

    /// Exception descriptions
    pub throws: Vec<String>,

    /// Description of the first declared return value, empty if none
    pub returns: String,
}

/// A documented message-handling module addressable by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub location: Location,

    /// Name used in request/inform calls, the registry key
    pub name: String,

    /// Owning package name, empty if undeterminable
    pub service: String,

    pub documentation: String,

    pub functions: Vec<Function>,
}

impl Entity {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }
}
