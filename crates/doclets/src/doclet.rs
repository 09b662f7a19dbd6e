use serde::{Deserialize, Serialize};

/// Longname of the doclet describing a module's exported value
pub const MODULE_EXPORTS: &str = "module.exports";

/// One flat documentation element describing a named code construct
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doclet {
    /// Fully qualified name (e.g. "module.exports.hello", "Logger#log")
    pub longname: String,

    /// Short name (last segment of the longname)
    pub name: String,

    /// Longname of the enclosing element, if any
    pub memberof: Option<String>,

    /// How the element hangs off its parent
    pub scope: Scope,

    /// Free text of the doc comment
    pub description: Option<String>,

    /// Underlying code construct
    pub meta: DocletMeta,

    #[serde(default)]
    pub params: Vec<ParamTag>,

    #[serde(default)]
    pub exceptions: Vec<TypedTag>,

    #[serde(default)]
    pub returns: Vec<TypedTag>,

    /// True when no doc comment was attached to the construct
    #[serde(default)]
    pub undocumented: bool,
}

impl Doclet {
    /// Create an undocumented doclet; name, memberof and scope follow from the longname
    pub fn new(longname: impl Into<String>, meta: DocletMeta) -> Self {
        let longname = longname.into();
        let (memberof, name, scope) = split_longname(&longname);

        Self {
            name,
            memberof,
            scope,
            longname,
            description: None,
            meta,
            params: Vec::new(),
            exceptions: Vec::new(),
            returns: Vec::new(),
            undocumented: true,
        }
    }

    /// Builder: attach a parsed doc comment
    #[must_use]
    pub fn with_comment(mut self, comment: DocComment) -> Self {
        self.description = comment.description;
        self.params = comment.params;
        self.exceptions = comment.exceptions;
        self.returns = comment.returns;
        self.undocumented = false;
        self
    }

    pub fn code(&self) -> &CodeKind {
        &self.meta.code
    }

    /// Source line (1-indexed) of the code construct
    pub const fn line(&self) -> usize {
        self.meta.lineno
    }

    /// Prototype or instance-scoped members carry `#` somewhere in the longname
    pub fn is_instance_scoped(&self) -> bool {
        self.longname.contains('#')
    }
}

/// Code-level metadata of a doclet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocletMeta {
    /// Start line (1-indexed)
    pub lineno: usize,

    pub code: CodeKind,
}

/// Syntactic kind of the construct a doclet describes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CodeKind {
    ObjectLiteral,
    FunctionExpression,
    FunctionDeclaration,
    ArrowFunction,
    Class,
    /// Reference to another named construct
    Identifier { value: String },
    /// String, number, boolean or null literal (strings unquoted)
    Literal { value: String },
    Other { node_kind: String },
}

impl CodeKind {
    pub const fn is_object_literal(&self) -> bool {
        matches!(self, CodeKind::ObjectLiteral)
    }

    pub const fn is_function_expression(&self) -> bool {
        matches!(self, CodeKind::FunctionExpression)
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            CodeKind::Identifier { value } => Some(value),
            _ => None,
        }
    }

    pub fn literal_value(&self) -> Option<&str> {
        match self {
            CodeKind::Literal { value } => Some(value),
            _ => None,
        }
    }

    /// ESTree-style name of the kind, as JSDoc reports it in `meta.code.type`
    pub fn as_str(&self) -> &str {
        match self {
            CodeKind::ObjectLiteral => "ObjectExpression",
            CodeKind::FunctionExpression => "FunctionExpression",
            CodeKind::FunctionDeclaration => "FunctionDeclaration",
            CodeKind::ArrowFunction => "ArrowFunctionExpression",
            CodeKind::Class => "ClassDeclaration",
            CodeKind::Identifier { .. } => "Identifier",
            CodeKind::Literal { .. } => "Literal",
            CodeKind::Other { node_kind } => node_kind,
        }
    }
}

/// Relationship of a doclet to its parent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    /// `parent.member`
    Static,
    /// `parent#member`
    Instance,
    /// `parent~member`
    Inner,
}

/// A documented `@param`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamTag {
    /// Name as written, dotted for nested properties (`options.name`)
    pub name: String,

    #[serde(default)]
    pub type_names: Vec<String>,

    pub description: Option<String>,

    #[serde(default)]
    pub optional: bool,

    pub default_value: Option<String>,
}

/// A `@throws` or `@returns` annotation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedTag {
    #[serde(default)]
    pub type_names: Vec<String>,

    pub description: Option<String>,
}

impl TypedTag {
    /// Type names joined the way they were written (`A|B`)
    pub fn type_expression(&self) -> String {
        self.type_names.join("|")
    }
}

/// The parsed contents of one `/** ... */` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocComment {
    pub description: Option<String>,
    pub params: Vec<ParamTag>,
    pub exceptions: Vec<TypedTag>,
    pub returns: Vec<TypedTag>,
}

fn split_longname(longname: &str) -> (Option<String>, String, Scope) {
    if longname == MODULE_EXPORTS {
        return (None, longname.to_string(), Scope::Global);
    }

    let Some(index) = longname.rfind(['.', '#', '~']) else {
        return (None, longname.to_string(), Scope::Global);
    };

    let scope = match longname.as_bytes()[index] {
        b'#' => Scope::Instance,
        b'~' => Scope::Inner,
        _ => Scope::Static,
    };

    (
        Some(longname[..index].to_string()),
        longname[index + 1..].to_string(),
        scope,
    )
}
