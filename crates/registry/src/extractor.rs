use crate::config::ProcessorOptions;
use crate::error::{RegistryError, Result};
use crate::model::{Entity, Function, Location, Parameter};
use crate::package::read_service_name;
use harconist_doclets::{explain, Doclet, Language, ParamTag, MODULE_EXPORTS};
use std::path::Path;

/// Functions dropped when `drop_lifecycle_functions` is set
pub const LIFECYCLE_FUNCTION_NAMES: &[&str] = &["init", "close"];

/// Turns one entity file into an [`Entity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor {
    options: ProcessorOptions,
}

impl EntityExtractor {
    pub const fn new(options: ProcessorOptions) -> Self {
        Self { options }
    }

    /// Extract the entity declared by a file.
    ///
    /// `Ok(None)` means the file is not an entity module (no resolvable export
    /// or no `name` literal). Errors cover unreadable files, syntax errors and
    /// malformed package descriptors.
    pub async fn extract(&self, path: impl AsRef<Path>) -> Result<Option<Entity>> {
        let path = path.as_ref();
        log::debug!("Processing entity {}", path.display());

        let source = tokio::fs::read_to_string(path).await?;
        let language = match Language::from_path(path) {
            Language::Unknown => Language::JavaScript,
            language => language,
        };

        // Tree-sitter parsing is CPU bound
        let doclets = tokio::task::spawn_blocking(move || explain(&source, language))
            .await
            .map_err(|e| RegistryError::TaskFailed(e.to_string()))??;

        let service = read_service_name(path).await?;

        Ok(self.entity_from_doclets(path, &doclets, service))
    }

    /// Resolve the entity described by an already explained file
    pub fn entity_from_doclets(
        &self,
        path: &Path,
        doclets: &[Doclet],
        service: String,
    ) -> Option<Entity> {
        let Some(entity_doclet) = find_entity_doclet(doclets) else {
            match doclets.iter().find(|d| d.longname == MODULE_EXPORTS) {
                Some(exports) => log::debug!(
                    "{} exports {} rather than an entity",
                    path.display(),
                    exports.code().as_str()
                ),
                None => log::debug!("{} has no module export", path.display()),
            }
            return None;
        };

        let Some(name) = entity_name(doclets, entity_doclet) else {
            log::debug!(
                "{} exports {} without a name literal",
                path.display(),
                entity_doclet.longname
            );
            return None;
        };

        let mut functions: Vec<Function> = Vec::new();
        for doclet in member_functions(doclets, entity_doclet) {
            if !self.keeps(&doclet.name) {
                continue;
            }
            // A later definition of the same member replaces the earlier one
            functions.retain(|function| function.name != doclet.name);
            functions.push(function_from_doclet(path, doclet));
        }

        Some(Entity {
            location: Location::new(path, entity_doclet.line()),
            name,
            service,
            documentation: documentation_of(entity_doclet),
            functions,
        })
    }

    fn keeps(&self, function_name: &str) -> bool {
        if self.options.drop_lifecycle_functions
            && LIFECYCLE_FUNCTION_NAMES.contains(&function_name)
        {
            return false;
        }

        if self.options.drop_underscore_functions && function_name.starts_with('_') {
            return false;
        }

        true
    }
}

/// The module export itself when it is an object literal, else the element it names
fn find_entity_doclet(doclets: &[Doclet]) -> Option<&Doclet> {
    let exports = doclets.iter().find(|d| d.longname == MODULE_EXPORTS)?;

    if exports.code().is_object_literal() {
        return Some(exports);
    }

    let referenced = exports.code().identifier()?;
    doclets
        .iter()
        .find(|d| d.longname == referenced)
        .or_else(|| doclets.iter().find(|d| d.name == referenced))
}

fn entity_name(doclets: &[Doclet], entity: &Doclet) -> Option<String> {
    let longname = format!("{}.name", entity.longname);
    let name_doclet = doclets.iter().find(|d| d.longname == longname)?;
    let value = name_doclet.code().literal_value()?;

    (!value.is_empty()).then(|| value.to_string())
}

/// Function expressions attached as data members (not instance members) of the entity
fn member_functions<'d>(
    doclets: &'d [Doclet],
    entity: &Doclet,
) -> impl Iterator<Item = &'d Doclet> {
    let prefix = format!("{}.", entity.longname);
    doclets.iter().filter(move |d| {
        d.longname.starts_with(&prefix)
            && !d.is_instance_scoped()
            && d.code().is_function_expression()
    })
}

fn documentation_of(doclet: &Doclet) -> String {
    doclet.description.clone().unwrap_or_default()
}

fn function_from_doclet(path: &Path, doclet: &Doclet) -> Function {
    let throws = doclet
        .exceptions
        .iter()
        .filter_map(|exception| {
            exception
                .description
                .clone()
                .or_else(|| Some(exception.type_expression()).filter(|t| !t.is_empty()))
        })
        .collect();

    let returns = doclet
        .returns
        .first()
        .and_then(|returns| returns.description.clone())
        .unwrap_or_default();

    Function {
        location: Location::new(path, doclet.line()),
        name: doclet.name.clone(),
        documentation: documentation_of(doclet),
        parameters: parameters_from_tags(&doclet.params),
        throws,
        returns,
    }
}

/// Fold `@param options.name` style tags into their parent's `properties`
fn parameters_from_tags(tags: &[ParamTag]) -> Vec<Parameter> {
    let mut parameters = Vec::new();

    for tag in tags {
        let segments = param_path(&tag.name);
        insert_parameter(&mut parameters, &segments, tag);
    }

    parameters
}

fn param_path(name: &str) -> Vec<&str> {
    if name.starts_with("...") {
        return vec![name];
    }

    let segments: Vec<&str> = name
        .split('.')
        .map(|segment| segment.trim_end_matches("[]"))
        .collect();

    if segments.iter().any(|segment| segment.is_empty()) {
        vec![name]
    } else {
        segments
    }
}

fn insert_parameter(parameters: &mut Vec<Parameter>, segments: &[&str], tag: &ParamTag) {
    match segments {
        [] => {}
        [leaf] => parameters.push(parameter_from_tag(leaf, tag)),
        [head, rest @ ..] => {
            match parameters.iter_mut().rev().find(|p| p.name == *head) {
                Some(parent) => insert_parameter(&mut parent.properties, rest, tag),
                // No documented parent: keep the dotted name as written
                None => parameters.push(parameter_from_tag(&tag.name, tag)),
            }
        }
    }
}

fn parameter_from_tag(name: &str, tag: &ParamTag) -> Parameter {
    Parameter {
        name: name.to_string(),
        type_name: tag.type_names.join("|"),
        documentation: tag.description.clone().unwrap_or_default(),
        properties: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entity_from(code: &str, options: ProcessorOptions) -> Option<Entity> {
        let doclets = explain(code, Language::JavaScript).expect("explain failed");
        EntityExtractor::new(options).entity_from_doclets(
            Path::new("/ws/bus/entity.js"),
            &doclets,
            String::new(),
        )
    }

    fn function_names(entity: &Entity) -> Vec<&str> {
        entity.functions.iter().map(|f| f.name.as_str()).collect()
    }

    const LIFECYCLE: &str = r"
module.exports = {
    name: 'Worker',
    /** Starts. */
    init: function () {},
    close: function () {},
    _helper: function () {},
    helper_: function () {},
    run: function () {},
};
";

    #[test]
    fn object_literal_export_is_the_entity() {
        let entity = entity_from(
            r"
/** Greets. */
module.exports = {
    name: 'Greeter',
    hello: function () {},
};
",
            ProcessorOptions::default(),
        )
        .expect("entity");

        assert_eq!(entity.name, "Greeter");
        assert_eq!(entity.documentation, "Greets.");
        assert_eq!(entity.location, Location::new("/ws/bus/entity.js", 3));
        assert_eq!(function_names(&entity), vec!["hello"]);
        assert_eq!(entity.functions[0].location.line, 5);
    }

    #[test]
    fn identifier_export_resolves_to_named_element() {
        let entity = entity_from(
            r"
/** The logger. */
const LoggerImpl = {
    name: 'Logger',
    log: function (message) {},
};

/** Not this one. */
module.exports = LoggerImpl;
",
            ProcessorOptions::default(),
        )
        .expect("entity");

        assert_eq!(entity.name, "Logger");
        assert_eq!(entity.documentation, "The logger.");
        assert_eq!(entity.location.line, 3);
        assert_eq!(function_names(&entity), vec!["log"]);
    }

    #[test]
    fn missing_or_non_literal_name_is_not_an_entity() {
        let options = ProcessorOptions::default();
        assert_eq!(
            entity_from("module.exports = { hello: function () {} };", options),
            None
        );
        assert_eq!(
            entity_from("module.exports = { name: NAME, hello() {} };", options),
            None
        );
        assert_eq!(entity_from("module.exports = { name: '' };", options), None);
    }

    #[test]
    fn unresolvable_export_is_not_an_entity() {
        let options = ProcessorOptions::default();
        assert_eq!(entity_from("const x = { name: 'X' };", options), None);
        assert_eq!(entity_from("module.exports = Missing;", options), None);
        assert_eq!(
            entity_from("module.exports = create({ name: 'X' });", options),
            None
        );
    }

    #[test]
    fn escaped_names_are_decoded() {
        let entity = entity_from(
            r#"module.exports = { name: "Gr\"eeter", 'say\u0048i': function () {} };"#,
            ProcessorOptions::default(),
        )
        .expect("entity");

        assert_eq!(entity.name, "Gr\"eeter");
        assert_eq!(function_names(&entity), vec!["sayHi"]);
    }

    #[test]
    fn entity_without_functions_is_valid() {
        let entity = entity_from(
            "module.exports = { name: 'Empty', version: 2 };",
            ProcessorOptions::default(),
        )
        .expect("entity");
        assert!(entity.functions.is_empty());
    }

    #[test]
    fn lifecycle_and_underscore_functions_are_dropped_by_default() {
        let entity = entity_from(LIFECYCLE, ProcessorOptions::default()).expect("entity");
        assert_eq!(function_names(&entity), vec!["helper_", "run"]);
    }

    #[test]
    fn filters_can_be_disabled() {
        let entity = entity_from(LIFECYCLE, ProcessorOptions::keep_all()).expect("entity");
        assert_eq!(
            function_names(&entity),
            vec!["init", "close", "_helper", "helper_", "run"]
        );

        let entity = entity_from(
            LIFECYCLE,
            ProcessorOptions {
                drop_lifecycle_functions: false,
                drop_underscore_functions: true,
            },
        )
        .expect("entity");
        assert_eq!(function_names(&entity), vec!["init", "close", "helper_", "run"]);
    }

    #[test]
    fn instance_members_and_non_functions_are_excluded() {
        let entity = entity_from(
            r"
class Store {
    static name = 'Store';
    static create() {}
    add(item) {}
}
Store.prototype.remove = function () {};
Store.lookup = function () {};
Store.arrow = () => {};
Store.limit = 10;
module.exports = Store;
",
            ProcessorOptions::default(),
        )
        .expect("entity");

        assert_eq!(entity.name, "Store");
        assert_eq!(function_names(&entity), vec!["create", "lookup"]);
    }

    #[test]
    fn function_records_carry_documentation() {
        let entity = entity_from(
            r"
module.exports = {
    name: 'Mailer',
    /**
     * Sends a mail.
     *
     * @param {Object} mail - The mail
     * @param {string} mail.to - Recipient
     * @param {Object} mail.meta - Extra data
     * @param {number} mail.meta.priority - Priority
     * @param {Function} [callback] - Completion callback
     * @throws {Error} When the transport is down
     * @throws {TimeoutError}
     * @returns {Promise<string>} The message id
     * @returns {undefined} Ignored
     */
    send: function (mail, callback) {},
};
",
            ProcessorOptions::default(),
        )
        .expect("entity");

        let send = entity.function("send").expect("send");
        assert_eq!(send.documentation, "Sends a mail.");
        assert_eq!(send.returns, "The message id");
        assert_eq!(
            send.throws,
            vec![
                "When the transport is down".to_string(),
                "TimeoutError".to_string()
            ]
        );

        assert_eq!(send.parameters.len(), 2);
        let mail = &send.parameters[0];
        assert_eq!(mail.name, "mail");
        assert_eq!(mail.type_name, "Object");
        assert_eq!(mail.documentation, "The mail");
        assert_eq!(mail.properties.len(), 2);
        assert_eq!(mail.properties[0].name, "to");
        assert_eq!(mail.properties[1].name, "meta");
        assert_eq!(mail.properties[1].properties[0].name, "priority");
        assert_eq!(mail.properties[1].properties[0].type_name, "number");
        assert_eq!(send.parameters[1].name, "callback");
        assert!(send.parameters[1].properties.is_empty());
    }

    #[test]
    fn undocumented_functions_have_empty_metadata() {
        let entity = entity_from(
            "module.exports = { name: 'Bare', ping: function (a, b) {} };",
            ProcessorOptions::default(),
        )
        .expect("entity");

        let ping = entity.function("ping").expect("ping");
        assert_eq!(ping.documentation, "");
        assert!(ping.parameters.is_empty());
        assert!(ping.throws.is_empty());
        assert_eq!(ping.returns, "");
    }

    #[test]
    fn orphan_and_rest_parameters_keep_their_names() {
        let tags = vec![
            ParamTag {
                name: "options.flag".to_string(),
                ..Default::default()
            },
            ParamTag {
                name: "...rest".to_string(),
                ..Default::default()
            },
            ParamTag {
                name: "items[].id".to_string(),
                ..Default::default()
            },
        ];

        let names: Vec<_> = parameters_from_tags(&tags)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["options.flag", "...rest", "items[].id"]);
    }

    #[test]
    fn redefined_members_keep_the_last_definition() {
        let entity = entity_from(
            r"
const Impl = { name: 'Twice', run: function () {} };
/** Second. */
Impl.run = function () {};
module.exports = Impl;
",
            ProcessorOptions::default(),
        )
        .expect("entity");

        assert_eq!(entity.functions.len(), 1);
        assert_eq!(entity.functions[0].documentation, "Second.");
    }

    #[tokio::test]
    async fn extract_reads_file_and_service() {
        let temp = tempfile::tempdir().unwrap();
        let bus = temp.path().join("src").join("bus");
        std::fs::create_dir_all(&bus).unwrap();
        std::fs::write(temp.path().join("package.json"), br#"{"name": "svc"}"#).unwrap();
        let path = bus.join("greeter.js");
        std::fs::write(&path, "module.exports = { name: 'Greeter', hi: function () {} };")
            .unwrap();

        let entity = EntityExtractor::default()
            .extract(&path)
            .await
            .unwrap()
            .expect("entity");
        assert_eq!(entity.service, "svc");
        assert_eq!(entity.location.path, path);
    }

    #[tokio::test]
    async fn extract_fails_on_syntax_errors() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.js");
        std::fs::write(&path, "module.exports = { name: 'Broken',").unwrap();

        let result = EntityExtractor::default().extract(&path).await;
        assert!(matches!(result, Err(RegistryError::DocletError(_))));
    }
}
