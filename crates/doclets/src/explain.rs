use crate::comment::{is_doc_comment, parse_doc_comment};
use crate::doclet::{CodeKind, DocComment, Doclet, DocletMeta, MODULE_EXPORTS};
use crate::error::{DocletError, Result};
use crate::language::Language;
use tree_sitter::{Node, Parser};

/// Tree-sitter backed producer of JSDoc-style doclets
pub struct DocletParser {
    parser: Parser,
    language: Language,
}

impl DocletParser {
    /// Create new parser for a language
    pub fn new(language: Language) -> Result<Self> {
        if !language.supports_ast() {
            return Err(DocletError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| DocletError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self { parser, language })
    }

    /// Parse source and return its doclets in source order.
    ///
    /// Source with syntax errors is rejected rather than explained partially.
    pub fn explain(&mut self, source: &str) -> Result<Vec<Doclet>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| DocletError::parse("Failed to parse source code"))?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(DocletError::parse(format!("Syntax error near line {line}")));
        }

        let mut emitter = Emitter::new(source);
        emitter.program(root);

        log::debug!(
            "Explained {} source into {} doclets",
            self.language.as_str(),
            emitter.doclets.len()
        );
        Ok(emitter.doclets)
    }
}

/// Explain a source string in one call
pub fn explain(source: &str, language: Language) -> Result<Vec<Doclet>> {
    DocletParser::new(language)?.explain(source)
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}

/// Walks a syntax tree and records one doclet per named construct
struct Emitter<'a> {
    source: &'a str,
    doclets: Vec<Doclet>,
}

impl<'a> Emitter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            doclets: Vec::new(),
        }
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    fn program(&mut self, root: Node) {
        let mut cursor = root.walk();
        let children: Vec<_> = root.named_children(&mut cursor).collect();

        for child in children {
            self.statement(child, child);
        }
    }

    /// `anchor` is the node a leading doc comment would precede
    fn statement(&mut self, node: Node, anchor: Node) {
        match node.kind() {
            "expression_statement" => {
                if let Some(expr) = node.named_child(0) {
                    if expr.kind() == "assignment_expression" {
                        self.assignment(expr, anchor);
                    }
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                let declarators: Vec<_> = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "variable_declarator")
                    .collect();

                for (index, declarator) in declarators.into_iter().enumerate() {
                    let (Some(name), Some(value)) = (
                        declarator.child_by_field_name("name"),
                        declarator.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    if name.kind() != "identifier" {
                        continue;
                    }

                    // Only the first declarator of a statement owns its comment
                    let comment_anchor = (index == 0).then_some(anchor);
                    let longname = self.text(name).to_string();
                    self.value(longname, comment_anchor, declarator, value);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let longname = self.text(name).to_string();
                    self.emit(longname, Some(anchor), node, CodeKind::FunctionDeclaration);
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let longname = self.text(name).to_string();
                    self.emit(longname.clone(), Some(anchor), node, CodeKind::Class);
                    self.class_members(&longname, node);
                }
            }
            "export_statement" => self.export(node),
            _ => {}
        }
    }

    /// ES module exports: `export default <value>` is the module's exported value
    fn export(&mut self, node: Node) {
        let is_default = has_token(node, "default");

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.statement(declaration, node);

            if is_default {
                if let Some(name) = declaration.child_by_field_name("name") {
                    let value = self.text(name).to_string();
                    self.emit(
                        MODULE_EXPORTS.to_string(),
                        None,
                        node,
                        CodeKind::Identifier { value },
                    );
                }
            }
        } else if let Some(value) = node.child_by_field_name("value") {
            if is_default {
                self.value(MODULE_EXPORTS.to_string(), Some(node), node, value);
            }
        }
    }

    /// `target = value` at statement level
    fn assignment(&mut self, expr: Node, anchor: Node) {
        let (Some(left), Some(right)) = (
            expr.child_by_field_name("left"),
            expr.child_by_field_name("right"),
        ) else {
            return;
        };

        if let Some(longname) = self.member_path(left) {
            self.value(longname, Some(anchor), expr, right);
        }
    }

    /// Dotted longname of an assignment target, JSDoc-normalized
    fn member_path(&self, node: Node) -> Option<String> {
        let path = self.raw_member_path(node)?;

        let path = if path == "exports" {
            MODULE_EXPORTS.to_string()
        } else if let Some(rest) = path.strip_prefix("exports.") {
            format!("{MODULE_EXPORTS}.{rest}")
        } else {
            path
        };

        Some(path.replace(".prototype.", "#"))
    }

    fn raw_member_path(&self, node: Node) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.text(node).to_string()),
            "member_expression" => {
                let object = node.child_by_field_name("object")?;
                let property = node.child_by_field_name("property")?;
                if property.kind() != "property_identifier" {
                    return None;
                }
                let object = self.raw_member_path(object)?;
                Some(format!("{object}.{}", self.text(property)))
            }
            _ => None,
        }
    }

    /// Record a doclet for `value` under `longname`, then descend into its members
    fn value(&mut self, longname: String, anchor: Option<Node>, site: Node, value: Node) {
        let value = unwrap_expression(value);
        let code = self.code_kind(value);
        self.emit(longname.clone(), anchor, site, code);

        match value.kind() {
            "object" => self.object_members(&longname, value),
            "class" => self.class_members(&longname, value),
            _ => {}
        }
    }

    fn object_members(&mut self, parent: &str, object: Node) {
        let prefix = member_prefix(parent);
        let mut cursor = object.walk();
        let children: Vec<_> = object.named_children(&mut cursor).collect();

        for child in children {
            match child.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        child.child_by_field_name("key"),
                        child.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    let Some(key) = self.property_key(key) else {
                        continue;
                    };
                    self.value(format!("{prefix}{key}"), Some(child), child, value);
                }
                "method_definition" => {
                    if is_accessor(child) {
                        continue;
                    }
                    let Some(name) = child
                        .child_by_field_name("name")
                        .and_then(|name| self.property_key(name))
                    else {
                        continue;
                    };
                    self.emit(
                        format!("{prefix}{name}"),
                        Some(child),
                        child,
                        CodeKind::FunctionExpression,
                    );
                }
                "shorthand_property_identifier" => {
                    let name = self.text(child).to_string();
                    self.emit(
                        format!("{prefix}{name}"),
                        Some(child),
                        child,
                        CodeKind::Identifier { value: name },
                    );
                }
                _ => {}
            }
        }
    }

    fn class_members(&mut self, class_name: &str, class_node: Node) {
        let Some(body) = class_node.child_by_field_name("body") else {
            return;
        };

        let mut cursor = body.walk();
        let members: Vec<_> = body.named_children(&mut cursor).collect();

        for member in members {
            match member.kind() {
                "method_definition" => {
                    if is_accessor(member) {
                        continue;
                    }
                    let Some(name) = member
                        .child_by_field_name("name")
                        .and_then(|name| self.property_key(name))
                    else {
                        continue;
                    };

                    if name == "constructor" {
                        self.constructor_fields(class_name, member);
                        continue;
                    }

                    let separator = if is_static(member) { '.' } else { '#' };
                    self.emit(
                        format!("{class_name}{separator}{name}"),
                        Some(member),
                        member,
                        CodeKind::FunctionExpression,
                    );
                }
                "field_definition" | "public_field_definition" => {
                    let Some(name) = member
                        .child_by_field_name("property")
                        .or_else(|| member.child_by_field_name("name"))
                        .and_then(|name| self.property_key(name))
                    else {
                        continue;
                    };

                    let separator = if is_static(member) { '.' } else { '#' };
                    let longname = format!("{class_name}{separator}{name}");
                    match member.child_by_field_name("value") {
                        Some(value) => self.value(longname, Some(member), member, value),
                        None => self.emit(
                            longname,
                            Some(member),
                            member,
                            CodeKind::Other {
                                node_kind: member.kind().to_string(),
                            },
                        ),
                    }
                }
                _ => {}
            }
        }
    }

    /// `this.field = value` statements directly inside a constructor body
    fn constructor_fields(&mut self, class_name: &str, constructor: Node) {
        let Some(body) = constructor.child_by_field_name("body") else {
            return;
        };

        let mut cursor = body.walk();
        let statements: Vec<_> = body.named_children(&mut cursor).collect();

        for statement in statements {
            if statement.kind() != "expression_statement" {
                continue;
            }
            let Some(expr) = statement
                .named_child(0)
                .filter(|expr| expr.kind() == "assignment_expression")
            else {
                continue;
            };
            let (Some(left), Some(right)) = (
                expr.child_by_field_name("left"),
                expr.child_by_field_name("right"),
            ) else {
                continue;
            };
            if left.kind() != "member_expression" {
                continue;
            }
            let (Some(object), Some(property)) = (
                left.child_by_field_name("object"),
                left.child_by_field_name("property"),
            ) else {
                continue;
            };
            if object.kind() != "this" || property.kind() != "property_identifier" {
                continue;
            }

            let longname = format!("{class_name}#{}", self.text(property));
            self.value(longname, Some(statement), expr, right);
        }
    }

    fn property_key(&self, key: Node) -> Option<String> {
        match key.kind() {
            "property_identifier" | "identifier" | "number" => Some(self.text(key).to_string()),
            "string" => Some(string_value(self.text(key))),
            _ => None,
        }
    }

    /// The single translation point from tree-sitter node kinds to [`CodeKind`]
    fn code_kind(&self, node: Node) -> CodeKind {
        match node.kind() {
            "object" => CodeKind::ObjectLiteral,
            "function_expression" | "function" | "generator_function" => {
                CodeKind::FunctionExpression
            }
            "arrow_function" => CodeKind::ArrowFunction,
            "class" => CodeKind::Class,
            "identifier" | "undefined" => CodeKind::Identifier {
                value: self.text(node).to_string(),
            },
            "string" => CodeKind::Literal {
                value: string_value(self.text(node)),
            },
            "number" | "true" | "false" | "null" => CodeKind::Literal {
                value: self.text(node).to_string(),
            },
            other => CodeKind::Other {
                node_kind: other.to_string(),
            },
        }
    }

    /// Nearest `/** */` block in the run of comments directly before `node`
    fn leading_comment(&self, node: Node) -> Option<DocComment> {
        let mut current = node.prev_sibling();

        while let Some(sibling) = current {
            if sibling.kind() != "comment" {
                return None;
            }
            let text = self.text(sibling);
            if is_doc_comment(text) {
                return Some(parse_doc_comment(text));
            }
            current = sibling.prev_sibling();
        }

        None
    }

    fn emit(&mut self, longname: String, anchor: Option<Node>, site: Node, code: CodeKind) {
        let meta = DocletMeta {
            lineno: site.start_position().row + 1,
            code,
        };

        let doclet = Doclet::new(longname, meta);
        let doclet = match anchor.and_then(|node| self.leading_comment(node)) {
            Some(comment) => doclet.with_comment(comment),
            None => doclet,
        };

        self.doclets.push(doclet);
    }
}

/// Members of `X.prototype` are instance members of `X`
fn member_prefix(parent: &str) -> String {
    match parent.strip_suffix(".prototype") {
        Some(owner) => format!("{owner}#"),
        None => format!("{parent}."),
    }
}

/// Look through parentheses and TypeScript-only wrappers
fn unwrap_expression(node: Node) -> Node {
    match node.kind() {
        "parenthesized_expression" | "as_expression" | "satisfies_expression"
        | "non_null_expression" => node
            .named_child(0)
            .map(unwrap_expression)
            .unwrap_or(node),
        _ => node,
    }
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

fn is_static(node: Node) -> bool {
    has_token(node, "static")
}

fn is_accessor(node: Node) -> bool {
    has_token(node, "get") || has_token(node, "set")
}

/// Runtime value of a string literal: quotes removed, escapes decoded
fn string_value(text: &str) -> String {
    let inner = unquote(text);
    if !inner.contains('\\') {
        return inner.to_string();
    }

    let mut decoded = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            decoded.push(ch);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };

        match escaped {
            'n' => decoded.push('\n'),
            't' => decoded.push('\t'),
            'r' => decoded.push('\r'),
            'b' => decoded.push('\u{8}'),
            'f' => decoded.push('\u{c}'),
            'v' => decoded.push('\u{b}'),
            '0' => decoded.push('\0'),
            'x' => push_code_point(&mut decoded, read_hex(&mut chars, 2)),
            'u' => match read_unicode_escape(&mut chars) {
                Some(high @ 0xD800..=0xDBFF) => {
                    // Surrogate pair spelled as two \u escapes
                    let mut lookahead = chars.clone();
                    let low = (lookahead.next() == Some('\\') && lookahead.next() == Some('u'))
                        .then(|| read_unicode_escape(&mut lookahead))
                        .flatten()
                        .filter(|low| (0xDC00..=0xDFFF).contains(low));
                    match low {
                        Some(low) => {
                            chars = lookahead;
                            push_code_point(
                                &mut decoded,
                                Some(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)),
                            );
                        }
                        None => push_code_point(&mut decoded, None),
                    }
                }
                unit => push_code_point(&mut decoded, unit),
            },
            // Line continuations contribute nothing
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => decoded.push(other),
        }
    }

    decoded
}

type CharStream<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// `XXXX` or `{X...}` after a `\u`
fn read_unicode_escape(chars: &mut CharStream) -> Option<u32> {
    if chars.peek() != Some(&'{') {
        return read_hex(chars, 4);
    }

    chars.next();
    let mut digits = String::new();
    for ch in chars.by_ref() {
        if ch == '}' {
            return u32::from_str_radix(&digits, 16).ok();
        }
        digits.push(ch);
    }
    None
}

fn read_hex(chars: &mut CharStream, len: usize) -> Option<u32> {
    let digits: String = chars.by_ref().take(len).collect();
    if digits.len() != len {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

fn push_code_point(out: &mut String, code_point: Option<u32>) {
    out.push(
        code_point
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER),
    );
}

fn unquote(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open @ ('"' | '\'' | '`')), Some(close)) if open == close && text.len() >= 2 => {
            &text[1..text.len() - 1]
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doclet::Scope;
    use pretty_assertions::assert_eq;

    fn explain_js(code: &str) -> Vec<Doclet> {
        explain(code, Language::JavaScript).expect("explain failed")
    }

    fn find<'d>(doclets: &'d [Doclet], longname: &str) -> &'d Doclet {
        doclets
            .iter()
            .find(|d| d.longname == longname)
            .unwrap_or_else(|| panic!("missing doclet {longname}"))
    }

    #[test]
    fn object_literal_export_produces_members() {
        let doclets = explain_js(
            r"
/** Greets people. */
module.exports = {
    name: 'Greeter',

    /**
     * Says hello.
     * @param {string} name - Who
     */
    hello: function (name) {},

    bye(name) {},

    arrow: () => 1,
};
",
        );

        let exports = find(&doclets, "module.exports");
        assert_eq!(exports.code(), &CodeKind::ObjectLiteral);
        assert_eq!(exports.description.as_deref(), Some("Greets people."));
        assert_eq!(exports.line(), 3);

        let name = find(&doclets, "module.exports.name");
        assert_eq!(name.code().literal_value(), Some("Greeter"));
        assert!(name.undocumented);

        let hello = find(&doclets, "module.exports.hello");
        assert_eq!(hello.code(), &CodeKind::FunctionExpression);
        assert_eq!(hello.description.as_deref(), Some("Says hello."));
        assert_eq!(hello.params[0].name, "name");
        assert_eq!(hello.memberof.as_deref(), Some("module.exports"));
        assert_eq!(hello.scope, Scope::Static);

        assert_eq!(
            find(&doclets, "module.exports.bye").code(),
            &CodeKind::FunctionExpression
        );
        assert_eq!(
            find(&doclets, "module.exports.arrow").code(),
            &CodeKind::ArrowFunction
        );
    }

    #[test]
    fn identifier_export_references_declaration() {
        let doclets = explain_js(
            r"
const LoggerImpl = {
    name: 'Logger',
    log: function (message) {},
};

LoggerImpl.flush = function () {};

module.exports = LoggerImpl;
",
        );

        assert_eq!(find(&doclets, "LoggerImpl").code(), &CodeKind::ObjectLiteral);
        assert_eq!(find(&doclets, "LoggerImpl").name, "LoggerImpl");
        assert_eq!(
            find(&doclets, "LoggerImpl.flush").code(),
            &CodeKind::FunctionExpression
        );
        assert_eq!(
            find(&doclets, "module.exports").code().identifier(),
            Some("LoggerImpl")
        );
    }

    #[test]
    fn class_members_are_scoped() {
        let doclets = explain_js(
            r"
class Store {
    static name = 'Store';

    constructor() {
        this.items = [];
    }

    /** Adds an item. */
    add(item) {}

    static create() {}

    get size() { return 0; }
}
module.exports = Store;
",
        );

        assert_eq!(find(&doclets, "Store").code(), &CodeKind::Class);
        assert_eq!(
            find(&doclets, "Store.name").code().literal_value(),
            Some("Store")
        );
        assert!(find(&doclets, "Store#add").is_instance_scoped());
        assert_eq!(
            find(&doclets, "Store#add").description.as_deref(),
            Some("Adds an item.")
        );
        assert_eq!(find(&doclets, "Store.create").scope, Scope::Static);
        assert_eq!(find(&doclets, "Store#items").scope, Scope::Instance);
        assert!(doclets.iter().all(|d| d.name != "size"));
        assert!(doclets.iter().all(|d| d.name != "constructor"));
    }

    #[test]
    fn prototype_and_exports_aliases_are_normalized() {
        let doclets = explain_js(
            r"
function Queue() {}
Queue.prototype.push = function (item) {};
exports.version = '1.0';
",
        );

        assert_eq!(find(&doclets, "Queue").code(), &CodeKind::FunctionDeclaration);
        assert!(find(&doclets, "Queue#push").is_instance_scoped());
        assert_eq!(
            find(&doclets, "module.exports.version").code().literal_value(),
            Some("1.0")
        );
    }

    #[test]
    fn only_doc_blocks_directly_before_a_construct_attach() {
        let doclets = explain_js(
            r"
/** Detached. */
const unrelated = 1;

/* plain block */
const Plain = {};

/** Documented. */
// trailing note
const Documented = {};
",
        );

        assert_eq!(
            find(&doclets, "unrelated").description.as_deref(),
            Some("Detached.")
        );
        assert!(find(&doclets, "Plain").undocumented);
        assert_eq!(
            find(&doclets, "Documented").description.as_deref(),
            Some("Documented.")
        );
    }

    #[test]
    fn esm_default_export_is_module_exports() {
        let doclets = explain_js("export default { name: 'Esm', run() {} };\n");

        assert_eq!(find(&doclets, "module.exports").code(), &CodeKind::ObjectLiteral);
        assert_eq!(
            find(&doclets, "module.exports.name").code().literal_value(),
            Some("Esm")
        );
    }

    #[test]
    fn string_literals_are_unescaped() {
        let doclets = explain_js(
            r#"
module.exports = {
    name: "Gr\"eeter",
    'it\'s': 'a\tb\\c',
    accents: '\u00e9\x41\u{1F600}',
    pair: '\uD83D\uDE00',
    plain: 'no escapes',
};
"#,
        );

        assert_eq!(
            find(&doclets, "module.exports.name").code().literal_value(),
            Some("Gr\"eeter")
        );
        assert_eq!(
            find(&doclets, "module.exports.it's").code().literal_value(),
            Some("a\tb\\c")
        );
        assert_eq!(
            find(&doclets, "module.exports.accents").code().literal_value(),
            Some("\u{e9}A\u{1F600}")
        );
        assert_eq!(
            find(&doclets, "module.exports.pair").code().literal_value(),
            Some("\u{1F600}")
        );
        assert_eq!(
            find(&doclets, "module.exports.plain").code().literal_value(),
            Some("no escapes")
        );
    }

    #[test]
    fn line_continuations_are_dropped() {
        assert_eq!(string_value("'one \\\ntwo'"), "one two");
        assert_eq!(string_value("'\\q'"), "q");
    }

    #[test]
    fn syntax_errors_are_rejected() {
        let result = explain("module.exports = {\n  name: 'Broken',\n", Language::JavaScript);
        assert!(matches!(result, Err(DocletError::ParseError(_))));
    }

    #[test]
    fn typescript_sources_are_explained() {
        let doclets = explain(
            r"
const Api = {
    name: 'Api' as const,
    call: function (id: string): number { return 1; },
};
module.exports = Api;
",
            Language::TypeScript,
        )
        .expect("typescript explain failed");

        assert_eq!(find(&doclets, "Api.name").code().literal_value(), Some("Api"));
        assert_eq!(
            find(&doclets, "Api.call").code(),
            &CodeKind::FunctionExpression
        );
    }

    #[test]
    fn unsupported_language_is_an_error() {
        assert!(DocletParser::new(Language::Unknown).is_err());
    }
}
