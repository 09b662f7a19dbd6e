//! # Harconist Doclets
//!
//! JSDoc-style documentation elements ("doclets") for JavaScript and
//! TypeScript sources.
//!
//! ## Output shape
//!
//! Explaining a file yields a flat, source-ordered list. Each doclet carries a
//! fully qualified `longname`, the parsed doc comment (if one directly
//! precedes the construct) and a typed [`CodeKind`] describing the construct
//! itself:
//!
//! ```text
//! /** Greets people. */
//! module.exports = {              module.exports        ObjectLiteral
//!     name: 'Greeter',            module.exports.name   Literal("Greeter")
//!     /** @param {string} who */
//!     hello: function (who) {},   module.exports.hello  FunctionExpression
//! };
//! ```
//!
//! Longname separators follow JSDoc: `.` for static members, `#` for
//! instance (prototype) members, `~` for inner members.
//!
//! ## Example
//!
//! ```rust
//! use harconist_doclets::{explain, CodeKind, Language};
//!
//! let code = "module.exports = { name: 'Greeter', hello: function () {} };";
//! let doclets = explain(code, Language::JavaScript).unwrap();
//!
//! let name = doclets
//!     .iter()
//!     .find(|d| d.longname == "module.exports.name")
//!     .unwrap();
//! assert_eq!(name.code().literal_value(), Some("Greeter"));
//! ```

mod comment;
mod doclet;
mod error;
mod explain;
mod language;

pub use comment::{is_doc_comment, parse_doc_comment};
pub use doclet::{
    CodeKind, DocComment, Doclet, DocletMeta, ParamTag, Scope, TypedTag, MODULE_EXPORTS,
};
pub use error::{DocletError, Result};
pub use explain::{explain, DocletParser};
pub use language::Language;
