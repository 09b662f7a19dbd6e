//! JSDoc block comment parsing.
//!
//! Only the tags the registry consumes are interpreted: `@param`, `@throws`,
//! `@returns` and `@description`. Anything else is skipped.

use crate::doclet::{DocComment, ParamTag, TypedTag};

/// Check whether a raw comment is a `/** ... */` documentation block
pub fn is_doc_comment(text: &str) -> bool {
    text.len() > 4 && text.starts_with("/**") && !text.starts_with("/***") && text.ends_with("*/")
}

/// Parse a raw `/** ... */` block into description and tags
pub fn parse_doc_comment(text: &str) -> DocComment {
    let body = text
        .strip_prefix("/**")
        .and_then(|rest| rest.strip_suffix("*/"))
        .unwrap_or(text);

    let mut description_lines = Vec::new();
    let mut tags: Vec<(String, Vec<&str>)> = Vec::new();

    for raw_line in body.lines() {
        let line = strip_leading_star(raw_line);

        if let Some(tag_line) = line.trim_start().strip_prefix('@') {
            let (tag, rest) = tag_line
                .split_once(char::is_whitespace)
                .unwrap_or((tag_line, ""));
            tags.push((tag.to_string(), vec![rest]));
        } else if let Some((_, lines)) = tags.last_mut() {
            lines.push(line);
        } else {
            description_lines.push(line);
        }
    }

    let mut comment = DocComment {
        description: non_empty(&description_lines.join("\n")),
        ..Default::default()
    };

    for (tag, lines) in tags {
        let content = lines.join("\n");
        match tag.as_str() {
            "param" | "arg" | "argument" => {
                if let Some(param) = parse_param(&content) {
                    comment.params.push(param);
                }
            }
            "throws" | "exception" => comment.exceptions.push(parse_typed(&content)),
            "returns" | "return" => comment.returns.push(parse_typed(&content)),
            "description" | "desc" => {
                if let Some(description) = non_empty(&content) {
                    comment.description = Some(description);
                }
            }
            _ => {}
        }
    }

    comment
}

/// Strip the decorative ` * ` gutter from a comment line
fn strip_leading_star(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix('*') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => trimmed,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `{type} name - description`, `{type} [name=default] description`
fn parse_param(content: &str) -> Option<ParamTag> {
    let (type_names, rest) = split_type(content);
    let rest = rest.trim_start();
    let optional = rest.starts_with('[');

    let (raw_name, rest) = if let Some(inner) = rest.strip_prefix('[') {
        let end = matching_bracket(inner)?;
        (&inner[..end], &inner[end + 1..])
    } else {
        rest.split_once(char::is_whitespace).unwrap_or((rest, ""))
    };

    let (name, default_value) = match raw_name.split_once('=') {
        Some((name, default)) => (name.trim(), non_empty(default)),
        None => (raw_name.trim(), None),
    };
    if name.is_empty() {
        return None;
    }

    Some(ParamTag {
        name: name.to_string(),
        type_names,
        description: strip_separator(rest),
        optional,
        default_value,
    })
}

/// `{type} description` or just `description`
fn parse_typed(content: &str) -> TypedTag {
    let (type_names, rest) = split_type(content);
    TypedTag {
        type_names,
        description: strip_separator(rest),
    }
}

fn strip_separator(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let trimmed = trimmed.strip_prefix('-').unwrap_or(trimmed);
    non_empty(trimmed)
}

/// Split a leading `{type expression}` off a tag body
fn split_type(content: &str) -> (Vec<String>, &str) {
    let trimmed = content.trim_start();
    let Some(inner) = trimmed.strip_prefix('{') else {
        return (Vec::new(), content);
    };

    let mut depth = 1usize;
    for (index, ch) in inner.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (split_union(&inner[..index]), &inner[index + 1..]);
                }
            }
            _ => {}
        }
    }

    // Unbalanced braces: treat the whole body as description
    (Vec::new(), content)
}

/// `A|B`, `(A|B)`, `Array.<A|B>` split at top-level pipes only
fn split_union(expression: &str) -> Vec<String> {
    let mut expression = expression.trim();
    if encloses_whole(expression) {
        expression = &expression[1..expression.len() - 1];
    }

    let mut names = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut previous = None;
    for (index, ch) in expression.char_indices() {
        match ch {
            // Arrow of a function type, not a closing bracket
            '>' if previous == Some('=') => {}
            '(' | '<' | '{' | '[' => depth += 1,
            ')' | '>' | '}' | ']' => depth -= 1,
            '|' if depth == 0 => {
                names.push(expression[start..index].trim().to_string());
                start = index + 1;
            }
            _ => {}
        }
        previous = Some(ch);
    }
    names.push(expression[start..].trim().to_string());
    names.retain(|name| !name.is_empty());
    names
}

/// `(A|B)` but not `(A) | (B)` or `(a: A) => B`
fn encloses_whole(expression: &str) -> bool {
    if !expression.starts_with('(') || !expression.ends_with(')') {
        return false;
    }

    let mut depth = 0usize;
    for (index, ch) in expression.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index == expression.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Index of the `]` closing an optional parameter name (defaults may contain brackets)
fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (index, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}
