//! Literal inlining of bound values for backends that take plain SQL text.
//!
//! ClickHouse over HTTP has no positional binding, so `$p1`, `$p2`, ...
//! placeholders are replaced by escaped literals right before execution.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterSubstitutionError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unsupported parameter type for value: {0}")]
    UnsupportedType(String),
}

/// Escape a string for a single-quoted ClickHouse literal.
///
/// Backslash is replaced first so the escapes added afterwards stay intact.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "\\0")
}

fn format_parameter(value: &Value) -> Result<String, ParameterSubstitutionError> {
    match value {
        Value::String(s) => Ok(format!("'{}'", escape_string(s))),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Ok(i.to_string()),
            (None, Some(u), _) => Ok(u.to_string()),
            (None, None, Some(f)) if f.is_finite() => Ok(f.to_string()),
            _ => Err(ParameterSubstitutionError::UnsupportedType(n.to_string())),
        },
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(format_parameter)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Null => Ok("NULL".to_string()),
        Value::Object(_) => Err(ParameterSubstitutionError::UnsupportedType(
            "Object/Map parameters not supported".to_string(),
        )),
    }
}

/// Name the `index`-th positional value (1-based) the way placeholders do
pub fn positional_name(index: usize) -> String {
    format!("p{}", index)
}

pub fn positional_parameters(params: &[Value]) -> HashMap<String, Value> {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| (positional_name(i + 1), value.clone()))
        .collect()
}

/// Replace every `$name` placeholder with its escaped literal.
///
/// A `$` not followed by a name character is kept as is. Text inside
/// single-quoted literals is copied verbatim.
pub fn substitute_parameters(
    sql: &str,
    parameters: &HashMap<String, Value>,
) -> Result<String, ParameterSubstitutionError> {
    let mut result = String::with_capacity(sql.len() * 2);
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(ch) = chars.next() {
        if ch == '\'' {
            in_literal = !in_literal;
            result.push(ch);
            continue;
        }
        if in_literal {
            result.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            }
            continue;
        }
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if name.is_empty() {
            result.push('$');
            continue;
        }
        let value = parameters
            .get(&name)
            .ok_or(ParameterSubstitutionError::MissingParameter(name))?;
        result.push_str(&format_parameter(value)?);
    }

    Ok(result)
}

/// Inline positional values into `$p1`-style SQL
pub fn inline_positional(sql: &str, params: &[Value]) -> Result<String, ParameterSubstitutionError> {
    substitute_parameters(sql, &positional_parameters(params))
}
