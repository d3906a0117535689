//! Diagnostic types and message formatting.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity classification for diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A located, formatted checker finding. Ordering across a file follows
/// tree pre-order, never positional sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based line.
    pub line: usize,
    /// 0-based byte column.
    pub column: usize,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Stable error descriptor a checker yields findings against: a code plus
/// a `{field}`-style message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSpec {
    pub code: &'static str,
    pub template: &'static str,
    pub severity: Severity,
}

impl ErrorSpec {
    pub const fn new(code: &'static str, template: &'static str) -> Self {
        Self {
            code,
            template,
            severity: Severity::Warning,
        }
    }

    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// How the final message line is assembled from code and rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MessageStyle {
    /// `"<code> <text>"`.
    #[default]
    Plain,
    /// `"<tag><code> <text>"` — the older wire format that glues an
    /// error-source tag in front of the code.
    Tagged(String),
}

impl MessageStyle {
    pub fn format(&self, code: &str, text: &str) -> String {
        match self {
            MessageStyle::Plain => format!("{code} {text}"),
            MessageStyle::Tagged(tag) => format!("{tag}{code} {text}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("message template references unknown field `{name}`")]
    MissingField { name: String },

    #[error("message template has an unterminated field")]
    UnterminatedField,
}

/// Substitute `{name}` fields from `fields` into `template`. `{{` and
/// `}}` escape literal braces; an unknown field is a checker-runtime
/// fault, not a silently empty substitution.
pub fn render_template(
    template: &str,
    fields: &BTreeMap<String, String>,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '{' => {
                if template[i + 1..].starts_with('{') {
                    out.push('{');
                    chars.next();
                    continue;
                }
                let rest = &template[i + 1..];
                let end = rest.find('}').ok_or(RenderError::UnterminatedField)?;
                let name = &rest[..end];
                let value = fields.get(name).ok_or_else(|| RenderError::MissingField {
                    name: name.to_string(),
                })?;
                out.push_str(value);
                for _ in 0..name.chars().count() + 1 {
                    chars.next();
                }
            }
            '}' => {
                if template[i + 1..].starts_with('}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}
