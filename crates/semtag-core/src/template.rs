//! Version templates for commit messages, tag names and file searches.
//!
//! Templates are plain text with two recognised actions, `{{.Current}}` and
//! `{{.Next}}` (whitespace inside the braces is allowed). There is no other
//! logic: anything else between `{{` and `}}` is a parse error.
//!
//! File rules only carry a *search* template. The replacement is inferred
//! from it by turning every `Current` into `Next`, so the two differ only in
//! which version they mention. For that inference to be unambiguous a search
//! template must mention `Current` exactly once and never mention `Next`.

use std::fmt;

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;

use crate::config::FileRule;
use crate::version::SemanticVersion;

/// Errors from parsing or validating a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{{` was never closed.
    #[error("could not parse {field}: unclosed action starting at byte {offset}")]
    Unclosed {
        /// Which template failed (e.g. `git.tag-template`).
        field: String,
        /// Byte offset of the opening braces.
        offset: usize,
    },

    /// An action other than `.Current` or `.Next`.
    #[error(
        "could not parse {field}: unknown placeholder {{{{{placeholder}}}}} (expected {{{{.Current}}}} or {{{{.Next}}}})"
    )]
    UnknownPlaceholder {
        /// Which template failed.
        field: String,
        /// The text between the braces, trimmed.
        placeholder: String,
    },

    /// A search template must mention `{{.Current}}` exactly once.
    #[error("{field} must reference {{{{.Current}}}} exactly once, found {count}")]
    CurrentCount {
        /// Which template failed.
        field: String,
        /// How many `Current` references it has.
        count: usize,
    },

    /// A search template mentions `{{.Next}}`.
    #[error("{field} must not reference {{{{.Next}}}}")]
    NextInSearch {
        /// Which template failed.
        field: String,
    },
}

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// One of the two template variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The version being bumped from.
    Current,
    /// The version being bumped to.
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(Placeholder),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    field: String,
    segments: Vec<Segment>,
}

/// Concrete values substituted into templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    /// Text for `{{.Current}}`.
    pub current: String,
    /// Text for `{{.Next}}`.
    pub next: String,
}

impl TemplateVars {
    /// Variables for a bump from `current` to `next`.
    pub fn new(current: &SemanticVersion, next: &SemanticVersion) -> Self {
        Self {
            current: current.to_string(),
            next: next.to_string(),
        }
    }
}

/// A file rule with both of its templates rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    /// Path relative to the project root.
    pub path: Utf8PathBuf,
    /// Literal text to look for.
    pub search: String,
    /// Literal text to put in its place.
    pub replace: String,
}

impl Template {
    /// Parse `source`. `field` names the template in error messages.
    pub fn parse(field: impl Into<String>, source: &str) -> TemplateResult<Self> {
        let field = field.into();
        let mut segments = Vec::new();
        let mut rest = source;
        let mut consumed = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let inner = &rest[open + 2..];
            let Some(close) = inner.find("}}") else {
                return Err(TemplateError::Unclosed {
                    field,
                    offset: consumed + open,
                });
            };
            let placeholder = match inner[..close].trim() {
                ".Current" => Placeholder::Current,
                ".Next" => Placeholder::Next,
                other => {
                    return Err(TemplateError::UnknownPlaceholder {
                        field,
                        placeholder: other.to_string(),
                    });
                }
            };
            segments.push(Segment::Var(placeholder));

            let step = open + 2 + close + 2;
            consumed += step;
            rest = &rest[step..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { field, segments })
    }

    /// Parse a file search template and check that it can drive an
    /// inferred replacement.
    pub fn parse_search(field: impl Into<String>, source: &str) -> TemplateResult<Self> {
        let template = Self::parse(field, source)?;
        if template.count(Placeholder::Next) > 0 {
            return Err(TemplateError::NextInSearch {
                field: template.field,
            });
        }
        let count = template.count(Placeholder::Current);
        if count != 1 {
            return Err(TemplateError::CurrentCount {
                field: template.field,
                count,
            });
        }
        Ok(template)
    }

    /// The name this template reports errors under.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// How many times `placeholder` appears.
    pub fn count(&self, placeholder: Placeholder) -> usize {
        self.segments
            .iter()
            .filter(|segment| **segment == Segment::Var(placeholder))
            .count()
    }

    /// The replacement template: this template with every `Current` turned
    /// into `Next`.
    pub fn inferred_replace(&self) -> Self {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Var(Placeholder::Current) => Segment::Var(Placeholder::Next),
                other => other.clone(),
            })
            .collect();
        Self {
            field: self.field.clone(),
            segments,
        }
    }

    /// Substitute the variables.
    pub fn render(&self, vars: &TemplateVars) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(Placeholder::Current) => out.push_str(&vars.current),
                Segment::Var(Placeholder::Next) => out.push_str(&vars.next),
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => f.write_str(text)?,
                Segment::Var(Placeholder::Current) => f.write_str("{{.Current}}")?,
                Segment::Var(Placeholder::Next) => f.write_str("{{.Next}}")?,
            }
        }
        Ok(())
    }
}

/// Parse and render a single template field in one go.
pub fn render_field(field: &str, source: &str, vars: &TemplateVars) -> TemplateResult<String> {
    Ok(Template::parse(field, source)?.render(vars))
}

/// Render a file rule's search template and its inferred replacement.
pub fn render_file_rule(rule: &FileRule, vars: &TemplateVars) -> TemplateResult<RenderedFile> {
    let search = Template::parse_search(format!("file.search for {}", rule.path), &rule.search)?;
    let replace = search.inferred_replace();
    Ok(RenderedFile {
        path: rule.path.clone(),
        search: search.render(vars),
        replace: replace.render(vars),
    })
}
