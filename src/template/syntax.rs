//! Placeholder syntax for task templates.
//!
//! # Syntax
//!
//! - `{name}` - Substitutes the value bound to `name`
//! - `{{` - Renders as literal `{`
//! - `}}` - Renders as literal `}`
//!
//! Names must start with a letter or underscore and contain only ASCII
//! letters, digits, `_` or `-`. Whitespace inside the braces is trimmed.
//!
//! Templates are parsed once, when the catalog loads, so malformed syntax is
//! reported before any run starts. Rendering is a single literal pass: a
//! substituted value is never scanned for further placeholders.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid placeholder name regex")
});

/// Error type for template parsing and rendering failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A variable was referenced but not provided.
    UndefinedVariable {
        /// The name of the undefined variable.
        name: String,
        /// The position in the template where the variable was found.
        position: usize,
    },
    /// A `{` was found without a matching `}`.
    UnmatchedBrace {
        /// The position of the unmatched `{`.
        position: usize,
    },
    /// An empty variable name was found (e.g., `{}`).
    EmptyVariableName {
        /// The position of the empty variable.
        position: usize,
    },
    /// The text between braces is not a valid placeholder name.
    InvalidVariableName {
        /// The raw text found between the braces.
        name: String,
        /// The position of the opening brace.
        position: usize,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UndefinedVariable { name, position } => {
                write!(
                    f,
                    "undefined variable '{}' at position {} in template",
                    name, position
                )
            }
            TemplateError::UnmatchedBrace { position } => {
                write!(f, "unmatched '{{' at position {} in template", position)
            }
            TemplateError::EmptyVariableName { position } => {
                write!(
                    f,
                    "empty variable name '{{}}' at position {} in template",
                    position
                )
            }
            TemplateError::InvalidVariableName { name, position } => {
                write!(
                    f,
                    "invalid placeholder name '{}' at position {} in template (use '{{{{' for a literal brace)",
                    name, position
                )
            }
        }
    }
}

impl std::error::Error for TemplateError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, position: usize },
}

/// A parsed template: literal text interleaved with named placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.
    ///
    /// # Examples
    ///
    /// ```
    /// use postcrew::template::Template;
    ///
    /// let template = Template::parse("Research '{topic}' for {audience}.").unwrap();
    /// assert_eq!(template.placeholders(), vec!["topic", "audience"]);
    /// ```
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::with_capacity(source.len());
        let mut chars = source.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' => {
                    if let Some((_, '{')) = chars.peek() {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut raw_name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) => raw_name.push(c),
                            None => return Err(TemplateError::UnmatchedBrace { position: pos }),
                        }
                    }

                    let name = raw_name.trim();
                    if name.is_empty() {
                        return Err(TemplateError::EmptyVariableName { position: pos });
                    }
                    if !PLACEHOLDER_NAME.is_match(name) {
                        return Err(TemplateError::InvalidVariableName {
                            name: name.to_string(),
                            position: pos,
                        });
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder {
                        name: name.to_string(),
                        position: pos,
                    });
                }
                '}' => {
                    // `}}` collapses to one brace; a lone `}` is kept as-is.
                    if let Some((_, '}')) = chars.peek() {
                        chars.next();
                    }
                    literal.push('}');
                }
                _ => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as written in the catalog.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { name, .. } = segment
                && !names.contains(&name.as_str())
            {
                names.push(name);
            }
        }
        names
    }

    /// Render the template, resolving each placeholder through `lookup`.
    ///
    /// Fails on the first placeholder `lookup` cannot resolve.
    pub fn render_with<'a, F>(&self, mut lookup: F) -> Result<String, TemplateError>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut result = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Placeholder { name, position } => match lookup(name.as_str()) {
                    Some(value) => result.push_str(value),
                    None => {
                        return Err(TemplateError::UndefinedVariable {
                            name: name.clone(),
                            position: *position,
                        });
                    }
                },
            }
        }
        Ok(result)
    }
}

/// Render a template string by substituting variables from a map.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use postcrew::template::render_template;
///
/// let mut vars = HashMap::new();
/// vars.insert("role".to_string(), "Researcher".to_string());
///
/// let result = render_template("You are the {role}.", &vars).unwrap();
/// assert_eq!(result, "You are the Researcher.");
/// ```
pub fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    Template::parse(template)?.render_with(|name| variables.get(name).map(String::as_str))
}

/// Helper to create a variables map from a list of key-value pairs.
pub fn vars<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
