//! Template rendering: placeholder substitution plus markdown to HTML

use pulldown_cmark::{html, Options, Parser};
use serde_json::{Map, Value};

use super::types::{Rendered, TemplateError, TemplateResult};

/// Turns template text plus a data object into a plain-text/HTML pair
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> TemplateResult<Rendered>;
}

/// Mustache-style placeholders over markdown.
///
/// `{{path}}` inserts a value (HTML-escaped in the HTML output), `{{{path}}}`
/// inserts it verbatim in both outputs. Paths are dot-separated and may index
/// arrays (`items.0.name`). Unknown paths render as nothing. The plain-text
/// output is the substituted markdown; the HTML output is the substituted
/// markdown converted with CommonMark plus tables and strikethrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, template: &str, data: &Value) -> TemplateResult<Rendered> {
        let vars = match data {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => {
                return Err(TemplateError::Render(
                    "Render data must be an object".to_string(),
                ))
            }
        };

        let text = substitute(template, vars, Escape::None);
        let html = markdown_to_html(&substitute(template, vars, Escape::Html));

        Ok(Rendered { text, html })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Html,
}

fn substitute(template: &str, vars: Option<&Map<String, Value>>, escape: Escape) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tag = &rest[start..];

        let (raw, open, close) = if tag.starts_with("{{{") {
            (true, 3, "}}}")
        } else {
            (false, 2, "}}")
        };

        let Some(end) = tag[open..].find(close) else {
            // Unterminated tag, keep it literally
            out.push_str(tag);
            return out;
        };

        let path = tag[open..open + end].trim();
        let value = lookup(vars, path).map(value_to_string).unwrap_or_default();

        if raw || escape == Escape::None {
            out.push_str(&value);
        } else {
            out.push_str(&escape_html(&value));
        }

        rest = &tag[open + end + close.len()..];
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(vars: Option<&'a Map<String, Value>>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = vars?.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For arrays and objects, use JSON representation
        _ => value.to_string(),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}
