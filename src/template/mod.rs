//! Email template system.
//!
//! This module provides:
//! - Template sources (filesystem directory, in-memory map)
//! - A process-lifetime cache that reads each template name at most once
//! - A renderer turning markdown with `{{variable}}` placeholders into text and HTML
//!
//! # Example
//!
//! ```ignore
//! let cache = TemplateCache::new(Arc::new(FsTemplateSource::new("templates")));
//!
//! // Reads templates/welcome.md once, then serves it from memory
//! let body = cache.load("welcome").await?;
//!
//! let rendered = MarkdownRenderer.render(&body, &json!({ "name": "Ann" }))?;
//! println!("{}", rendered.html);
//! ```

mod cache;
mod render;
mod source;
mod types;

pub use cache::{storage_key, TemplateCache, LAYOUT_EXTENSION, MARKDOWN_EXTENSION};
pub use render::{MarkdownRenderer, Renderer};
pub use source::{FsTemplateSource, MemoryTemplateSource, TemplateSource};
pub use types::{Rendered, TemplateError, TemplateResult};
