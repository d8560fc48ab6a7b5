//! Process-lifetime cache of template bodies

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::metrics::TemplateMetrics;

use super::source::TemplateSource;
use super::types::{TemplateError, TemplateResult};

/// Extension that marks a name as a layout file; anything else is markdown
pub const LAYOUT_EXTENSION: &str = ".html";

/// Extension appended to markdown template names
pub const MARKDOWN_EXTENSION: &str = ".md";

/// Map a logical template name to its storage key
pub fn storage_key(name: &str) -> String {
    if name.ends_with(LAYOUT_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, MARKDOWN_EXTENSION)
    }
}

/// Memoizing template loader.
///
/// Entries are keyed by the name the caller passed in, not by the resolved
/// storage key, and are never invalidated. Each name owns a once-cell so the
/// source is read at most once per name even when loads race. A failed read
/// drops the empty cell so unknown names do not accumulate.
pub struct TemplateCache {
    source: Arc<dyn TemplateSource>,
    entries: DashMap<String, Arc<OnceCell<Arc<str>>>>,
}

impl TemplateCache {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            entries: DashMap::new(),
        }
    }

    /// Load a template body by logical name
    pub async fn load(&self, name: &str) -> TemplateResult<Arc<str>> {
        let cell = self
            .entries
            .entry(name.to_string())
            .or_default()
            .value()
            .clone();

        if let Some(body) = cell.get() {
            TemplateMetrics::record_hit();
            return Ok(body.clone());
        }

        let loaded = cell
            .get_or_try_init(|| async {
                TemplateMetrics::record_miss();
                let key = storage_key(name);
                let body = self.source.read(&key).await?;
                tracing::debug!(template = %name, key = %key, bytes = body.len(), "Template cached");
                Ok::<_, TemplateError>(Arc::from(body))
            })
            .await;

        match loaded {
            Ok(body) => Ok(body.clone()),
            Err(e) => {
                self.entries.remove_if(name, |_, cell| !cell.initialized());
                Err(e)
            }
        }
    }

    /// Number of names with a loaded body
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `name` has already been loaded
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }
}
