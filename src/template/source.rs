//! Backing stores that template bodies are read from

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;

use super::types::{TemplateError, TemplateResult};

/// Read access to raw template text by storage key (e.g. `welcome.md`)
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn read(&self, key: &str) -> TemplateResult<String>;
}

/// Templates stored as UTF-8 files under a root directory
#[derive(Debug, Clone)]
pub struct FsTemplateSource {
    root: PathBuf,
}

impl FsTemplateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> TemplateResult<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(TemplateError::InvalidName(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TemplateSource for FsTemplateSource {
    async fn read(&self, key: &str) -> TemplateResult<String> {
        let path = self.resolve(key)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => {
                tracing::debug!(template = %key, path = %path.display(), "Template read from disk");
                Ok(body)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TemplateError::NotFound(key.to_string()))
            }
            Err(e) => Err(TemplateError::Io {
                name: key.to_string(),
                source: e,
            }),
        }
    }
}

/// In-memory template storage
#[derive(Debug, Default)]
pub struct MemoryTemplateSource {
    templates: DashMap<String, String>,
}

impl MemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, builder style
    pub fn with(self, key: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(key, body);
        self
    }

    /// Insert or replace a template
    pub fn insert(&self, key: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(key.into(), body.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.templates.remove(key).map(|(_, body)| body)
    }
}

#[async_trait]
impl TemplateSource for MemoryTemplateSource {
    async fn read(&self, key: &str) -> TemplateResult<String> {
        self.templates
            .get(key)
            .map(|body| body.clone())
            .ok_or_else(|| TemplateError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ara-mail-templates-{}-{}",
            tag,
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_fs_source_reads_file() {
        let root = temp_root("read");
        std::fs::write(root.join("welcome.md"), "# Hi\nBody").unwrap();

        let source = FsTemplateSource::new(&root);
        assert_eq!(source.read("welcome.md").await.unwrap(), "# Hi\nBody");

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn test_fs_source_missing_file() {
        let root = temp_root("missing");
        let source = FsTemplateSource::new(&root);

        assert!(matches!(
            source.read("nope.md").await,
            Err(TemplateError::NotFound(name)) if name == "nope.md"
        ));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn test_fs_source_rejects_traversal() {
        let source = FsTemplateSource::new("templates");

        for key in ["../secret.md", "/etc/passwd", "", "a/../../b.md"] {
            assert!(
                matches!(source.read(key).await, Err(TemplateError::InvalidName(_))),
                "{key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryTemplateSource::new().with("a.md", "A");
        assert_eq!(source.read("a.md").await.unwrap(), "A");

        source.insert("a.md", "B");
        assert_eq!(source.read("a.md").await.unwrap(), "B");

        assert_eq!(source.remove("a.md"), Some("B".to_string()));
        assert!(matches!(
            source.read("a.md").await,
            Err(TemplateError::NotFound(_))
        ));
    }
}
