//! Interpreter configuration.

use std::path::{Path, PathBuf};

use wonder_core::CollectionMode;

/// Settings fixed when an `Interpreter` is created.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    pub collection_mode: CollectionMode,
    /// Directory `require` resolves against when no file is being loaded.
    pub source_root: PathBuf,
    /// Extension of module files found through `(require a.b.c)`.
    pub extension: String,
    /// Namespace that exposes host objects (`host/Math`, `host/console`).
    pub host_namespace: String,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        InterpreterOptions {
            collection_mode: CollectionMode::Native,
            source_root: PathBuf::from("."),
            extension: "ws".to_string(),
            host_namespace: "host".to_string(),
        }
    }
}

impl InterpreterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_mode(mut self, mode: CollectionMode) -> Self {
        self.collection_mode = mode;
        self
    }

    pub fn persistent(self) -> Self {
        self.collection_mode(CollectionMode::Persistent)
    }

    pub fn source_root(mut self, root: impl AsRef<Path>) -> Self {
        self.source_root = root.as_ref().to_path_buf();
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn host_namespace(mut self, token: impl Into<String>) -> Self {
        self.host_namespace = token.into();
        self
    }

    /// Relative path of a module file: `a.b.c` becomes `src/a/b/c.<ext>`.
    pub fn module_path(&self, module: &str) -> PathBuf {
        let mut path = PathBuf::from("src");
        for segment in module.split('.') {
            path.push(segment);
        }
        path.set_extension(&self.extension);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_paths_follow_the_dotted_name() {
        let options = InterpreterOptions::new();
        assert_eq!(
            options.module_path("a.b.c"),
            PathBuf::from("src").join("a").join("b").join("c.ws")
        );
    }

    #[test]
    fn builder_methods_override_defaults() {
        let options = InterpreterOptions::new()
            .persistent()
            .extension("wsx")
            .host_namespace("js");
        assert_eq!(options.collection_mode, CollectionMode::Persistent);
        assert_eq!(options.module_path("m"), PathBuf::from("src").join("m.wsx"));
        assert_eq!(options.host_namespace, "js");
    }
}
