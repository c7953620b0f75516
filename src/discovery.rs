//! Instance discovery for the command line: explicit files are taken as
//! given, directories are walked for matching extensions.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::fs;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct InstanceDiscovery {
    /// Lowercase extensions without the dot.
    extensions: Vec<String>,
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl InstanceDiscovery {
    pub fn new() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Expand every input into instance paths, sorted within each directory.
    pub async fn discover_all(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in inputs {
            files.extend(self.discover(input).await?);
        }
        Ok(files)
    }

    /// A file is returned as-is whatever its extension; a directory is
    /// walked recursively.
    pub async fn discover(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(path).await?;
        if metadata.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut files = Vec::new();
        self.walk(path, 0, &mut files).await?;
        files.sort();
        Ok(files)
    }

    fn walk<'a>(
        &'a self,
        dir: &'a Path,
        depth: usize,
        files: &'a mut Vec<PathBuf>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if !self.follow_symlinks && path.is_symlink() {
                    continue;
                }

                let metadata = match fs::metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                        continue;
                    }
                };

                if metadata.is_file() {
                    if self.matches(&path) {
                        files.push(path);
                    }
                } else if metadata.is_dir() && self.max_depth.is_none_or(|max| depth < max) {
                    if let Err(e) = self.walk(&path, depth + 1, files).await {
                        warn!(path = %path.display(), error = %e, "skipping directory");
                    }
                }
            }
            Ok(())
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }
}

impl Default for InstanceDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
