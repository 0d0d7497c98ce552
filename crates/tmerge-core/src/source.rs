//! Named byte blobs and the collaborators that supply them

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One raw input file, fully read into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the source root with `/` separators; plain file
    /// name for top-level files
    pub name: String,
    /// Raw contents
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Declarative file-name predicate; every predicate that is set must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl FileFilter {
    /// Names containing `keyword`
    pub fn containing(keyword: impl Into<String>) -> Self {
        Self {
            contains: Some(keyword.into()),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Test the last path segment of `name`
    pub fn matches(&self, name: &str) -> bool {
        let name = file_name(name);
        self.prefix.as_deref().map_or(true, |p| name.starts_with(p))
            && self.contains.as_deref().map_or(true, |c| name.contains(c))
            && self.suffix.as_deref().map_or(true, |s| name.ends_with(s))
    }
}

/// Last `/`-separated segment of a source file name
pub fn file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Supplies the files a filter selects.
///
/// A file that cannot be delivered comes back as `SourceUnavailable`; the
/// merge treats it as absent.
pub trait FileSource {
    fn fetch(&self, filter: &FileFilter) -> Vec<Result<SourceFile>>;
}

/// Files held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<SourceFile>,
}

impl MemorySource {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }
}

impl FileSource for MemorySource {
    fn fetch(&self, filter: &FileFilter) -> Vec<Result<SourceFile>> {
        self.files
            .iter()
            .filter(|f| filter.matches(&f.name))
            .cloned()
            .map(Ok)
            .collect()
    }
}

/// A subject folder on the local filesystem
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Pick the first sub-folder of `root` whose name contains `subject`.
    ///
    /// Folders are visited in name order.
    pub fn for_subject<P: AsRef<Path>>(root: P, subject: &str) -> Result<Option<Self>> {
        let root = root.as_ref();
        let mut folders: Vec<PathBuf> = Vec::new();

        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                folders.push(entry.into_path());
            }
        }
        folders.sort();

        let matched = folders.into_iter().find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(subject))
        });

        match &matched {
            Some(path) => info!(subject, folder = %path.display(), "matched subject folder"),
            None => warn!(subject, root = %root.display(), "no folder matches subject"),
        }

        Ok(matched.map(Self::new))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every regular file under the root, named by its relative path,
    /// sorted by path
    fn list(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut found = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            found.push((self.relative_name(entry.path()), entry.path().to_path_buf()));
        }

        found.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(found)
    }

    fn relative_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.join("/")
    }
}

impl FileSource for DirectorySource {
    fn fetch(&self, filter: &FileFilter) -> Vec<Result<SourceFile>> {
        let listing = match self.list() {
            Ok(listing) => listing,
            Err(e) => {
                return vec![Err(Error::SourceUnavailable {
                    name: self.root.display().to_string(),
                    reason: e.to_string(),
                })]
            }
        };

        listing
            .into_iter()
            .filter(|(name, _)| filter.matches(name))
            .map(|(name, path)| {
                debug!(file = %name, "reading source file");
                fs::read(&path)
                    .map(|bytes| SourceFile::new(name.clone(), bytes))
                    .map_err(|e| Error::SourceUnavailable {
                        name,
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}
