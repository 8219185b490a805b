//! Filesystem collaborator used by the io entry points.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use apib_config::{Config, PatternList, ProjectSettings};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tempfile::Builder;
use walkdir::WalkDir;

use crate::error::{CompileError, CompileResult};

#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read_file(&self, path: &Path) -> CompileResult<String>;

    async fn write_file(&self, path: &Path, contents: &str) -> CompileResult<()>;

    /// Paths matching `pattern`, sorted.
    async fn glob(&self, pattern: &str, options: &GlobOptions) -> CompileResult<Vec<PathBuf>>;
}

#[derive(Clone, Debug, Default)]
pub struct GlobOptions {
    /// Patterns whose matches are dropped from the result.
    pub exclude: Vec<String>,
    /// Descend into dot-directories and match dotfiles.
    pub include_hidden: bool,
}

impl GlobOptions {
    /// Exclusions from `[sources].exclude_patterns`. `[project].exclude` is
    /// applied by [`LocalFilesystem`] itself.
    pub fn from_config(config: &Config) -> Self {
        let exclude = config
            .sources
            .exclude
            .iter()
            .map(|pattern| pattern.original().to_string())
            .collect();
        Self {
            exclude,
            include_hidden: false,
        }
    }

    fn matchers(&self, pattern: &str) -> CompileResult<(GlobMatcher, GlobSet)> {
        let include = compile_glob(pattern)?.compile_matcher();
        let mut exclude = GlobSetBuilder::new();
        for pattern in &self.exclude {
            exclude.add(compile_glob(pattern)?);
        }
        let exclude = exclude
            .build()
            .map_err(|err| CompileError::Input(format!("invalid exclude patterns: {err}")))?;
        Ok((include, exclude))
    }
}

fn compile_glob(pattern: &str) -> CompileResult<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|err| CompileError::Input(format!("invalid glob pattern '{pattern}': {err}")))
}

fn is_hidden(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

/// Disk-backed filesystem rooted at the project directory. Globbing never
/// returns paths matched by `project.exclude`.
#[derive(Clone, Debug)]
pub struct LocalFilesystem {
    project: ProjectSettings,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            project: ProjectSettings {
                name: None,
                root: root.into(),
                exclude: PatternList::default(),
            },
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            project: config.project.clone(),
        }
    }

    /// Absolute paths pass through; relative ones resolve against the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project.uri(path)
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn read_file(&self, path: &Path) -> CompileResult<String> {
        let resolved = self.resolve(path);
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|err| CompileError::filesystem(&resolved, err))
    }

    async fn write_file(&self, path: &Path, contents: &str) -> CompileResult<()> {
        let resolved = self.resolve(path);
        let contents = contents.to_owned();
        let target = resolved.clone();
        tokio::task::spawn_blocking(move || atomic_write(&target, &contents))
            .await
            .map_err(|err| CompileError::Task(err.to_string()))?
            .map_err(|err| CompileError::filesystem(&resolved, err))
    }

    async fn glob(&self, pattern: &str, options: &GlobOptions) -> CompileResult<Vec<PathBuf>> {
        let (include, exclude) = options.matchers(pattern)?;
        let root = self.project.root.clone();
        let project_exclude = self.project.exclude.clone();
        let include_hidden = options.include_hidden;

        tokio::task::spawn_blocking(move || -> CompileResult<Vec<PathBuf>> {
            let mut matches = Vec::new();
            let walker = WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| {
                    include_hidden
                        || entry.depth() == 0
                        || !entry.file_name().to_string_lossy().starts_with('.')
                });
            for entry in walker {
                let entry = entry.map_err(|err| {
                    let path = err.path().unwrap_or(&root).to_path_buf();
                    CompileError::filesystem(&path, io::Error::from(err))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                if include.is_match(relative)
                    && !exclude.is_match(relative)
                    && !project_exclude.matches(relative)
                {
                    matches.push(relative.to_path_buf());
                }
            }
            matches.sort();
            Ok(matches)
        })
        .await
        .map_err(|err| CompileError::Task(err.to_string()))?
    }
}

/// Write through a temporary sibling file and rename it into place.
fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;

    let mut tmp = Builder::new().prefix(".apib").tempfile_in(&parent)?;
    tmp.as_file_mut().write_all(contents.as_bytes())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map(|_| ()).map_err(|err| err.error)
}

/// In-memory filesystem. Writes are recorded in order.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    writes: Mutex<Vec<PathBuf>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_ref())
            .cloned()
    }

    /// Every path passed to `write_file`, in call order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    async fn read_file(&self, path: &Path) -> CompileResult<String> {
        self.contents(path).ok_or_else(|| {
            CompileError::filesystem(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    async fn write_file(&self, path: &Path, contents: &str) -> CompileResult<()> {
        self.insert(path, contents);
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        Ok(())
    }

    async fn glob(&self, pattern: &str, options: &GlobOptions) -> CompileResult<Vec<PathBuf>> {
        let (include, exclude) = options.matchers(pattern)?;
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files
            .keys()
            .filter(|path| options.include_hidden || !is_hidden(path))
            .filter(|path| include.is_match(path) && !exclude.is_match(path))
            .cloned()
            .collect())
    }
}
