use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::CONFIG_FILE_NAME;

/// Where a layer came from. Variants are declared in stacking order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        })
    }
}

/// One layer of the stack. Relative paths inside it resolve against `base_dir`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    pub(crate) fn defaults(base_dir: PathBuf) -> Self {
        Self {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    /// An override supplied as a string rather than a file.
    pub(crate) fn inline(base_dir: PathBuf) -> Self {
        Self {
            kind: ConfigSourceKind::Override,
            path: None,
            base_dir,
        }
    }

    pub(crate) fn file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        Self {
            kind,
            path: Some(path),
            base_dir,
        }
    }

    pub(crate) fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn describe(&self) -> String {
        match (self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_string(),
            (kind, Some(path)) => format!("{kind} at {}", path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Every layer that contributed to a resolved [`Config`](crate::Config), lowest first.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Inputs to [`Config::load`](crate::Config::load), usually taken from CLI flags.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    pub(crate) fn working_dir(&self) -> Result<PathBuf, ConfigError> {
        let attempted = self.working_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let resolved = match &self.working_dir {
            Some(path) => fs::canonicalize(path),
            None => env::current_dir(),
        };
        resolved.map_err(|source| ConfigError::WorkingDirectory { attempted, source })
    }
}

/// Config files that exist for `working_dir`, lowest precedence first.
pub(crate) fn discover(
    working_dir: &Path,
    override_path: Option<&Path>,
) -> Result<Vec<ConfigSource>, ConfigError> {
    let override_path = override_path.map(|path| working_dir.join(path));
    if let Some(path) = &override_path {
        if !path.is_file() {
            return Err(ConfigError::OverrideNotFound { path: path.clone() });
        }
    }

    let mut candidates = Vec::new();
    if let Some(root) = git_root(working_dir).filter(|root| root != working_dir) {
        candidates.push(ConfigSource::file(
            ConfigSourceKind::GitRoot,
            root.join(CONFIG_FILE_NAME),
        ));
    }
    candidates.push(ConfigSource::file(
        ConfigSourceKind::Local,
        working_dir.join(CONFIG_FILE_NAME),
    ));

    let mut found: Vec<ConfigSource> = candidates
        .into_iter()
        .filter(|source| {
            source.path.as_deref().is_some_and(Path::is_file)
                && source.path.as_deref() != override_path.as_deref()
        })
        .collect();
    if let Some(path) = override_path {
        found.push(ConfigSource::file(ConfigSourceKind::Override, path));
    }
    Ok(found)
}

fn git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}
