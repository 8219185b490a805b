use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{CompileError, CompileResult};
use crate::unit::CompiledArtifact;

static DEFAULT_REGISTRY: Lazy<FormatRegistry> = Lazy::new(FormatRegistry::default);

pub type MarshalFn = fn(&CompiledArtifact) -> Marshalled;

/// One output representation of a compiled artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Marshalled {
    Text(String),
    Json(Value),
}

impl Marshalled {
    /// File contents for this representation. JSON is pretty-printed.
    pub fn render(&self) -> String {
        match self {
            Marshalled::Text(text) => text.clone(),
            Marshalled::Json(value) => format!("{value:#}\n"),
        }
    }
}

#[derive(Clone, Copy)]
pub struct FormatDescriptor {
    pub key: &'static str,
    pub marshal: MarshalFn,
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Registered output formats, looked up by key or destination extension.
#[derive(Clone, Debug)]
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    /// Registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Add a format, replacing any existing format with the same key.
    pub fn register(&mut self, descriptor: FormatDescriptor) {
        match self
            .formats
            .iter_mut()
            .find(|existing| existing.key == descriptor.key)
        {
            Some(existing) => *existing = descriptor,
            None => self.formats.push(descriptor),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formats.iter().map(|descriptor| descriptor.key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    pub fn get(&self, key: &str) -> CompileResult<FormatDescriptor> {
        self.formats
            .iter()
            .find(|descriptor| descriptor.key == key)
            .copied()
            .ok_or_else(|| CompileError::UnsupportedFormat {
                key: key.to_string(),
            })
    }

    pub fn marshall(&self, artifact: &CompiledArtifact, key: &str) -> CompileResult<Marshalled> {
        let descriptor = self.get(key)?;
        Ok((descriptor.marshal)(artifact))
    }

    /// Pick the format for a destination path from its extension.
    ///
    /// Runs before any compilation or I/O so a bad destination never causes
    /// side effects.
    pub fn for_destination(&self, path: &Path) -> CompileResult<FormatDescriptor> {
        let extension = resolve_extension(path)?;
        self.get(&extension)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FormatDescriptor {
            key: "apib",
            marshal: marshal_apib,
        });
        registry.register(FormatDescriptor {
            key: "json",
            marshal: marshal_json,
        });
        registry
    }
}

fn marshal_apib(artifact: &CompiledArtifact) -> Marshalled {
    Marshalled::Text(artifact.markdown.clone())
}

fn marshal_json(artifact: &CompiledArtifact) -> Marshalled {
    Marshalled::Json(Value::Array(artifact.fixtures.clone()))
}

/// Marshal with the built-in `apib` / `json` formats.
pub fn marshall(artifact: &CompiledArtifact, key: &str) -> CompileResult<Marshalled> {
    DEFAULT_REGISTRY.marshall(artifact, key)
}

/// Lower-cased extension of `path`, or `InvalidDestination` when it has none.
pub fn resolve_extension(path: &Path) -> CompileResult<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| CompileError::InvalidDestination {
            path: path.to_path_buf(),
        })
}
