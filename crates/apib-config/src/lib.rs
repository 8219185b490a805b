//! Layered `.apib.toml` configuration for the apib toolkit.
//!
//! Layers stack from lowest to highest precedence: built-in defaults, the git
//! root, the working directory, then an explicit override file. Each key takes
//! the value of the highest layer that sets it, and relative paths resolve
//! against the directory of the file that named them.

mod error;
mod layer;
mod settings;
mod source;

use std::path::PathBuf;

pub use error::{ConfigError, ConfigValidationError, ConfigValidationErrors};
pub use settings::{
    DistSettings, FixtureSettings, Pattern, PatternList, ProjectSettings, SourceSettings,
    TransclusionSettings,
};
pub use source::{ConfigSource, ConfigSourceKind, ConfigSources, LoadOptions};

use layer::LayerStack;

/// File name looked up in the git root and the working directory.
pub const CONFIG_FILE_NAME: &str = ".apib.toml";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub project: ProjectSettings,
    pub sources: SourceSettings,
    pub transclusion: TransclusionSettings,
    pub fixtures: FixtureSettings,
    pub dist: DistSettings,
    pub provenance: ConfigSources,
}

impl Config {
    /// Discover and stack every config file visible from the working directory.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = options.working_dir()?;
        let mut stack = LayerStack::new(ConfigSource::defaults(working_dir.clone()));
        for source in source::discover(&working_dir, options.override_path.as_deref())? {
            stack.push_file(source)?;
        }
        stack.resolve(working_dir).map_err(ConfigError::Validation)
    }

    /// Resolve a single TOML document on top of the defaults.
    pub fn from_toml_str(
        contents: &str,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let base_dir = base_dir.into();
        let mut stack = LayerStack::new(ConfigSource::defaults(base_dir.clone()));
        stack.push_str(ConfigSource::inline(base_dir.clone()), contents)?;
        stack.resolve(base_dir).map_err(ConfigError::Validation)
    }

    /// Built-in defaults rooted at `root`, without touching the filesystem.
    pub fn defaults_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        match LayerStack::new(ConfigSource::defaults(root.clone())).resolve(root) {
            Ok(config) => config,
            Err(errors) => unreachable!("built-in defaults failed validation: {errors}"),
        }
    }
}
