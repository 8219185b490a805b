use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigValidationError, ConfigValidationErrors};
use crate::settings::{
    DistSettings, FixtureSettings, Pattern, PatternList, ProjectSettings, SourceSettings,
    TransclusionSettings,
};
use crate::source::{ConfigSource, ConfigSources};
use crate::Config;

const DEFAULT_MAX_DEPTH: u32 = 16;
const MAX_DEPTH_LIMIT: u32 = 64;

/// `.apib.toml` as written on disk. Every key is optional so a file may set any subset.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSchema {
    project: ProjectTable,
    sources: SourcesTable,
    transclusion: TransclusionTable,
    fixtures: FixturesTable,
    dist: DistTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProjectTable {
    name: Option<String>,
    root: Option<PathBuf>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SourcesTable {
    include_patterns: Option<Vec<String>>,
    exclude_patterns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TransclusionTable {
    max_depth: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FixturesTable {
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DistTable {
    output_dir: Option<PathBuf>,
    default_format: Option<String>,
}

impl FileSchema {
    /// Values the stack falls back to. `project.root` and `dist.output_dir` are
    /// left unset so they follow the working directory and the resolved root.
    fn builtin() -> Self {
        Self {
            project: ProjectTable {
                exclude: Some(Vec::new()),
                ..ProjectTable::default()
            },
            sources: SourcesTable {
                include_patterns: Some(vec!["**/*.apib".to_string()]),
                exclude_patterns: Some(vec!["**/node_modules/**".to_string()]),
            },
            transclusion: TransclusionTable {
                max_depth: Some(DEFAULT_MAX_DEPTH),
            },
            fixtures: FixturesTable::default(),
            dist: DistTable {
                output_dir: None,
                default_format: Some("apib".to_string()),
            },
        }
    }
}

struct Layer {
    source: ConfigSource,
    schema: FileSchema,
}

/// Layers in precedence order. A key resolves to the highest layer that sets it.
pub(crate) struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub(crate) fn new(defaults: ConfigSource) -> Self {
        Self {
            layers: vec![Layer {
                source: defaults,
                schema: FileSchema::builtin(),
            }],
        }
    }

    pub(crate) fn push_file(&mut self, source: ConfigSource) -> Result<(), ConfigError> {
        let path = source.path.clone().unwrap_or_default();
        let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Io {
            path: path.clone(),
            source: err,
        })?;
        self.push_str(source, &contents)
    }

    pub(crate) fn push_str(
        &mut self,
        source: ConfigSource,
        contents: &str,
    ) -> Result<(), ConfigError> {
        let schema = toml::from_str(contents).map_err(|err| ConfigError::Parse {
            path: source.path.clone().unwrap_or_else(|| PathBuf::from("<inline>")),
            source: err,
        })?;
        self.layers.push(Layer { source, schema });
        Ok(())
    }

    fn lookup<'a, T>(
        &'a self,
        field: impl Fn(&'a FileSchema) -> Option<T>,
    ) -> Option<(T, &'a ConfigSource)> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| field(&layer.schema).map(|value| (value, &layer.source)))
    }

    fn patterns<'a>(
        &'a self,
        key: &'static str,
        field: impl Fn(&'a FileSchema) -> Option<&'a Vec<String>>,
        errors: &mut Vec<ConfigValidationError>,
    ) -> PatternList {
        let mut list = PatternList::default();
        if let Some((globs, source)) = self.lookup(field) {
            for glob in globs {
                match Pattern::parse(glob) {
                    Ok(pattern) => list.push(pattern),
                    Err(message) => {
                        errors.push(ConfigValidationError::new(key, message, Some(source)))
                    }
                }
            }
        }
        list
    }

    fn path(
        &self,
        field: impl Fn(&FileSchema) -> Option<&PathBuf>,
        fallback: impl FnOnce() -> PathBuf,
    ) -> PathBuf {
        match self.lookup(field) {
            Some((path, source)) => source.resolve(path),
            None => fallback(),
        }
    }

    /// Collapse the stack into a [`Config`], reporting every invalid value at once.
    pub(crate) fn resolve(
        self,
        working_directory: PathBuf,
    ) -> Result<Config, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let root = self.path(|schema| schema.project.root.as_ref(), || working_directory.clone());
        let project = ProjectSettings {
            name: self.lookup(|schema| schema.project.name.clone()).map(|(name, _)| name),
            exclude: self.patterns(
                "project.exclude",
                |schema| schema.project.exclude.as_ref(),
                &mut errors,
            ),
            root: root.clone(),
        };

        let sources = SourceSettings {
            include: self.patterns(
                "sources.include_patterns",
                |schema| schema.sources.include_patterns.as_ref(),
                &mut errors,
            ),
            exclude: self.patterns(
                "sources.exclude_patterns",
                |schema| schema.sources.exclude_patterns.as_ref(),
                &mut errors,
            ),
        };

        let depth = self.lookup(|schema| schema.transclusion.max_depth);
        let max_depth = depth.map_or(DEFAULT_MAX_DEPTH, |(value, _)| value);
        if !(1..=MAX_DEPTH_LIMIT).contains(&max_depth) {
            errors.push(ConfigValidationError::new(
                "transclusion.max_depth",
                format!("must be between 1 and {MAX_DEPTH_LIMIT} (got {max_depth})"),
                depth.map(|(_, source)| source),
            ));
        }

        let format = self.lookup(|schema| schema.dist.default_format.as_deref());
        let default_format = match format {
            Some((key, source)) => {
                let key = key.trim();
                if key.is_empty() || !key.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                    errors.push(ConfigValidationError::new(
                        "dist.default_format",
                        format!("'{key}' is not a format key"),
                        Some(source),
                    ));
                }
                key.to_ascii_lowercase()
            }
            None => "apib".to_string(),
        };

        let dist = DistSettings {
            output_dir: self.path(|schema| schema.dist.output_dir.as_ref(), || root.join("dist")),
            default_format,
        };
        let fixtures = FixtureSettings {
            seed: self.lookup(|schema| schema.fixtures.seed).map(|(seed, _)| seed),
        };

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(Config {
            project,
            sources,
            transclusion: TransclusionSettings { max_depth },
            fixtures,
            dist,
            provenance: ConfigSources {
                working_directory,
                layers: self.layers.into_iter().map(|layer| layer.source).collect(),
            },
        })
    }
}
