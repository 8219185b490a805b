use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

/// `[project]`: where logical paths are rooted and what is never read.
#[derive(Clone, Debug)]
pub struct ProjectSettings {
    pub name: Option<String>,
    pub root: PathBuf,
    pub exclude: PatternList,
}

impl ProjectSettings {
    /// Resolve a logical path against the project root.
    pub fn uri(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// `[sources]`: which blueprint documents the glob entry point considers.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    pub include: PatternList,
    pub exclude: PatternList,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransclusionSettings {
    pub max_depth: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FixtureSettings {
    /// Seed for the default placeholder generator. Unseeded runs draw from entropy.
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct DistSettings {
    pub output_dir: PathBuf,
    /// Lower-cased format key used when a destination is derived rather than given.
    pub default_format: String,
}

/// A glob as written in the config file, plus its compiled matcher.
#[derive(Clone, Debug)]
pub struct Pattern {
    original: String,
    matcher: GlobMatcher,
}

impl Pattern {
    pub(crate) fn parse(glob: &str) -> Result<Self, String> {
        Glob::new(glob)
            .map(|compiled| Pattern {
                original: glob.to_string(),
                matcher: compiled.compile_matcher(),
            })
            .map_err(|err| format!("invalid glob pattern '{glob}': {err}"))
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    pub(crate) fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// True when any pattern matches `path`.
    pub fn matches(&self, path: &Path) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_list_matches_any() {
        let mut list = PatternList::default();
        list.push(Pattern::parse("**/node_modules/**").unwrap());
        list.push(Pattern::parse("drafts/*.apib").unwrap());
        assert!(list.matches(Path::new("web/node_modules/x/a.apib")));
        assert!(list.matches(Path::new("drafts/b.apib")));
        assert!(!list.matches(Path::new("notes.apib")));
    }

    #[test]
    fn invalid_glob_is_described() {
        let err = Pattern::parse("docs/[").unwrap_err();
        assert!(err.starts_with("invalid glob pattern 'docs/['"));
    }
}
