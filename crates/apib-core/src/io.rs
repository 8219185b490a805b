//! Entry points that combine the filesystem with compilation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apib_config::PatternList;
use tokio::task::JoinSet;
use tracing::info;

use crate::error::{CompileError, CompileResult};
use crate::fs::{Filesystem, GlobOptions};
use crate::unit::{
    compile_input, join_in_order, CompilationUnit, CompileOptions, Compiled, CompiledArtifact,
    Document, Input,
};

/// Read one blueprint through `fs` and compile it.
pub async fn src(
    fs: &dyn Filesystem,
    path: impl AsRef<Path>,
    options: &CompileOptions,
) -> CompileResult<CompiledArtifact> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(CompileError::Input("file path required".into()));
    }

    info!(target: "apib::io", path = %path.display(), "importing blueprint");
    let text = fs.read_file(path).await?;
    let artifact = CompilationUnit::new(Document::new(text).with_origin(path))
        .into_artifact(options)
        .await?;
    info!(
        target: "apib::io",
        path = %path.display(),
        fixtures = artifact.fixtures.len(),
        "imported blueprint"
    );
    Ok(artifact)
}

/// Compile every file matching `pattern`, in sorted path order.
///
/// Each match is read and compiled on its own task; one failure fails the
/// whole call.
pub async fn glob(
    fs: Arc<dyn Filesystem>,
    pattern: &str,
    glob_options: &GlobOptions,
    options: &CompileOptions,
) -> CompileResult<Vec<(PathBuf, CompiledArtifact)>> {
    info!(target: "apib::io", pattern, "importing blueprints");
    let paths = fs.glob(pattern, glob_options).await?;
    let artifacts = src_all(fs, &paths, options).await?;
    info!(target: "apib::io", pattern, documents = artifacts.len(), "imported blueprints");
    Ok(paths.into_iter().zip(artifacts).collect())
}

/// Like [`glob`], over the union of `include` patterns (`sources.include_patterns`).
pub async fn glob_sources(
    fs: Arc<dyn Filesystem>,
    include: &PatternList,
    glob_options: &GlobOptions,
    options: &CompileOptions,
) -> CompileResult<Vec<(PathBuf, CompiledArtifact)>> {
    let mut paths = BTreeSet::new();
    for pattern in include.iter() {
        info!(target: "apib::io", pattern = pattern.original(), "importing blueprints");
        paths.extend(fs.glob(pattern.original(), glob_options).await?);
    }
    let paths: Vec<PathBuf> = paths.into_iter().collect();
    let artifacts = src_all(fs, &paths, options).await?;
    info!(target: "apib::io", documents = artifacts.len(), "imported blueprints");
    Ok(paths.into_iter().zip(artifacts).collect())
}

async fn src_all(
    fs: Arc<dyn Filesystem>,
    paths: &[PathBuf],
    options: &CompileOptions,
) -> CompileResult<Vec<CompiledArtifact>> {
    let mut tasks = JoinSet::new();
    for (index, path) in paths.iter().cloned().enumerate() {
        let fs = Arc::clone(&fs);
        let options = options.clone();
        tasks.spawn(async move {
            src(fs.as_ref(), &path, &options)
                .await
                .map(|artifact| (index, artifact))
        });
    }
    join_in_order(tasks, paths.len()).await
}

/// Compile in-memory blueprint text, one document or a batch.
pub async fn read(input: impl Into<Input>, options: &CompileOptions) -> CompileResult<Compiled> {
    let input = input.into();
    let documents = match &input {
        Input::Single(_) => 1,
        Input::Batch(documents) => documents.len(),
    };
    info!(target: "apib::io", documents, "reading blueprints");
    compile_input(input, options).await
}

/// Compile `input` and write it to `target` in the format its extension names.
pub async fn dist(
    fs: &dyn Filesystem,
    input: impl Into<Document>,
    target: impl AsRef<Path>,
    options: &CompileOptions,
) -> CompileResult<()> {
    let target = target.as_ref();
    info!(target: "apib::io", path = %target.display(), "exporting blueprint");
    let mut unit = CompilationUnit::new(input);
    unit.dist(fs, target, options).await?;
    info!(target: "apib::io", path = %target.display(), "exported blueprint");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fs::MemoryFilesystem;
    use crate::interpolate::RandomGenerator;
    use crate::transclude::MemoryIncludeLoader;
    use serde_json::json;

    fn options() -> CompileOptions {
        CompileOptions::default()
            .with_loader(Arc::new(MemoryIncludeLoader::new()))
            .with_generator(Arc::new(RandomGenerator::seeded(5)))
    }

    #[tokio::test]
    async fn src_requires_a_path() {
        let fs = MemoryFilesystem::new();
        let err = src(&fs, "", &options()).await.unwrap_err();
        assert!(matches!(err, CompileError::Input(_)));
    }

    #[tokio::test]
    async fn src_reads_and_compiles() {
        let fs = MemoryFilesystem::new().with_file("api.apib", "# API\n{\"x\": 1}\n");
        let artifact = src(&fs, "api.apib", &options()).await.unwrap();
        assert_eq!(artifact.fixtures, vec![json!({"x": 1})]);
    }

    #[tokio::test]
    async fn glob_pairs_paths_with_artifacts() {
        let fs = MemoryFilesystem::new()
            .with_file("b.apib", "{\"n\": 2}")
            .with_file("a.apib", "{\"n\": 1}")
            .with_file("notes.md", "{\"n\": 3}");
        let compiled = glob(Arc::new(fs), "*.apib", &GlobOptions::default(), &options())
            .await
            .unwrap();
        let summary: Vec<_> = compiled
            .iter()
            .map(|(path, artifact)| (path.clone(), artifact.fixtures[0]["n"].clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (PathBuf::from("a.apib"), json!(1)),
                (PathBuf::from("b.apib"), json!(2))
            ]
        );
    }

    #[tokio::test]
    async fn glob_fails_when_any_match_fails() {
        let fs = MemoryFilesystem::new()
            .with_file("a.apib", "{\"n\": 1}")
            .with_file("b.apib", "{broken}");
        let err = glob(Arc::new(fs), "*.apib", &GlobOptions::default(), &options())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("in b.apib"), "{err}");
    }

    #[tokio::test]
    async fn glob_sources_merges_include_patterns() {
        let config = apib_config::Config::from_toml_str(
            "[sources]\ninclude_patterns = [\"api/*.apib\", \"**/*.apib\"]\n",
            "/srv",
        )
        .unwrap();
        let fs = MemoryFilesystem::new()
            .with_file("api/b.apib", "{\"n\": 2}")
            .with_file("a.apib", "{\"n\": 1}")
            .with_file("notes.md", "{\"n\": 3}");
        let compiled = glob_sources(
            Arc::new(fs),
            &config.sources.include,
            &GlobOptions::default(),
            &options(),
        )
        .await
        .unwrap();
        let paths: Vec<_> = compiled.iter().map(|(path, _)| path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.apib"), PathBuf::from("api/b.apib")]);
    }

    #[tokio::test]
    async fn dist_writes_rendered_markdown() {
        let fs = MemoryFilesystem::new();
        dist(&fs, "# API\n", "dist/api.apib", &options()).await.unwrap();
        assert_eq!(fs.contents("dist/api.apib").as_deref(), Some("# API\n"));
    }
}
