use std::path::{Path, PathBuf};
use std::sync::Arc;

use apib_config::Config;
use apib_grammar::Blueprint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::fixtures::extract_fixtures;
use crate::fs::Filesystem;
use crate::interpolate::{default_generator, interpolate, FixtureGenerator, RandomGenerator};
use crate::marshal::FormatRegistry;
use crate::parse::{parse, GrammarEngine};
use crate::transclude::{transclude, FsIncludeLoader, IncludeLoader};

const DEFAULT_MAX_DEPTH: u32 = 16;

/// Blueprint source text, optionally tagged with the path it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    origin: Option<PathBuf>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Finalized markdown plus the fixtures extracted from it, in order of appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub markdown: String,
    pub fixtures: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Created,
    Compiling,
    Compiled,
    Failed,
}

/// Collaborators and limits for one compile.
#[derive(Clone)]
pub struct CompileOptions {
    pub loader: Arc<dyn IncludeLoader>,
    pub generator: Arc<dyn FixtureGenerator>,
    pub max_depth: u32,
    pub formats: Arc<FormatRegistry>,
}

impl CompileOptions {
    /// Options for a project: includes resolve under `project.root`, and a
    /// configured seed gets its own generator instead of the process default.
    pub fn from_config(config: &Config) -> Self {
        let generator: Arc<dyn FixtureGenerator> = match config.fixtures.seed {
            Some(seed) => Arc::new(RandomGenerator::seeded(seed)),
            None => default_generator(),
        };
        Self {
            loader: Arc::new(FsIncludeLoader::new(config.project.root.clone())),
            generator,
            max_depth: config.transclusion.max_depth,
            formats: Arc::new(FormatRegistry::default()),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn IncludeLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn FixtureGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = Arc::new(formats);
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            loader: Arc::new(FsIncludeLoader::new(".")),
            generator: default_generator(),
            max_depth: DEFAULT_MAX_DEPTH,
            formats: Arc::new(FormatRegistry::default()),
        }
    }
}

/// Owns one document and, after a successful compile, its artifact.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    document: Document,
    compiled: Option<CompiledArtifact>,
    state: UnitState,
}

impl CompilationUnit {
    pub fn new(document: impl Into<Document>) -> Self {
        Self {
            document: document.into(),
            compiled: None,
            state: UnitState::Created,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn compiled(&self) -> Option<&CompiledArtifact> {
        self.compiled.as_ref()
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Resolve includes, interpolate placeholders and extract fixtures.
    ///
    /// Any earlier artifact is discarded first, so a failed compile leaves the
    /// unit without one.
    pub async fn compile(&mut self, options: &CompileOptions) -> CompileResult<&CompiledArtifact> {
        self.state = UnitState::Compiling;
        self.compiled = None;
        match compile_document(&self.document, options).await {
            Ok(artifact) => {
                self.state = UnitState::Compiled;
                Ok(&*self.compiled.insert(artifact))
            }
            Err(err) => {
                self.state = UnitState::Failed;
                Err(err)
            }
        }
    }

    /// Take the artifact, compiling first when there is none yet.
    pub async fn into_artifact(self, options: &CompileOptions) -> CompileResult<CompiledArtifact> {
        match self.compiled {
            Some(artifact) => Ok(artifact),
            None => compile_document(&self.document, options).await,
        }
    }

    /// Parse the compiled markdown, or the raw text when nothing is compiled yet.
    pub async fn parse(&self, engine: &dyn GrammarEngine) -> CompileResult<Blueprint> {
        let text = match &self.compiled {
            Some(artifact) => artifact.markdown.as_str(),
            None => self.document.text(),
        };
        parse(text, engine).await
    }

    /// Marshal into the format named by `target`'s extension and write it.
    pub async fn dist(
        &mut self,
        fs: &dyn Filesystem,
        target: &Path,
        options: &CompileOptions,
    ) -> CompileResult<()> {
        let descriptor = options.formats.for_destination(target)?;
        if self.compiled.is_none() {
            self.compile(options).await?;
        }
        let Some(artifact) = self.compiled.as_ref() else {
            return Err(CompileError::Input("document has no compiled artifact".into()));
        };
        let rendered = (descriptor.marshal)(artifact).render();
        fs.write_file(target, &rendered).await
    }
}

async fn compile_document(
    document: &Document,
    options: &CompileOptions,
) -> CompileResult<CompiledArtifact> {
    let origin = document.origin().map(|path| path.display().to_string());
    let base = document.origin().and_then(Path::parent);

    let embedded = transclude(
        document.text(),
        base,
        options.loader.as_ref(),
        options.max_depth,
    )
    .await?;
    debug!(
        target: "apib::unit",
        origin = origin.as_deref(),
        bytes = embedded.len(),
        "transcluded"
    );

    let finalized = interpolate(&embedded, options.generator.as_ref())?;
    debug!(target: "apib::unit", origin = origin.as_deref(), "interpolated");

    let fixtures = extract_fixtures(&finalized, origin.as_deref())?;
    debug!(
        target: "apib::unit",
        origin = origin.as_deref(),
        fixtures = fixtures.len(),
        "extracted fixtures"
    );

    Ok(CompiledArtifact {
        markdown: finalized,
        fixtures,
    })
}

/// One document or an ordered batch of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Single(Document),
    Batch(Vec<Document>),
}

impl From<Document> for Input {
    fn from(document: Document) -> Self {
        Input::Single(document)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Single(Document::new(text))
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Single(Document::new(text))
    }
}

impl<D: Into<Document>> From<Vec<D>> for Input {
    fn from(documents: Vec<D>) -> Self {
        Input::Batch(documents.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for Input {
    type Error = CompileError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Input::Single(Document::new(text))),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(Document::new(text)),
                    other => Err(CompileError::Input(format!(
                        "batch documents must be strings, got {}",
                        json_type(&other)
                    ))),
                })
                .collect::<CompileResult<Vec<_>>>()
                .map(Input::Batch),
            other => Err(CompileError::Input(format!(
                "documents must be represented as a string or array, got {}",
                json_type(&other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of compiling an [`Input`], shaped like the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    Single(CompiledArtifact),
    Batch(Vec<CompiledArtifact>),
}

impl Compiled {
    pub fn into_vec(self) -> Vec<CompiledArtifact> {
        match self {
            Compiled::Single(artifact) => vec![artifact],
            Compiled::Batch(artifacts) => artifacts,
        }
    }
}

pub async fn compile_input(input: Input, options: &CompileOptions) -> CompileResult<Compiled> {
    match input {
        Input::Single(document) => CompilationUnit::new(document)
            .into_artifact(options)
            .await
            .map(Compiled::Single),
        Input::Batch(documents) => compile_batch(documents, options).await.map(Compiled::Batch),
    }
}

/// Compile every document on its own task. Results keep input order; the
/// first failure aborts the remaining tasks and is returned.
pub async fn compile_batch(
    documents: Vec<Document>,
    options: &CompileOptions,
) -> CompileResult<Vec<CompiledArtifact>> {
    let total = documents.len();
    let mut tasks = JoinSet::new();
    for (index, document) in documents.into_iter().enumerate() {
        let options = options.clone();
        tasks.spawn(async move {
            CompilationUnit::new(document)
                .into_artifact(&options)
                .await
                .map(|artifact| (index, artifact))
        });
    }

    join_in_order(tasks, total).await
}

/// Drain tasks that each yield `(index, artifact)` into a vector ordered by
/// index, aborting the rest on the first failure.
pub(crate) async fn join_in_order(
    mut tasks: JoinSet<CompileResult<(usize, CompiledArtifact)>>,
    total: usize,
) -> CompileResult<Vec<CompiledArtifact>> {
    let mut slots: Vec<Option<CompiledArtifact>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) => Err(CompileError::Task(err.to_string())),
        };
        match outcome {
            Ok((index, artifact)) => slots[index] = Some(artifact),
            Err(err) => {
                tasks.abort_all();
                return Err(err);
            }
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| CompileError::Task("batch member finished without an artifact".into()))
}
