use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use apib_config::{Config, LoadOptions};
use apib_core::io as pipeline;
use apib_core::{
    BlueprintGrammar, CompilationUnit, CompileError, CompileOptions, Document, Filesystem,
    GlobOptions, LocalFilesystem, RandomGenerator,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "apib",
    version,
    about = "Compile API Blueprint documents and their JSON fixtures"
)]
struct Cli {
    /// Config file to layer over the discovered ones.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seed for placeholder generation, overriding `fixtures.seed`.
    #[arg(long, global = true, value_name = "N")]
    seed: Option<u64>,

    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile documents and print their fixtures or markdown.
    Compile(CompileArgs),
    /// Compile a document and print its structure as JSON.
    Parse(ParseArgs),
    /// Compile a document and write the marshalled output.
    Dist(DistArgs),
    /// Compile every document matching a glob, or `sources.include_patterns`.
    Glob(GlobArgs),
}

#[derive(Args, Debug)]
struct CompileArgs {
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

#[derive(Args, Debug)]
struct DistArgs {
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Destination file; defaults to `<dist.output_dir>/<stem>.<dist.default_format>`.
    #[arg(value_name = "DEST")]
    dest: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GlobArgs {
    /// Glob relative to the project root; defaults to the configured sources.
    #[arg(value_name = "PATTERN")]
    pattern: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Apib,
}

struct Session {
    config: Config,
    options: CompileOptions,
    fs: Arc<LocalFilesystem>,
}

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut load = LoadOptions::default();
    if let Some(path) = &cli.config {
        load = load.with_override_path(path);
    }
    let config = Config::load(load)?;
    debug!(
        target: "apib::cli",
        project = config.project.name.as_deref(),
        root = %config.project.root.display(),
        "configuration loaded"
    );

    let mut options = CompileOptions::from_config(&config);
    if let Some(seed) = cli.seed {
        options = options.with_generator(Arc::new(RandomGenerator::seeded(seed)));
    }
    let session = Session {
        fs: Arc::new(LocalFilesystem::from_config(&config)),
        options,
        config,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let command = cli.command;
    let session = &session;
    let outcome = runtime.block_on(async move {
        match command {
            Command::Compile(args) => handle_compile(session, args).await,
            Command::Parse(args) => handle_parse(session, args).await,
            Command::Dist(args) => handle_dist(session, args).await,
            Command::Glob(args) => handle_glob(session, args).await,
        }
    });

    match outcome {
        Ok(()) => Ok(0),
        Err(err) => match err.downcast_ref::<CompileError>() {
            Some(compile) => {
                eprintln!("apib error: {compile}");
                Ok(i32::from(compile.exit_code() as u8))
            }
            None => Err(err),
        },
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "apib=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("APIB_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn handle_compile(session: &Session, args: CompileArgs) -> Result<()> {
    let format = match args.format {
        Some(format) => format,
        None if session.config.dist.default_format == "json" => OutputFormat::Json,
        None => OutputFormat::Apib,
    };

    let mut artifacts = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        artifacts.push(pipeline::src(session.fs.as_ref(), path, &session.options).await?);
    }

    match format {
        OutputFormat::Json => {
            let fixtures: Vec<_> = artifacts
                .into_iter()
                .map(|artifact| artifact.fixtures)
                .collect();
            emit(&serde_json::to_string_pretty(&fixtures)?)
        }
        OutputFormat::Apib => {
            let markdown: Vec<_> = artifacts
                .into_iter()
                .map(|artifact| artifact.markdown)
                .collect();
            emit(&markdown.join("\n"))
        }
    }
}

async fn handle_parse(session: &Session, args: ParseArgs) -> Result<()> {
    let document = read_document(session, &args.path).await?;
    let mut unit = CompilationUnit::new(document);
    unit.compile(&session.options).await?;
    let blueprint = unit.parse(&BlueprintGrammar).await?;
    emit(&serde_json::to_string_pretty(&blueprint)?)
}

async fn handle_dist(session: &Session, args: DistArgs) -> Result<()> {
    let dest = match args.dest {
        Some(dest) => dest,
        None => default_destination(&session.config, &args.source)?,
    };
    let document = read_document(session, &args.source).await?;
    pipeline::dist(session.fs.as_ref(), document, &dest, &session.options).await?;
    emit(&format!("wrote {}", dest.display()))
}

async fn handle_glob(session: &Session, args: GlobArgs) -> Result<()> {
    let glob_options = GlobOptions::from_config(&session.config);
    let fs = session.fs.clone();
    let compiled = match &args.pattern {
        Some(pattern) => pipeline::glob(fs, pattern, &glob_options, &session.options).await?,
        None => {
            let include = &session.config.sources.include;
            pipeline::glob_sources(fs, include, &glob_options, &session.options).await?
        }
    };

    let mut lines = Vec::with_capacity(compiled.len() + 1);
    for (path, artifact) in &compiled {
        lines.push(format!(
            "{}\t{} fixture(s)",
            path.display(),
            artifact.fixtures.len()
        ));
    }
    lines.push(format!("{} document(s) compiled", compiled.len()));
    emit(&lines.join("\n"))
}

async fn read_document(session: &Session, path: &Path) -> Result<Document> {
    let text = session.fs.read_file(path).await?;
    Ok(Document::new(text).with_origin(path))
}

fn default_destination(config: &Config, source: &Path) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .with_context(|| format!("cannot derive a destination from {}", source.display()))?;
    Ok(config
        .dist
        .output_dir
        .join(format!("{stem}.{}", config.dist.default_format)))
}

fn emit(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}
