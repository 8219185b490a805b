//! Compilation pipeline for API Blueprint documents.
//!
//! A [`CompilationUnit`] runs three stages over one document: include
//! expansion ([`transclude`]), placeholder interpolation ([`interpolate`])
//! and JSON fixture extraction ([`fixtures`]). The finished
//! [`CompiledArtifact`] can be parsed into a [`Blueprint`] tree or marshalled
//! to `apib` / `json` output. The [`io`] module wires these stages to a
//! [`Filesystem`].

pub mod error;
pub mod fixtures;
pub mod fs;
pub mod interpolate;
pub mod io;
pub mod marshal;
pub mod parse;
pub mod transclude;
pub mod unit;

pub use apib_grammar::Blueprint;
pub use error::{CompileError, CompileResult, ExitCode};
pub use fixtures::extract_fixtures;
pub use fs::{Filesystem, GlobOptions, LocalFilesystem, MemoryFilesystem};
pub use interpolate::{
    default_generator, set_default_generator, FixtureGenerator, Placeholder, RandomGenerator,
};
pub use marshal::{marshall, FormatDescriptor, FormatRegistry, Marshalled};
pub use parse::{BlueprintGrammar, GrammarEngine};
pub use transclude::{FsIncludeLoader, Inclusion, IncludeLoader, MemoryIncludeLoader};
pub use unit::{
    CompilationUnit, CompileOptions, Compiled, CompiledArtifact, Document, Input, UnitState,
};
