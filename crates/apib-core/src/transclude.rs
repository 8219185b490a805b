//! Include-directive expansion.
//!
//! A directive has the form `:[label](link)`. Links are handed to an
//! [`IncludeLoader`], and whatever it returns is expanded recursively before
//! being spliced into the including text.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, CompileResult};

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":\[(?P<label>[^\]\n]*)\]\((?P<link>[^)\s]+)\)").expect("directive regex")
});

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text returned by a loader together with the location it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inclusion {
    /// Identity of the included document; nested links resolve against its parent.
    pub location: PathBuf,
    pub text: String,
}

#[async_trait]
pub trait IncludeLoader: Send + Sync {
    /// Load `link`, resolved against `base` (the directory of the including
    /// document, or `None` for top-level text).
    async fn load(&self, link: &str, base: Option<&Path>) -> io::Result<Inclusion>;
}

/// Reads included documents from disk below a root directory.
///
/// Locations it returns are relative to the root, so nested links resolve the
/// same way whether the root itself is absolute or relative.
#[derive(Debug, Clone)]
pub struct FsIncludeLoader {
    root: PathBuf,
}

impl FsIncludeLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl IncludeLoader for FsIncludeLoader {
    async fn load(&self, link: &str, base: Option<&Path>) -> io::Result<Inclusion> {
        let location = match base {
            Some(base) => normalize(&base.join(link)),
            None => normalize(Path::new(link)),
        };
        let text = tokio::fs::read_to_string(self.root.join(&location)).await?;
        Ok(Inclusion { location, text })
    }
}

/// In-memory link table, keyed by normalised path.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludeLoader {
    entries: HashMap<PathBuf, String>,
}

impl MemoryIncludeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, link: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(link, text);
        self
    }

    pub fn insert(&mut self, link: impl AsRef<Path>, text: impl Into<String>) {
        self.entries.insert(normalize(link.as_ref()), text.into());
    }
}

#[async_trait]
impl IncludeLoader for MemoryIncludeLoader {
    async fn load(&self, link: &str, base: Option<&Path>) -> io::Result<Inclusion> {
        let location = match base {
            Some(base) => normalize(&base.join(link)),
            None => normalize(Path::new(link)),
        };
        match self.entries.get(&location) {
            Some(text) => Ok(Inclusion {
                location,
                text: text.clone(),
            }),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no document registered at {}", location.display()),
            )),
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

struct Context<'a> {
    loader: &'a dyn IncludeLoader,
    max_depth: u32,
}

struct Directive {
    start: usize,
    end: usize,
    link: String,
    indent: String,
}

/// Expand every include directive in `text`, transitively.
///
/// `base` is the directory of the document `text` came from, if any.
pub async fn transclude(
    text: &str,
    base: Option<&Path>,
    loader: &dyn IncludeLoader,
    max_depth: u32,
) -> CompileResult<String> {
    if text.is_empty() {
        return Err(CompileError::Transclusion(
            "valid markdown required for transclusion".into(),
        ));
    }

    let context = Context { loader, max_depth };
    let mut stack = Vec::new();
    let resolved = expand(text, base, &context, &mut stack).await?;
    if resolved.is_empty() {
        return Err(CompileError::Transclusion(
            "resolving include directives produced no output".into(),
        ));
    }
    Ok(resolved)
}

fn expand<'a>(
    text: &'a str,
    base: Option<&'a Path>,
    context: &'a Context<'a>,
    stack: &'a mut Vec<PathBuf>,
) -> BoxFuture<'a, CompileResult<String>> {
    Box::pin(async move {
        let directives = find_directives(text);
        if directives.is_empty() {
            return Ok(text.to_string());
        }

        let mut output = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for directive in directives {
            output.push_str(&text[cursor..directive.start]);
            cursor = directive.end;

            let link = directive.link.as_str();
            if link.starts_with("http://") || link.starts_with("https://") {
                return Err(CompileError::Transclusion(format!(
                    "remote include '{link}' is not supported"
                )));
            }
            if stack.len() >= context.max_depth as usize {
                return Err(CompileError::Transclusion(format!(
                    "include depth exceeds {} at '{link}'",
                    context.max_depth
                )));
            }

            let inclusion = context.loader.load(link, base).await.map_err(|err| {
                CompileError::Transclusion(format!("failed to include '{link}': {err}"))
            })?;

            if stack.contains(&inclusion.location) {
                let mut chain: Vec<String> =
                    stack.iter().map(|path| path.display().to_string()).collect();
                chain.push(inclusion.location.display().to_string());
                return Err(CompileError::Transclusion(format!(
                    "circular include: {}",
                    chain.join(" -> ")
                )));
            }

            stack.push(inclusion.location.clone());
            let nested = expand(
                &inclusion.text,
                inclusion.location.parent(),
                context,
                &mut *stack,
            )
            .await;
            stack.pop();

            output.push_str(&indent_following_lines(
                trim_trailing_newline(&nested?),
                &directive.indent,
            ));
        }
        output.push_str(&text[cursor..]);
        Ok(output)
    })
}

fn find_directives(text: &str) -> Vec<Directive> {
    DIRECTIVE
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let line_start = text[..whole.start()].rfind('\n').map_or(0, |idx| idx + 1);
            let prefix = &text[line_start..whole.start()];
            let indent = if prefix.trim().is_empty() {
                prefix.to_string()
            } else {
                String::new()
            };
            Some(Directive {
                start: whole.start(),
                end: whole.end(),
                link: captures["link"].to_string(),
                indent,
            })
        })
        .collect()
}

fn trim_trailing_newline(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}

fn indent_following_lines(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    let mut lines = text.split('\n');
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        if !line.trim().is_empty() {
            out.push_str(indent);
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(text: &str, loader: &MemoryIncludeLoader) -> CompileResult<String> {
        transclude(text, None, loader, 16).await
    }

    #[tokio::test]
    async fn text_without_directives_is_unchanged() {
        let loader = MemoryIncludeLoader::new();
        let text = "# API\n\nNo includes here: [link](x.md)\n";
        assert_eq!(run(text, &loader).await.unwrap(), text);
    }

    #[tokio::test]
    async fn expands_nested_directives_relative_to_includer() {
        let loader = MemoryIncludeLoader::new()
            .with("parts/notes.apib", "## Notes [/notes]\n:[body](body.json)\n")
            .with("parts/body.json", "{\"id\": 1}\n");
        let out = run("# API\n:[notes](parts/notes.apib)\nend\n", &loader)
            .await
            .unwrap();
        assert_eq!(out, "# API\n## Notes [/notes]\n{\"id\": 1}\nend\n");
    }

    #[tokio::test]
    async fn carries_directive_indentation_onto_included_lines() {
        let loader = MemoryIncludeLoader::new().with("body.json", "{\n  \"id\": 1\n}\n");
        let out = run("+ Response 200\n\n        :[body](body.json)\n", &loader)
            .await
            .unwrap();
        assert_eq!(
            out,
            "+ Response 200\n\n        {\n          \"id\": 1\n        }\n"
        );
    }

    #[tokio::test]
    async fn detects_cycles() {
        let loader = MemoryIncludeLoader::new()
            .with("a.apib", "A\n:[b](b.apib)")
            .with("b.apib", "B\n:[a](./a.apib)");
        let err = run(":[a](a.apib)", &loader).await.unwrap_err();
        assert!(err.to_string().contains("circular include: a.apib -> b.apib -> a.apib"));
    }

    #[tokio::test]
    async fn enforces_depth_limit() {
        let loader = MemoryIncludeLoader::new()
            .with("one", ":[two](two)")
            .with("two", ":[three](three)")
            .with("three", "done");
        let err = transclude(":[one](one)", None, &loader, 2).await.unwrap_err();
        assert!(err.to_string().contains("include depth exceeds 2"));
        let ok = transclude(":[one](one)", None, &loader, 3).await.unwrap();
        assert_eq!(ok, "done");
    }

    #[tokio::test]
    async fn rejects_empty_input_and_remote_links() {
        let loader = MemoryIncludeLoader::new();
        assert!(matches!(
            run("", &loader).await,
            Err(CompileError::Transclusion(_))
        ));
        assert_eq!(run("   \n", &loader).await.unwrap(), "   \n");
        let err = run(":[remote](https://example.com/a.apib)", &loader)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("remote include"));
    }

    #[tokio::test]
    async fn including_only_empty_documents_is_an_error() {
        let loader = MemoryIncludeLoader::new().with("empty.apib", "");
        let err = run(":[empty](empty.apib)", &loader).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "transclusion failed: resolving include directives produced no output"
        );
    }

    #[tokio::test]
    async fn relative_loader_root_resolves_nested_includes() {
        let dir = tempfile::Builder::new()
            .prefix("includes")
            .tempdir_in(".")
            .unwrap();
        std::fs::create_dir_all(dir.path().join("parts")).unwrap();
        std::fs::write(
            dir.path().join("parts/notes.apib"),
            "## Notes [/notes]\n:[body](body.json)\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("parts/body.json"), "{\"id\": 1}\n").unwrap();

        let root = PathBuf::from(dir.path().file_name().unwrap());
        assert!(root.is_relative());
        let loader = FsIncludeLoader::new(root);
        let out = transclude("# API\n:[notes](parts/notes.apib)\n", None, &loader, 16)
            .await
            .unwrap();
        assert_eq!(out, "# API\n## Notes [/notes]\n{\"id\": 1}\n");
    }

    #[tokio::test]
    async fn missing_include_names_the_link() {
        let loader = MemoryIncludeLoader::new();
        let err = run("x :[gone](missing.apib)", &loader).await.unwrap_err();
        assert!(err.to_string().contains("'missing.apib'"));
    }

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }
}
