use std::path::Path;
use std::sync::Arc;

use apib_core::io::{self, dist, read, src};
use apib_core::{
    marshall, BlueprintGrammar, CompilationUnit, CompileError, CompileOptions, Compiled,
    CompiledArtifact, Input, LocalFilesystem, Marshalled, MemoryFilesystem, RandomGenerator,
    UnitState,
};
use apib_test_support::{Workspace, PEOPLE_BLUEPRINT};
use pretty_assertions::assert_eq;
use serde_json::json;

fn seeded(seed: u64) -> CompileOptions {
    CompileOptions::default().with_generator(Arc::new(RandomGenerator::seeded(seed)))
}

#[tokio::test]
async fn hello_world_end_to_end() {
    let text = r#"Hello {"a":1} World {"b":[1,2]}"#;
    let compiled = read(text, &seeded(1)).await.expect("compile");
    assert_eq!(
        compiled,
        Compiled::Single(CompiledArtifact {
            markdown: text.to_string(),
            fixtures: vec![json!({"a": 1}), json!({"b": [1, 2]})],
        })
    );
}

#[tokio::test]
async fn read_batch_resolves_in_input_order() {
    let compiled = read(vec!["doc one {\"id\": 1}", "doc two {\"id\": 2}"], &seeded(1))
        .await
        .expect("compile batch");
    let artifacts = compiled.into_vec();
    assert_eq!(artifacts.len(), 2);
    assert!(artifacts[0].markdown.starts_with("doc one"));
    assert!(artifacts[1].markdown.starts_with("doc two"));
}

#[tokio::test]
async fn read_rejects_other_shapes() {
    let err = Input::try_from(json!(42)).expect_err("number is not a document");
    assert!(matches!(err, CompileError::Input(ref message) if message.contains("got number")));
}

#[tokio::test]
async fn invalid_fixture_rejects_the_compile() {
    let err = read("text {not json} more", &seeded(1))
        .await
        .expect_err("invalid fixture");
    match err {
        CompileError::FixtureSyntax { fragment, line, .. } => {
            assert_eq!(fragment, "{not json}");
            assert_eq!(line, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn marshall_selects_the_representation() {
    let mut unit = CompilationUnit::new("# API\n{\"a\": 1}\n");
    let artifact = unit.compile(&seeded(2)).await.expect("compile").clone();

    assert_eq!(
        marshall(&artifact, "json").unwrap(),
        Marshalled::Json(json!(artifact.fixtures))
    );
    assert_eq!(
        marshall(&artifact, "apib").unwrap(),
        Marshalled::Text(artifact.markdown.clone())
    );
    assert!(matches!(
        marshall(&artifact, "xyz"),
        Err(CompileError::UnsupportedFormat { .. })
    ));
}

#[tokio::test]
async fn dist_without_extension_writes_nothing() {
    let fs = MemoryFilesystem::new();
    let err = dist(&fs, "# API\n{\"a\": 1}", "out", &seeded(3))
        .await
        .expect_err("missing extension");
    assert!(matches!(err, CompileError::InvalidDestination { .. }));
    assert!(fs.writes().is_empty());
}

#[tokio::test]
async fn seeded_placeholders_are_reproducible() {
    let first = read(PEOPLE_BLUEPRINT, &seeded(9)).await.unwrap().into_vec();
    let second = read(PEOPLE_BLUEPRINT, &seeded(9)).await.unwrap().into_vec();
    assert_eq!(first, second);

    let person = &first[0].fixtures[0];
    assert!(person["name"].as_str().unwrap().contains(' '));
    assert!(person["age"].is_u64());
    assert_eq!(person["id"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn project_on_disk_compiles_parses_and_distributes() {
    let workspace = Workspace::with_notes();
    let config = workspace.config();
    let options = CompileOptions::from_config(&config);
    let fs = LocalFilesystem::from_config(&config);

    let artifact = src(&fs, "notes.apib", &options).await.expect("compile notes");
    assert_eq!(artifact.fixtures.len(), 3);
    assert_eq!(artifact.fixtures[0]["notes"][0]["title"], "Jogging");
    assert!(!artifact.markdown.contains(":["));

    let mut unit = CompilationUnit::new(
        apib_core::Document::new(workspace.read("notes.apib")).with_origin("notes.apib"),
    );
    unit.compile(&options).await.expect("compile unit");
    let blueprint = unit.parse(&BlueprintGrammar).await.expect("parse");
    assert_eq!(blueprint.name.as_deref(), Some("Notes API"));
    let list = blueprint.actions().next().expect("list action");
    assert_eq!(
        list.responses[0].body.as_deref(),
        Some("{\"notes\": [\n  {\"id\": 1, \"title\": \"Jogging\"}\n]}")
    );

    unit.dist(&fs, Path::new("dist/notes.json"), &options)
        .await
        .expect("dist");
    assert_eq!(unit.state(), UnitState::Compiled);
    let written: serde_json::Value =
        serde_json::from_str(&workspace.read("dist/notes.json")).expect("json output");
    assert_eq!(written, json!(artifact.fixtures));
}

#[tokio::test]
async fn glob_compiles_every_match() {
    let workspace = Workspace::with_notes();
    workspace.write("more/extra.apib", "# Extra\n{\"extra\": true}\n");
    workspace.write("node_modules/pkg/skip.apib", "{broken");
    let config = workspace.config();
    let options = CompileOptions::from_config(&config);
    let fs = Arc::new(LocalFilesystem::from_config(&config));

    let compiled = io::glob(
        fs,
        "**/*.apib",
        &apib_core::GlobOptions::from_config(&config),
        &options,
    )
    .await
    .expect("glob");
    let paths: Vec<_> = compiled
        .iter()
        .map(|(path, _)| path.to_string_lossy().into_owned())
        .collect();
    assert_eq!(paths, vec!["more/extra.apib", "notes.apib"]);
    assert_eq!(compiled[0].1.fixtures, vec![json!({"extra": true})]);
}

#[tokio::test]
async fn glob_sources_uses_configured_include_patterns() {
    let workspace = Workspace::with_notes();
    workspace.write("more/extra.apib", "# Extra\n{\"extra\": true}\n");
    workspace.write("drafts/wip.apib", "{broken");
    workspace.write(
        ".apib.toml",
        "[project]\nexclude = [\"drafts/**\"]\n\n\
         [sources]\ninclude_patterns = [\"**/*.apib\", \"more/*.apib\"]\n",
    );
    let config = workspace.load_config();
    let options = CompileOptions::from_config(&config);

    let compiled = io::glob_sources(
        Arc::new(LocalFilesystem::from_config(&config)),
        &config.sources.include,
        &apib_core::GlobOptions::from_config(&config),
        &options,
    )
    .await
    .expect("glob sources");
    let paths: Vec<_> = compiled
        .iter()
        .map(|(path, _)| path.to_string_lossy().into_owned())
        .collect();
    assert_eq!(paths, vec!["more/extra.apib", "notes.apib"]);
}
