//! Shared fixtures and workspace helpers for apib tests.

use std::fs;
use std::path::{Path, PathBuf};

use apib_config::{Config, LoadOptions};
use tempfile::TempDir;

/// Notes API blueprint whose bodies include a fixture file via `:[...](...)`.
pub const NOTES_BLUEPRINT: &str = "FORMAT: 1A
HOST: https://notes.example.com

# Notes API

A tiny note keeping service.

# Group Notes

## Notes Collection [/notes]

### List Notes [GET]

+ Response 200 (application/json)

        :[note list](fixtures/notes.json)

### Create a Note [POST]

+ Request (application/json)

        {\"title\": \"Buy milk\"}

+ Response 201 (application/json)

    + Headers

            Location: /notes/2

    + Body

            {\"id\": 2, \"title\": \"Buy milk\"}
";

/// Included by [`NOTES_BLUEPRINT`] at `fixtures/notes.json`.
pub const NOTES_LIST_FIXTURE: &str = "{\"notes\": [
  {\"id\": 1, \"title\": \"Jogging\"}
]}
";

/// Blueprint whose fixture is filled in by the placeholder generator.
pub const PEOPLE_BLUEPRINT: &str = "# People API

## Person [/person]

### Fetch [GET]

+ Response 200 (application/json)

        {\"id\": \"|~misc.guid|\", \"name\": \"|~person.name|\", \"age\": |~person.age|}
";

/// Returns a baseline configuration rooted at `root`.
pub fn test_config(root: impl Into<PathBuf>) -> Config {
    Config::defaults_at(root)
}

/// Temporary project directory that is removed on drop.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp workspace"),
        }
    }

    /// Workspace pre-populated with [`NOTES_BLUEPRINT`] and its included fixture.
    pub fn with_notes() -> Self {
        let workspace = Self::new();
        workspace.write("notes.apib", NOTES_BLUEPRINT);
        workspace.write("fixtures/notes.json", NOTES_LIST_FIXTURE);
        workspace
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, contents).expect("write workspace file");
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("read workspace file")
    }

    pub fn config(&self) -> Config {
        test_config(self.root())
    }

    /// Configuration as the CLI would see it, including any `.apib.toml` written here.
    pub fn load_config(&self) -> Config {
        Config::load(LoadOptions::default().with_working_dir(self.root()))
            .expect("load workspace config")
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
