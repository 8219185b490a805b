//! Placeholder interpolation.
//!
//! The pipeline only knows the [`FixtureGenerator`] seam. The bundled
//! [`RandomGenerator`] understands `|~category.kind|` tokens such as
//! `|~person.name|` or `|~number.int|`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::{Captures, Regex};

use crate::error::{CompileError, CompileResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|~(?P<token>[A-Za-z0-9_.]+)\|").expect("placeholder regex"));

static DEFAULT_GENERATOR: Lazy<RwLock<Arc<dyn FixtureGenerator>>> = Lazy::new(|| {
    let generator: Arc<dyn FixtureGenerator> = Arc::new(RandomGenerator::new());
    RwLock::new(generator)
});

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
    "commodo",
];
const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "Hedy", "Ivan",
    "John", "Katherine", "Linus", "Margaret", "Niklaus", "Radia", "Tony", "Yukihiro",
];
const LAST_NAMES: &[&str] = &[
    "Allen", "Backus", "Dijkstra", "Hamilton", "Hoare", "Hopper", "Johnson", "Kay", "Knuth",
    "Lamarr", "Liskov", "Lovelace", "Matsumoto", "Perlman", "Ritchie", "Sutherland", "Torvalds",
    "Wirth",
];
const DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.test"];

/// Engine that replaces the placeholders of its own micro-syntax.
pub trait FixtureGenerator: Send + Sync {
    /// Return `text` with every placeholder replaced by generated text.
    fn process(&self, text: &str) -> CompileResult<String>;
}

/// Run the interpolation stage with an explicit engine.
pub fn interpolate(text: &str, generator: &dyn FixtureGenerator) -> CompileResult<String> {
    generator.process(text)
}

/// Snapshot of the process-wide default engine.
pub fn default_generator() -> Arc<dyn FixtureGenerator> {
    DEFAULT_GENERATOR
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide default engine. Compiles already holding a
/// snapshot keep the engine they started with.
pub fn set_default_generator(generator: Arc<dyn FixtureGenerator>) {
    *DEFAULT_GENERATOR
        .write()
        .unwrap_or_else(PoisonError::into_inner) = generator;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    Word,
    Sentence,
    Paragraph,
    FirstName,
    LastName,
    FullName,
    Email,
    Age,
    Guid,
    Bool,
    Int,
    Float,
    IsoDate,
}

impl Placeholder {
    pub fn parse(token: &str) -> Option<Self> {
        let kind = match token {
            "text.word" => Self::Word,
            "text.sentence" => Self::Sentence,
            "text.paragraph" => Self::Paragraph,
            "person.first" => Self::FirstName,
            "person.last" => Self::LastName,
            "person.name" => Self::FullName,
            "person.email" => Self::Email,
            "person.age" => Self::Age,
            "misc.guid" => Self::Guid,
            "misc.bool" => Self::Bool,
            "number.int" => Self::Int,
            "number.float" => Self::Float,
            "date.iso" => Self::IsoDate,
            _ => return None,
        };
        Some(kind)
    }
}

/// Default engine backed by a seedable [`StdRng`].
#[derive(Debug)]
pub struct RandomGenerator {
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn generate(&self, placeholder: Placeholder) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let rng = &mut *rng;
        match placeholder {
            Placeholder::Word => pick(rng, WORDS).to_string(),
            Placeholder::Sentence => sentence(rng),
            Placeholder::Paragraph => {
                let count = rng.gen_range(3..=5);
                (0..count)
                    .map(|_| sentence(rng))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            Placeholder::FirstName => pick(rng, FIRST_NAMES).to_string(),
            Placeholder::LastName => pick(rng, LAST_NAMES).to_string(),
            Placeholder::FullName => {
                format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
            }
            Placeholder::Email => format!(
                "{}.{}@{}",
                pick(rng, FIRST_NAMES).to_ascii_lowercase(),
                pick(rng, LAST_NAMES).to_ascii_lowercase(),
                pick(rng, DOMAINS)
            ),
            Placeholder::Age => rng.gen_range(18..=90).to_string(),
            Placeholder::Guid => uuid::Builder::from_random_bytes(rng.gen())
                .into_uuid()
                .to_string(),
            Placeholder::Bool => rng.gen_bool(0.5).to_string(),
            Placeholder::Int => rng.gen_range(0..10_000).to_string(),
            Placeholder::Float => format!("{:.2}", rng.gen_range(0.0..1000.0_f64)),
            Placeholder::IsoDate => {
                // 2000-01-01T00:00:00Z plus up to ~25 years.
                let seconds = 946_684_800 + rng.gen_range(0..788_400_000_i64);
                Utc.timestamp_opt(seconds, 0)
                    .single()
                    .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_default()
            }
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureGenerator for RandomGenerator {
    fn process(&self, text: &str) -> CompileResult<String> {
        let mut unknown: Option<String> = None;
        let replaced = PLACEHOLDER.replace_all(text, |captures: &Captures<'_>| {
            let token = &captures["token"];
            match Placeholder::parse(token) {
                Some(placeholder) => self.generate(placeholder),
                None => {
                    unknown.get_or_insert_with(|| token.to_string());
                    String::new()
                }
            }
        });

        match unknown {
            Some(token) => Err(CompileError::Interpolation(format!(
                "unknown placeholder '|~{token}|'"
            ))),
            None => Ok(replaced.into_owned()),
        }
    }
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn sentence(rng: &mut StdRng) -> String {
    let count = rng.gen_range(6..=12);
    let mut words: Vec<String> = (0..count).map(|_| pick(rng, WORDS).to_string()).collect();
    if let Some(first) = words.first_mut() {
        let mut chars = first.chars();
        if let Some(head) = chars.next() {
            *first = head.to_uppercase().chain(chars).collect();
        }
    }
    format!("{}.", words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_untouched() {
        let generator = RandomGenerator::seeded(7);
        let text = "Pipes | and ~tildes~ stay put.";
        assert_eq!(interpolate(text, &generator).unwrap(), text);
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let text = r#"{"name": "|~person.name|", "id": "|~misc.guid|", "age": |~person.age|}"#;
        let first = RandomGenerator::seeded(42).process(text).unwrap();
        let second = RandomGenerator::seeded(42).process(text).unwrap();
        assert_eq!(first, second);
        assert!(!first.contains("|~"));
    }

    #[test]
    fn numbers_and_booleans_are_json_literals() {
        let generator = RandomGenerator::seeded(1);
        let text = r#"{"n": |~number.int|, "f": |~number.float|, "b": |~misc.bool|}"#;
        let value: serde_json::Value =
            serde_json::from_str(&generator.process(text).unwrap()).unwrap();
        assert!(value["n"].is_u64());
        assert!(value["f"].is_f64());
        assert!(value["b"].is_boolean());
    }

    #[test]
    fn generated_strings_fit_inside_json_strings() {
        let generator = RandomGenerator::seeded(3);
        let text =
            r#"{"email": "|~person.email|", "at": "|~date.iso|", "bio": "|~text.paragraph|"}"#;
        let value: serde_json::Value =
            serde_json::from_str(&generator.process(text).unwrap()).unwrap();
        assert!(value["email"].as_str().unwrap().contains('@'));
        assert!(value["at"].as_str().unwrap().ends_with('Z'));
        assert!(value["bio"].as_str().unwrap().ends_with('.'));
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let err = RandomGenerator::seeded(0)
            .process("|~person.name| |~person.shoe_size|")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "interpolation failed: unknown placeholder '|~person.shoe_size|'"
        );
    }
}
