use serde_json::Value;

use crate::error::{CompileError, CompileResult};

/// Top-level `{ ... }` span found by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate<'a> {
    text: &'a str,
    line: usize,
}

/// Extract every top-level brace-delimited JSON literal from `text`, in order.
///
/// The first span that is not valid JSON aborts extraction; `origin`
/// identifies the document in the resulting error.
pub fn extract_fixtures(text: &str, origin: Option<&str>) -> CompileResult<Vec<Value>> {
    let mut fixtures = Vec::new();
    for candidate in scan(text) {
        let candidate = candidate.map_err(|unclosed| CompileError::FixtureSyntax {
            fragment: first_line(unclosed.text).to_string(),
            line: unclosed.line,
            origin: origin.map(str::to_string),
            message: "opening brace is never closed".into(),
        })?;

        let value = serde_json::from_str::<Value>(candidate.text).map_err(|err| {
            CompileError::FixtureSyntax {
                fragment: candidate.text.to_string(),
                line: candidate.line,
                origin: origin.map(str::to_string),
                message: err.to_string(),
            }
        })?;
        fixtures.push(value);
    }
    Ok(fixtures)
}

/// Split `text` into candidate spans. An `Err` item carries an unclosed span
/// and is always the last item.
fn scan(text: &str) -> Vec<Result<Candidate<'_>, Candidate<'_>>> {
    let mut spans = Vec::new();
    let mut line = 1usize;
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut start_line = 1usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if depth == 0 {
            if ch == '{' {
                depth = 1;
                start = idx;
                start_line = line;
            }
        } else if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else {
            match ch {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(Ok(Candidate {
                            text: &text[start..=idx],
                            line: start_line,
                        }));
                    }
                }
                _ => {}
            }
        }

        if ch == '\n' {
            line += 1;
        }
    }

    if depth > 0 {
        spans.push(Err(Candidate {
            text: &text[start..],
            line: start_line,
        }));
    }
    spans
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn preserves_order_of_appearance() {
        let text = "Hello {\"a\":1} World\n\n    {\"b\": [1, 2]}\n{\"c\": {\"d\": null}}";
        let fixtures = extract_fixtures(text, None).unwrap();
        assert_eq!(
            fixtures,
            vec![json!({"a": 1}), json!({"b": [1, 2]}), json!({"c": {"d": null}})]
        );
    }

    #[test]
    fn braces_inside_strings_do_not_end_a_fixture() {
        let text = r#"{"template": "/notes/{id}", "quote": "say \"}\""}"#;
        let fixtures = extract_fixtures(text, None).unwrap();
        assert_eq!(fixtures[0]["template"], "/notes/{id}");
        assert_eq!(fixtures[0]["quote"], "say \"}\"");
    }

    #[test]
    fn text_without_braces_has_no_fixtures() {
        assert!(extract_fixtures("# API\n\nNothing here.", None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn invalid_json_names_fragment_line_and_origin() {
        let err = extract_fixtures("ok {\"a\": 1}\ntext {not json} more", Some("notes.apib"))
            .unwrap_err();
        match err {
            CompileError::FixtureSyntax {
                fragment,
                line,
                origin,
                ..
            } => {
                assert_eq!(fragment, "{not json}");
                assert_eq!(line, 2);
                assert_eq!(origin.as_deref(), Some("notes.apib"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unclosed_brace_is_an_error() {
        let err = extract_fixtures("a\nb {\"open\": [1,\n2]", None).unwrap_err();
        match err {
            CompileError::FixtureSyntax { fragment, line, .. } => {
                assert_eq!(fragment, "{\"open\": [1,");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
