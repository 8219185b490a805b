use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Header, Payload, PayloadKind};
use crate::error::{GrammarError, GrammarResult};
use crate::line::{dedent, indent_width, LineRecord};

static PAYLOAD_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s{0,3}[+*-]\s+(?P<keyword>Request|Response)(?P<rest>\s.*)?$")
        .expect("payload item regex")
});
static REQUEST_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<name>[^(]*?)\s*(?:\((?P<media>[^)]*)\))?\s*$").expect("request regex")
});
static RESPONSE_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<status>[^\s(]+)?\s*(?:\((?P<media>[^)]*)\))?\s*$")
        .expect("response regex")
});
static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s{0,3}[+*-]\s+(?P<section>Headers|Body|Schema)\s*$").expect("section regex")
});

/// Signature line of a `+ Request` / `+ Response` list item.
#[derive(Debug, Clone)]
pub struct PayloadItem {
    pub kind: PayloadKind,
    pub name: Option<String>,
    pub status: Option<u16>,
    pub media_type: Option<String>,
}

/// Recognise a payload list item. `Ok(None)` means the line is not a payload at all.
pub fn payload_item(line: &LineRecord) -> GrammarResult<Option<PayloadItem>> {
    let Some(captures) = PAYLOAD_ITEM.captures(&line.text) else {
        return Ok(None);
    };
    let rest = captures.name("rest").map(|m| m.as_str()).unwrap_or("");

    let item = match &captures["keyword"] {
        "Request" => {
            let signature = REQUEST_SIGNATURE.captures(rest).ok_or_else(|| {
                GrammarError::new(line.number, format!("malformed request signature '{rest}'"))
            })?;
            PayloadItem {
                kind: PayloadKind::Request,
                name: non_empty(signature.name("name").map(|m| m.as_str())),
                status: None,
                media_type: non_empty(signature.name("media").map(|m| m.as_str())),
            }
        }
        _ => {
            let signature = RESPONSE_SIGNATURE.captures(rest).ok_or_else(|| {
                GrammarError::new(line.number, format!("malformed response signature '{rest}'"))
            })?;
            let status = match signature.name("status") {
                Some(token) => parse_status(token.as_str(), line.number)?,
                None => 200,
            };
            PayloadItem {
                kind: PayloadKind::Response,
                name: None,
                status: Some(status),
                media_type: non_empty(signature.name("media").map(|m| m.as_str())),
            }
        }
    };

    Ok(Some(item))
}

fn parse_status(token: &str, line: usize) -> GrammarResult<u16> {
    let invalid = || GrammarError::new(line, format!("invalid response status '{token}'"));
    if token.len() != 3 || !token.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(invalid());
    }
    let status: u16 = token.parse().map_err(|_| invalid())?;
    if !(100..=599).contains(&status) {
        return Err(invalid());
    }
    Ok(status)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Index one past the last line that belongs to the payload item at `start`.
pub fn content_end(lines: &[LineRecord], start: usize) -> usize {
    let item_indent = lines[start].indent();
    let mut end = start + 1;
    while let Some(line) = lines.get(end) {
        if !line.is_blank() && line.indent() < item_indent + 4 {
            break;
        }
        end += 1;
    }
    end
}

/// Build a payload from its signature and the indented lines beneath it.
pub fn build_payload(
    item: PayloadItem,
    signature_line: &LineRecord,
    content: &[LineRecord],
) -> GrammarResult<Payload> {
    let base_indent = signature_line.indent() + 4;
    let block: Vec<(usize, &str)> = content
        .iter()
        .map(|line| (line.number, dedent(&line.text, base_indent)))
        .collect();

    let mut payload = Payload {
        kind: item.kind,
        name: item.name,
        status: item.status,
        media_type: item.media_type,
        description: String::new(),
        headers: Vec::new(),
        body: None,
        schema: None,
        line: signature_line.number,
    };

    let has_sections = block
        .iter()
        .any(|(_, text)| SECTION_MARKER.is_match(text));

    if has_sections {
        let mut current: Option<String> = None;
        let mut buffer: Vec<(usize, &str)> = Vec::new();
        let mut preamble: Vec<(usize, &str)> = Vec::new();

        for (number, text) in block {
            if let Some(captures) = SECTION_MARKER.captures(text) {
                if let Some(section) = current.take() {
                    apply_section(&mut payload, &section, &buffer)?;
                }
                buffer.clear();
                current = Some(captures["section"].to_string());
            } else if current.is_some() {
                buffer.push((number, text));
            } else {
                preamble.push((number, text));
            }
        }
        if let Some(section) = current {
            apply_section(&mut payload, &section, &buffer)?;
        }
        payload.description = dedent_block(&preamble).unwrap_or_default();
    } else {
        payload.body = dedent_block(&block);
    }

    if let Some(media_type) = &payload.media_type {
        if payload.header("Content-Type").is_none() {
            payload.headers.insert(
                0,
                Header {
                    name: "Content-Type".into(),
                    value: media_type.clone(),
                },
            );
        }
    }

    Ok(payload)
}

fn apply_section(
    payload: &mut Payload,
    section: &str,
    lines: &[(usize, &str)],
) -> GrammarResult<()> {
    match section {
        "Headers" => {
            for (number, text) in lines {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let (name, value) = text.split_once(':').ok_or_else(|| {
                    GrammarError::new(*number, format!("malformed header line '{text}'"))
                })?;
                payload.headers.push(Header {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                });
            }
        }
        "Body" => payload.body = dedent_block(lines),
        _ => payload.schema = dedent_block(lines),
    }
    Ok(())
}

/// Strip the common indentation and surrounding blank lines from a block.
fn dedent_block(lines: &[(usize, &str)]) -> Option<String> {
    let common = lines
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(_, text)| indent_width(text))
        .min()?;

    let dedented: Vec<&str> = lines
        .iter()
        .map(|(_, text)| dedent(text, common).trim_end())
        .collect();

    let first = dedented.iter().position(|text| !text.is_empty())?;
    let last = dedented.iter().rposition(|text| !text.is_empty())?;
    Some(dedented[first..=last].join("\n"))
}
