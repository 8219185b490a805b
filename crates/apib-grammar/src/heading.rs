use crate::line::{indent_width, LineRecord};
use pulldown_cmark::{Event, Options, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingKind {
    Atx,
    Setext,
}

#[derive(Debug, Clone)]
pub struct Heading {
    pub depth: usize,
    /// Heading text with markers stripped but inline markup intact.
    pub raw: String,
    pub normalized: String,
    pub kind: HeadingKind,
    /// Number of source lines the heading occupies (2 for setext).
    pub span: usize,
}

pub fn detect_heading(lines: &[LineRecord], index: usize) -> Option<Heading> {
    detect_atx_heading(lines, index).or_else(|| detect_setext_heading(lines, index))
}

fn detect_atx_heading(lines: &[LineRecord], index: usize) -> Option<Heading> {
    let line = lines.get(index)?;
    if indent_width(&line.text) > 3 {
        return None;
    }

    let trimmed_start = line.text.trim_start();
    let pound_count = trimmed_start.chars().take_while(|ch| *ch == '#').count();
    if pound_count == 0 || pound_count > 6 {
        return None;
    }

    let after_hashes = &trimmed_start[pound_count..];
    if !after_hashes.is_empty() && !after_hashes.starts_with(char::is_whitespace) {
        return None;
    }

    let mut content = after_hashes.trim();
    let stripped_hashes = content.trim_end_matches('#');
    if stripped_hashes.len() < content.len() && stripped_hashes.ends_with(char::is_whitespace) {
        content = stripped_hashes.trim_end();
    }

    Some(Heading {
        depth: pound_count,
        raw: content.to_string(),
        normalized: normalize_heading_text(content),
        kind: HeadingKind::Atx,
        span: 1,
    })
}

fn detect_setext_heading(lines: &[LineRecord], index: usize) -> Option<Heading> {
    let line = lines.get(index)?;
    let next = lines.get(index + 1)?;

    if line.is_blank() || indent_width(&line.text) > 3 || indent_width(&next.text) > 3 {
        return None;
    }

    // List items and metadata-like lines never become setext headings in a blueprint.
    let text = line.text.trim();
    if text.starts_with(['+', '-', '*']) {
        return None;
    }

    let underline = next.text.trim();
    let fence = underline.chars().next()?;
    if (fence != '=' && fence != '-') || underline.len() < 3 {
        return None;
    }
    if !underline.chars().all(|ch| ch == fence) {
        return None;
    }

    Some(Heading {
        depth: if fence == '=' { 1 } else { 2 },
        raw: text.to_string(),
        normalized: normalize_heading_text(text),
        kind: HeadingKind::Setext,
        span: 2,
    })
}

/// Strip inline markup and collapse whitespace.
pub fn normalize_heading_text(input: &str) -> String {
    let mut text = String::new();
    for event in Parser::new_ext(input, Options::empty()) {
        match event {
            Event::Text(cow) | Event::Code(cow) => text.push_str(&cow),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
