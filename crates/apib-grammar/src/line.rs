#[derive(Debug, Clone)]
pub struct LineRecord {
    pub text: String,
    /// 1-based line number.
    pub number: usize,
}

impl LineRecord {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn indent(&self) -> usize {
        indent_width(&self.text)
    }
}

pub fn split_lines(source: &str) -> Vec<LineRecord> {
    source
        .split('\n')
        .enumerate()
        .map(|(idx, raw)| LineRecord {
            text: raw.strip_suffix('\r').unwrap_or(raw).to_string(),
            number: idx + 1,
        })
        .collect()
}

pub fn indent_width(line: &str) -> usize {
    let mut width = 0usize;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

/// Remove up to `columns` columns of leading whitespace, expanding tabs to four.
pub fn dedent(line: &str, columns: usize) -> &str {
    let mut width = 0usize;
    for (idx, ch) in line.char_indices() {
        if width >= columns {
            return &line[idx..];
        }
        match ch {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => return &line[idx..],
        }
    }
    ""
}
