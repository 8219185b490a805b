use crate::line::{dedent, indent_width};

#[derive(Clone, Copy, Debug)]
struct Fence {
    marker: char,
    len: usize,
    opened_at: usize,
}

/// Tracks fenced code blocks so headings and list items inside them stay literal.
#[derive(Debug, Default)]
pub struct FenceTracker {
    open: Option<Fence>,
}

impl FenceTracker {
    /// Feed one line. Returns true when the line belongs to a fenced block,
    /// including the opening and closing fence lines themselves.
    pub fn process(&mut self, line: &str, number: usize) -> bool {
        if let Some(fence) = self.open {
            if is_closing_fence(line, fence) {
                self.open = None;
            }
            return true;
        }

        if let Some(fence) = detect_fence_start(line, number) {
            self.open = Some(fence);
            return true;
        }

        false
    }

    /// Line number of a fence that was never closed.
    pub fn unclosed(&self) -> Option<usize> {
        self.open.map(|fence| fence.opened_at)
    }
}

fn detect_fence_start(line: &str, number: usize) -> Option<Fence> {
    if indent_width(line) > 3 {
        return None;
    }

    let rest = dedent(line, 3);
    let marker = rest.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }

    let len = rest.chars().take_while(|ch| *ch == marker).count();
    if len < 3 {
        return None;
    }

    Some(Fence {
        marker,
        len,
        opened_at: number,
    })
}

fn is_closing_fence(line: &str, fence: Fence) -> bool {
    if indent_width(line) > 3 {
        return false;
    }

    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|ch| ch == fence.marker)
        && trimmed.chars().count() >= fence.len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_fence_until_matching_close() {
        let mut tracker = FenceTracker::default();
        assert!(tracker.process("````md", 1));
        assert!(tracker.process("```", 2));
        assert!(tracker.process("# not a heading", 3));
        assert!(tracker.process("````", 4));
        assert!(!tracker.process("# heading", 5));
        assert!(tracker.unclosed().is_none());
    }

    #[test]
    fn reports_unclosed_fence() {
        let mut tracker = FenceTracker::default();
        tracker.process("~~~", 7);
        tracker.process("body", 8);
        assert_eq!(tracker.unclosed(), Some(7));
    }
}
