//! Adaptive truncation strategies for oversized embedding inputs.

/// How to shorten a text that's too long for the embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationStrategy {
    /// Keep the start, drop the end.
    Head,
    /// Keep the end, drop the start.
    Tail,
    /// Keep both ends, drop the middle, join with an ellipsis.
    Middle,
    /// Walk backward from the target for a paragraph boundary, then a
    /// sentence boundary, before falling back to a hard cut.
    Smart,
}

/// Cheap token estimate: `⌈chars/4⌉`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

impl TruncationStrategy {
    /// Shorten `text` to approximately `target_chars`, per this
    /// strategy.
    pub fn truncate(&self, text: &str, target_chars: usize) -> String {
        if text.chars().count() <= target_chars {
            return text.to_string();
        }
        match self {
            Self::Head => truncate_chars(text, target_chars),
            Self::Tail => {
                let total = text.chars().count();
                let skip = total - target_chars;
                text.chars().skip(skip).collect()
            }
            Self::Middle => {
                let half = target_chars / 2;
                let head: String = text.chars().take(half).collect();
                let tail: String = {
                    let total = text.chars().count();
                    let skip = total.saturating_sub(target_chars - half);
                    text.chars().skip(skip).collect()
                };
                format!("{head}…{tail}")
            }
            Self::Smart => smart_truncate(text, target_chars),
        }
    }
}

fn truncate_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

fn smart_truncate(text: &str, target_chars: usize) -> String {
    let head: String = truncate_chars(text, target_chars);
    if let Some(idx) = head.rfind("\n\n") {
        return head[..idx].to_string();
    }
    if let Some(idx) = head.rfind(". ") {
        return format!("{}.", &head[..idx]);
    }
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOREM: &str = "First paragraph goes here.\n\nSecond paragraph. Has two sentences. Third sentence trails off without a period";

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(TruncationStrategy::Head.truncate("short", 100), "short");
    }

    #[test]
    fn head_keeps_prefix() {
        let out = TruncationStrategy::Head.truncate("abcdefgh", 4);
        assert_eq!(out, "abcd");
    }

    #[test]
    fn tail_keeps_suffix() {
        let out = TruncationStrategy::Tail.truncate("abcdefgh", 4);
        assert_eq!(out, "efgh");
    }

    #[test]
    fn middle_keeps_both_ends() {
        let out = TruncationStrategy::Middle.truncate("abcdefghij", 6);
        assert!(out.starts_with("abc"));
        assert!(out.contains('…'));
    }

    #[test]
    fn smart_prefers_paragraph_boundary() {
        let out = TruncationStrategy::Smart.truncate(LOREM, 40);
        assert_eq!(out, "First paragraph goes here.");
    }

    #[test]
    fn smart_falls_back_to_sentence_boundary() {
        let text = "One sentence here. Two sentence here. Three trails off no period";
        let out = TruncationStrategy::Smart.truncate(text, 30);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn smart_falls_back_to_hard_cut_with_ellipsis() {
        let text = "nopunctuationatallnospacesnoboundaries";
        let out = TruncationStrategy::Smart.truncate(text, 10);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("abcde"), 2); // 5 chars -> ceil(5/4) = 2
        assert_eq!(estimate_tokens("abcd"), 1);
    }
}
