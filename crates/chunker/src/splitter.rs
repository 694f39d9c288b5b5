//! Recursive separator-priority splitter.
//!
//! Lengths are measured in characters. Text is cut at the coarsest separator
//! present; pieces still over budget are split again with the finer
//! separators that follow it. Adjacent small pieces are then merged greedily
//! up to the budget, carrying a tail of earlier pieces (up to the overlap)
//! into the next chunk. Separators stay attached to the start of the piece
//! that follows them, so merging never needs to re-insert them.

use std::collections::VecDeque;

/// Paragraph break, line break, sentence end, word boundary, character.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_separators(chunk_size, chunk_overlap, &DEFAULT_SEPARATORS)
    }

    pub fn with_separators(chunk_size: usize, chunk_overlap: usize, separators: &[&str]) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: separators.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window);
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_joined(&mut merged, &window);
        merged
    }
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Cut `text` at every occurrence of `separator`, keeping the separator at the
/// start of the following piece. An empty separator yields characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn separator_attaches_to_following_piece() {
        assert_eq!(
            split_keeping_separator("a. b. c", ". "),
            vec!["a", ". b", ". c"]
        );
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
        assert_eq!(split_keeping_separator("héllo", "").len(), 5);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let s = RecursiveSplitter::new(100, 10);
        assert_eq!(s.split("  hello world  "), vec!["hello world"]);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let para = "word ".repeat(8); // 40 chars
        let text = format!("{para}\n\n{para}\n\n{para}");
        let s = RecursiveSplitter::new(50, 0);
        let chunks = s.split(&text);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert_eq!(c, para.trim());
        }
    }

    #[test]
    fn falls_back_to_words_for_long_lines() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let s = RecursiveSplitter::new(20, 0);
        let chunks = s.split(text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn overlap_repeats_tail_words() {
        let text = (0..40).map(|i| format!("w{i:02}")).collect::<Vec<_>>().join(" ");
        let s = RecursiveSplitter::new(40, 12);
        let chunks = s.split(&text);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').next_back().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected `{}` to carry `{last_word}`",
                pair[1]
            );
        }
    }

    #[test]
    fn unbroken_text_splits_by_character() {
        let text = "x".repeat(25);
        let s = RecursiveSplitter::new(10, 0);
        let chunks = s.split(&text);
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    proptest! {
        #[test]
        fn chunks_never_exceed_budget(
            words in prop::collection::vec("[a-z]{1,12}", 1..200),
            size in 16usize..120,
            overlap in 0usize..16,
        ) {
            let text = words.join(" ");
            let s = RecursiveSplitter::new(size, overlap);
            let chunks = s.split(&text);
            prop_assert!(!chunks.is_empty());
            for c in &chunks {
                prop_assert!(c.chars().count() <= size);
                prop_assert!(!c.trim().is_empty());
            }
        }
    }
}
