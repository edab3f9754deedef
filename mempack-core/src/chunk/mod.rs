//! Splits normalized text into overlapping, bounded-size chunks.

use crate::config::ChunkingConfig;
use regex::Regex;
use std::sync::LazyLock;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?](\s|$)").expect("static regex"));

/// Collapses runs of whitespace to a single space and trims the ends.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenMode {
    Chars,
    Words,
    Sentences,
}

/// Rough token count used for logging/diagnostics, not for wire offsets.
pub fn count_tokens(text: &str, mode: TokenMode) -> usize {
    match mode {
        TokenMode::Chars => text.chars().count(),
        TokenMode::Words => text.split_whitespace().count(),
        TokenMode::Sentences => SENTENCE_END.find_iter(text).count().max(if text.trim().is_empty() { 0 } else { 1 }),
    }
}

/// Finds the best cut point at or before `nominal` (char index), preferring
/// a sentence boundary within `[nominal - window, nominal + window]`. Falls
/// back to a hard cut exactly at `nominal` when no boundary is in range:
/// chunk length must stay bounded even for punctuation-free input.
fn boundary_cut(chars: &[char], nominal: usize, window: usize) -> usize {
    let lo = nominal.saturating_sub(window);
    let hi = (nominal + window).min(chars.len());
    if lo >= hi {
        return nominal.min(chars.len());
    }
    let window_str: String = chars[lo..hi].iter().collect();
    let mut best: Option<usize> = None;
    for m in SENTENCE_END.find_iter(&window_str) {
        let char_pos = lo + window_str[..m.end()].chars().count();
        match best {
            None => best = Some(char_pos),
            Some(b) => {
                if nominal.abs_diff(char_pos) < nominal.abs_diff(b) {
                    best = Some(char_pos);
                }
            }
        }
    }
    best.unwrap_or_else(|| nominal.min(chars.len()))
}

/// Splits normalized `text` into chunks of roughly `config.chunk_size`
/// characters, overlapping by `config.chunk_overlap` characters, discarding
/// any trailing fragment shorter than `config.min_chunk_size`.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let normalized = normalize_text(text);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let nominal_end = start + config.chunk_size;
        let end = if nominal_end >= chars.len() {
            chars.len()
        } else {
            boundary_cut(&chars, nominal_end, config.boundary_window).max(start + 1)
        };

        let piece: String = chars[start..end].iter().collect();
        if piece.chars().count() >= config.min_chunk_size {
            chunks.push(piece);
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(config.chunk_overlap);
        if start >= end {
            start = end;
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 4,
            min_chunk_size: 3,
            boundary_window: 5,
        }
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  a   b\n\tc  "), "a b c");
    }

    #[test]
    fn chunk_text_respects_overlap_and_bounds() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota kappa.";
        let chunks = chunk_text(text, &cfg());
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= cfg().chunk_size + cfg().boundary_window);
        }
    }

    #[test]
    fn chunk_text_hard_cuts_without_punctuation() {
        let text = "a".repeat(100);
        let chunks = chunk_text(&text, &cfg());
        assert!(chunks.iter().all(|c| c.chars().count() <= cfg().chunk_size));
    }

    #[test]
    fn chunk_text_empty_input_yields_no_chunks() {
        assert!(chunk_text("   ", &cfg()).is_empty());
    }

    #[test]
    fn chunk_text_discards_undersized_first_chunk() {
        let tiny_cfg = ChunkingConfig {
            chunk_size: 512,
            chunk_overlap: 64,
            min_chunk_size: 32,
            boundary_window: 48,
        };
        assert!(chunk_text("hi", &tiny_cfg).is_empty());
    }

    #[test]
    fn count_tokens_modes() {
        let text = "one two three. four five!";
        assert_eq!(count_tokens(text, TokenMode::Words), 5);
        assert!(count_tokens(text, TokenMode::Chars) > 0);
        assert_eq!(count_tokens(text, TokenMode::Sentences), 2);
    }
}
