//! Recursive character splitting of article text.
//!
//! Articles are split at the coarsest separator that produces pieces within
//! the size limit, falling back through the configured separator list
//! (paragraph, line, sentence, clause by default) and finally to a hard
//! character split. Separators stay attached to the piece they terminate, so
//! concatenating a document's chunks in order reproduces its text exactly.

use crate::config::ChunkingConfig;
use crate::scrape::Article;

/// A bounded-size span of one article, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source_url: String,
    /// Position of this chunk within its article, starting at 0
    pub sequence_index: u32,
}

/// Split every article into chunks, preserving article order.
///
/// Within an article, chunks are in textual order with ascending
/// `sequence_index`, each inheriting the article's `source_url`.
pub fn split_articles(articles: &[Article], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for article in articles {
        let pieces = split_text(&article.raw_text, config.max_chunk_size, &config.separators);
        for (i, text) in pieces.into_iter().enumerate() {
            chunks.push(Chunk {
                text,
                source_url: article.source_url.clone(),
                sequence_index: i as u32,
            });
        }
    }
    chunks
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Tries each separator in order; pieces still over the limit recurse with
/// the remaining separators, and a hard character split is the last resort.
pub fn split_text(text: &str, max_chars: usize, separators: &[String]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return hard_split(text, max_chars);
    };

    if separator.is_empty() || !text.contains(separator.as_str()) {
        return split_text(text, max_chars, rest);
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for piece in text.split_inclusive(separator.as_str()) {
        let piece_len = char_len(piece);

        if piece_len > max_chars {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.extend(split_text(piece, max_chars, rest));
            continue;
        }

        if !current.is_empty() && char_len(&current) + piece_len > max_chars {
            out.push(std::mem::take(&mut current));
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        out.push(current);
    }

    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max {
            out.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;

    fn separators() -> Vec<String> {
        ChunkingConfig::default().separators
    }

    fn article(url: &str, text: &str) -> Article {
        Article {
            source_url: url.to_string(),
            raw_text: text.to_string(),
        }
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        let pieces = split_text("short text", 1000, &separators());
        assert_eq!(pieces, vec!["short text"]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(split_text("", 1000, &separators()).is_empty());
    }

    #[test]
    fn test_splits_on_paragraphs_first() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let pieces = split_text(&text, 40, &separators());
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], format!("{}\n\n", "a".repeat(30)));
        assert_eq!(pieces[1], "b".repeat(30));
    }

    #[test]
    fn test_merges_pieces_up_to_limit() {
        let text = "one.two.three.four.";
        let pieces = split_text(text, 9, &separators());
        for piece in &pieces {
            assert!(piece.chars().count() <= 9);
        }
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_falls_back_to_finer_separators() {
        // no paragraph or line breaks, so the sentence separator must be used
        let text = format!("{}.{}", "a".repeat(50), "b".repeat(50));
        let pieces = split_text(&text, 60, &separators());
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], format!("{}.", "a".repeat(50)));
    }

    #[test]
    fn test_hard_split_as_last_resort() {
        let text = "x".repeat(2500);
        let pieces = split_text(&text, 1000, &separators());
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].chars().count(), 1000);
        assert_eq!(pieces[1].chars().count(), 1000);
        assert_eq!(pieces[2].chars().count(), 500);
    }

    #[test]
    fn test_hard_split_respects_char_boundaries() {
        let text = "é".repeat(15);
        let pieces = split_text(&text, 10, &[]);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].chars().count(), 10);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        let text = "Paragraph one with some text.\n\nParagraph two, a bit longer, with \
                    clauses and more detail.\nA line.\n\nFinal paragraph."
            .repeat(8);
        let pieces = split_text(&text, 80, &separators());
        for piece in &pieces {
            assert!(piece.chars().count() <= 80);
        }
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_split_articles_inherits_source_and_order() {
        let config = ChunkingConfig {
            max_chunk_size: 20,
            separators: separators(),
        };
        let articles = vec![
            article("http://a.com", "first article.\n\nsecond paragraph here."),
            article("http://b.com", "tiny"),
        ];
        let chunks = split_articles(&articles, &config);

        assert!(chunks.len() >= 3);
        let a_chunks: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.source_url == "http://a.com")
            .collect();
        for (i, chunk) in a_chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i as u32);
        }
        // article order preserved: all of a's chunks come before b's
        let b_start = chunks
            .iter()
            .position(|c| c.source_url == "http://b.com")
            .unwrap();
        assert_eq!(b_start, a_chunks.len());
        assert_eq!(chunks[b_start].text, "tiny");
        assert_eq!(chunks[b_start].sequence_index, 0);
    }

    #[test]
    fn test_split_articles_empty_input() {
        let chunks = split_articles(&[], &ChunkingConfig::default());
        assert!(chunks.is_empty());
    }
}
