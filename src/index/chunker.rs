//! Markdown-aware article chunking.
//!
//! Splits an article into self-contained chunks along second-level heading
//! boundaries, injecting the article title (and the section heading, when one
//! exists) so every chunk reads standalone. Sections over the size cap are
//! split further at sentence boundaries.
//!
//! Output is a pure function of `(content, title)`: re-chunking identical
//! input yields an identical sequence, which is what lets the sync engine
//! replace an article's chunk set in full on every edit.

use regex::Regex;

/// Maximum estimated tokens per chunk.
pub const MAX_CHUNK_TOKENS: usize = 512;

/// Rough token estimate: one token per two characters. Not a real tokenizer;
/// deliberately language-agnostic (CJK-heavy and ASCII-heavy text both land
/// in a usable range).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 2
}

// ============================================================================
// Sections
// ============================================================================

/// One `## `-delimited section of the article body.
#[derive(Debug)]
struct Section {
    heading: Option<String>,
    body: String,
}

/// Returns the heading text if `line` opens a second-level section.
///
/// A section boundary is a line starting with exactly `## ` followed by at
/// least one character that is not `#` (so `###` subsections and bare `## `
/// markers stay inside the current section).
fn heading_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("## ")?;
    let first = rest.chars().next()?;
    if first == '#' {
        return None;
    }
    Some(rest.trim())
}

/// Splits the content into a leading heading-less section (if any text comes
/// before the first heading) plus one section per `## ` heading. A document
/// with no second-level headings comes back as a single section.
fn split_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        heading: None,
        body: String::new(),
    };

    for line in content.lines() {
        if let Some(heading) = heading_text(line) {
            if current.heading.is_some() || !current.body.trim().is_empty() {
                sections.push(current);
            }
            current = Section {
                heading: Some(heading.to_string()),
                body: String::new(),
            };
        } else {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }

    if current.heading.is_some() || !current.body.trim().is_empty() {
        sections.push(current);
    }

    sections
}

// ============================================================================
// Chunking
// ============================================================================

/// Splits markdown `content` into ordered, bounded-size chunks.
///
/// Every chunk is prefixed with a `# <title>` line, and with a `## <heading>`
/// line for sections that have one, so it stays self-contained when read out
/// of context. Empty or whitespace-only content yields no chunks.
pub fn chunk_markdown(content: &str, title: &str) -> Vec<String> {
    if content.trim().is_empty() {
        return vec![];
    }

    let mut chunks = Vec::new();

    for section in split_sections(content) {
        let full_text = match &section.heading {
            Some(heading) => format!("# {}\n## {}\n{}", title, heading, section.body),
            None => format!("# {}\n{}", title, section.body),
        };
        let full_text = full_text.trim();

        if estimate_tokens(full_text) <= MAX_CHUNK_TOKENS {
            chunks.push(full_text.to_string());
        } else {
            chunks.extend(split_by_sentences(full_text, MAX_CHUNK_TOKENS));
        }
    }

    chunks
}

/// Splits oversized text at sentence boundaries, greedily accumulating
/// sentences until adding the next one would exceed `max_tokens`.
///
/// Terminators (`. ! ? 。！？`) stay attached to their sentence; trailing
/// text without a terminator counts as a final sentence. A single sentence
/// longer than the cap is emitted as its own oversize chunk.
pub fn split_by_sentences(text: &str, max_tokens: usize) -> Vec<String> {
    let terminator = Regex::new(r"[。！？.!?]").unwrap();

    let mut sentences: Vec<&str> = Vec::new();
    let mut last = 0;
    for m in terminator.find_iter(text) {
        sentences.push(&text[last..m.end()]);
        last = m.end();
    }
    if last < text.len() {
        sentences.push(&text[last..]);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let combined = (current.chars().count() + sentence.chars().count()) / 2;
        if combined > max_tokens {
            if !current.trim().is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = sentence.to_string();
        } else {
            current.push_str(sentence);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_yields_no_chunks() {
        assert!(chunk_markdown("", "Guide").is_empty());
        assert!(chunk_markdown("   \n\n  ", "Guide").is_empty());
    }

    #[test]
    fn test_leading_section_and_heading_section() {
        let chunks = chunk_markdown("intro text\n## Setup\nshort body.", "Guide");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "# Guide\nintro text");
        assert_eq!(chunks[1], "# Guide\n## Setup\nshort body.");
    }

    #[test]
    fn test_no_headings_single_chunk() {
        let chunks = chunk_markdown("just a short paragraph without headings.", "Notes");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("# Notes\n"));
        assert!(chunks[0].contains("just a short paragraph"));
    }

    #[test]
    fn test_third_level_heading_stays_in_section() {
        let content = "## Topic\nbody line\n### Detail\nmore body";
        let chunks = chunk_markdown(content, "Doc");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("### Detail"));
    }

    #[test]
    fn test_bare_heading_marker_is_not_a_boundary() {
        // "## " with nothing after the space is body text, not a heading.
        let content = "before\n## \nafter";
        let chunks = chunk_markdown(content, "Doc");

        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_heading_with_empty_body_still_emits_a_chunk() {
        let chunks = chunk_markdown("## Roadmap\n", "Plans");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "# Plans\n## Roadmap");
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let content = "intro\n## A\nfirst section.\n## B\nsecond section.";
        let first = chunk_markdown(content, "Guide");
        let second = chunk_markdown(content, "Guide");

        assert_eq!(first, second);
    }

    #[test]
    fn test_section_order_preserved() {
        let content = "## One\nalpha\n## Two\nbeta\n## Three\ngamma";
        let chunks = chunk_markdown(content, "Doc");

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].contains("## One"));
        assert!(chunks[1].contains("## Two"));
        assert!(chunks[2].contains("## Three"));
    }

    #[test]
    fn test_section_bodies_reconstructable_in_order() {
        let content = "opening words\n## First\nalpha body\n## Second\nbeta body";
        let chunks = chunk_markdown(content, "Doc");

        let joined = chunks.join("\n");
        let alpha = joined.find("alpha body").unwrap();
        let beta = joined.find("beta body").unwrap();
        let opening = joined.find("opening words").unwrap();
        assert!(opening < alpha && alpha < beta);
    }

    #[test]
    fn test_oversize_section_splits_at_sentences() {
        // ~60 sentences of ~40 chars each: well over the 512-token estimate.
        let body: String = (0..60)
            .map(|i| format!("Sentence number {} fills out the section. ", i))
            .collect();
        let content = format!("## Long\n{}", body);
        let chunks = chunk_markdown(&content, "Doc");

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                estimate_tokens(chunk) <= MAX_CHUNK_TOKENS,
                "chunk exceeds the size cap: {} tokens",
                estimate_tokens(chunk)
            );
        }
    }

    #[test]
    fn test_oversize_single_sentence_kept_whole() {
        let sentence = format!("{}.", "x".repeat(1500));
        let chunks = split_by_sentences(&sentence, MAX_CHUNK_TOKENS);

        assert_eq!(chunks.len(), 1);
        assert!(estimate_tokens(&chunks[0]) > MAX_CHUNK_TOKENS);
    }

    #[test]
    fn test_trailing_text_without_terminator_is_kept() {
        let text = "First sentence. trailing fragment without a period";
        let chunks = split_by_sentences(text, 10);

        let joined = chunks.join(" ");
        assert!(joined.contains("trailing fragment"));
    }

    #[test]
    fn test_cjk_terminators_split_sentences() {
        let text = "第一句话。第二句话！第三句话？";
        let chunks = split_by_sentences(text, 4);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "第一句话。");
        assert_eq!(chunks[1], "第二句话！");
        assert_eq!(chunks[2], "第三句话？");
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 2);
        // Multibyte characters count once each.
        assert_eq!(estimate_tokens("你好世界"), 2);
    }
}
