/// Split content into chunks of roughly `max_chunk_size` characters.
///
/// Content at or under the limit is returned as a single chunk. Longer
/// content is split on blank-line-delimited paragraphs, greedily accumulated
/// until adding the next paragraph would cross the limit. A paragraph that
/// alone exceeds the limit is split further on sentence boundaries with the
/// same greedy accumulation. This is a heuristic splitter: a single
/// unsplittable run can still exceed the limit, and that is tolerated rather
/// than enforced.
pub fn chunk_content(content: &str, max_chunk_size: usize) -> Vec<String> {
    if content.len() <= max_chunk_size {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in split_paragraphs(content) {
        if paragraph.len() > max_chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_oversized_paragraph(paragraph, max_chunk_size));
            continue;
        }

        if !current.is_empty() && current.len() + 2 + paragraph.len() > max_chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_paragraphs(content: &str) -> impl Iterator<Item = &str> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// Sentence-level greedy split for a paragraph that exceeds the chunk limit.
fn split_oversized_paragraph(paragraph: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(paragraph) {
        if !current.is_empty() && current.len() + 1 + sentence.len() > max_chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = iter.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    let sentence = text[start..end].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = end;
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_is_single_chunk() {
        let chunks = chunk_content("hello world", 100);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_content_at_limit_is_single_chunk() {
        let content = "x".repeat(50);
        let chunks = chunk_content(&content, 50);
        assert_eq!(chunks, vec![content]);
    }

    #[test]
    fn test_paragraphs_accumulate_greedily() {
        // Three 30-char paragraphs with a 70-char limit: the first two share
        // a chunk, the third starts a new one.
        let para = "a".repeat(30);
        let content = format!("{p}\n\n{p}\n\n{p}", p = para);
        let chunks = chunk_content(&content, 70);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{p}\n\n{p}", p = para));
        assert_eq!(chunks[1], para);
    }

    #[test]
    fn test_oversized_paragraph_splits_on_sentences() {
        let content = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = chunk_content(content, 45);
        assert!(chunks.len() >= 2, "expected sentence-level split, got {:?}", chunks);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert!(chunks[0].starts_with("First sentence here."));
    }

    #[test]
    fn test_unsplittable_run_is_tolerated() {
        // One token longer than the limit with no sentence boundaries:
        // the splitter keeps it whole rather than enforcing the bound.
        let run = "y".repeat(120);
        let chunks = chunk_content(&run, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 120);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two! Three? Four");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn test_split_sentences_ignores_mid_token_dots() {
        let sentences = split_sentences("See example.com for details. Done.");
        assert_eq!(sentences, vec!["See example.com for details.", "Done."]);
    }

    #[test]
    fn test_chunks_rejoin_to_content() {
        let para = "word ".repeat(20);
        let para = para.trim();
        let content = format!("{p}\n\n{p}\n\n{p}\n\n{p}", p = para);
        let chunks = chunk_content(&content, 250);
        let rejoined = chunks.join("\n\n");
        assert_eq!(rejoined, content);
    }
}
