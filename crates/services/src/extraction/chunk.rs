use exam_core::model::ProviderKind;

/// Character budget per Gemini extraction request.
pub const GEMINI_CHUNK_CHARS: usize = 12_000;

/// Character budget per Groq extraction request.
pub const GROQ_CHUNK_CHARS: usize = 15_000;

pub(crate) fn chunk_budget(provider: ProviderKind) -> usize {
    match provider {
        ProviderKind::Gemini => GEMINI_CHUNK_CHARS,
        ProviderKind::Groq => GROQ_CHUNK_CHARS,
    }
}

/// Split `text` into consecutive slices of at most `max_chars` characters,
/// cutting only after a newline.
///
/// Each slice keeps its line terminators, so concatenating the result gives
/// back `text` exactly. A line longer than the budget becomes a chunk of its
/// own instead of being truncated.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut len_chars = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if len_chars > 0 && len_chars + line_chars > max_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            len_chars = 0;
        }
        len_chars += line_chars;
        offset += line.len();
    }
    if offset > start {
        chunks.push(&text[start..offset]);
    }
    chunks
}

/// Split text produced by PDF text extraction on `--- Page N ---` markers.
///
/// Returns `(page_number, body)` pairs. Text before the first marker is
/// reported as page 0; input without markers is a single page 0.
#[must_use]
pub fn split_pages(text: &str) -> Vec<(u32, String)> {
    let mut pages: Vec<(u32, String)> = Vec::new();
    let mut current = (0, String::new());

    for line in text.lines() {
        if let Some(number) = page_marker(line) {
            if !current.1.trim().is_empty() {
                pages.push(current);
            }
            current = (number, String::new());
            continue;
        }
        current.1.push_str(line);
        current.1.push('\n');
    }
    if !current.1.trim().is_empty() {
        pages.push(current);
    }
    pages
}

fn page_marker(line: &str) -> Option<u32> {
    line.trim()
        .strip_prefix("--- Page ")?
        .strip_suffix(" ---")?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_reassemble_to_the_original_text() {
        let text = "Part I: Networks\n1. What is TCP?\nA. a\nB. b\nC. c\nD. d\n\n2. Second?\nlast line without newline";
        for budget in [1, 5, 16, 40, 1_000] {
            let chunks = chunk_text(text, budget);
            assert_eq!(chunks.concat(), text, "budget {budget}");
            assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
        }
    }

    #[test]
    fn chunks_end_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = chunk_text(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
    }

    #[test]
    fn overlong_line_is_kept_whole() {
        let long = "x".repeat(30);
        let text = format!("short\n{long}\nend\n");
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks, vec!["short\n", &format!("{long}\n"), "end\n"]);
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let text = "ééééé\nààààà\n";
        assert_eq!(chunk_text(text, 12).len(), 1);
        assert_eq!(chunk_text(text, 11).len(), 2);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
    }

    #[test]
    fn split_pages_follows_markers() {
        let text = "--- Page 1 ---\n1. First?\n--- Page 2 ---\n\n--- Page 3 ---\n2. Third?\n";
        let pages = split_pages(text);
        assert_eq!(
            pages,
            vec![(1, "1. First?\n".to_string()), (3, "2. Third?\n".to_string())]
        );
        assert_eq!(split_pages("plain\n"), vec![(0, "plain\n".to_string())]);
    }
}
