use regex::Regex;
use std::sync::OnceLock;

/// Terminal punctuation followed by whitespace ends a sentence
fn sentence_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]+\s+").expect("sentence pattern is valid"))
}

/// Split text into chunks of at most `max_chunk_chars` characters.
///
/// Sentences are packed greedily into a chunk while it still fits. A sentence
/// that cannot fit on its own is broken on word boundaries, and a single word
/// longer than the limit is broken on character boundaries. Whitespace inside
/// the text is collapsed to single spaces, so joining the chunks with `" "`
/// reproduces the normalized input.
///
/// Returns an empty vector for empty or whitespace-only input.
pub fn split_into_chunks(text: &str, max_chunk_chars: usize) -> Vec<String> {
    let max = max_chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        // Flush when the joining space plus the sentence would overflow
        if !current.is_empty() && char_len(&current) + 1 + char_len(&sentence) > max {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);

        if char_len(&current) > max {
            current = split_on_words(&current, max, &mut chunks);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Count whitespace separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last_end = 0;

    for boundary in sentence_boundary().find_iter(text) {
        push_normalized(&mut sentences, &text[last_end..boundary.end()]);
        last_end = boundary.end();
    }

    // Trailing fragment without terminal punctuation
    push_normalized(&mut sentences, &text[last_end..]);

    sentences
}

fn push_normalized(sentences: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
}

/// Flush full sub-chunks into `chunks` and return the unfinished remainder
fn split_on_words(text: &str, max: usize, chunks: &mut Vec<String>) -> String {
    let mut current = String::new();

    for word in text.split_whitespace() {
        for piece in split_long_word(word, max) {
            if !current.is_empty() && char_len(&current) + 1 + char_len(piece) > max {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(piece);
        }
    }

    current
}

fn split_long_word(word: &str, max: usize) -> Vec<&str> {
    if char_len(word) <= max {
        return vec![word];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in word.char_indices() {
        if count == max {
            pieces.push(&word[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&word[start..]);

    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
