//! Text normalization shared by the BM25 index, the query expander, and the
//! cross-encoder's truncation policy. Documents and queries must go through
//! this exact function; any divergence between how a document and a query
//! are tokenized is a defect.

/// Lowercases `text`, splits on runs of non-word characters (a "word"
/// character is a Unicode letter, digit, or underscore), and drops tokens
/// shorter than two characters. Order is preserved and duplicates are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in lower.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            push_token(&mut tokens, &mut current);
        }
    }
    if !current.is_empty() {
        push_token(&mut tokens, &mut current);
    }
    tokens
}

fn push_token(tokens: &mut Vec<String>, current: &mut String) {
    if current.chars().count() >= 2 {
        tokens.push(std::mem::take(current));
    } else {
        current.clear();
    }
}
