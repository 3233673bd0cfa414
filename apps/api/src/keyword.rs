/// Splits a saved keyword phrase into search terms. Double-quoted spans are
/// kept whole (quotes removed) and come first; the rest is split on whitespace.
pub fn tokenize_keywords(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut quoted = Vec::new();
    let mut remainder = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '"' {
            let close = chars[i + 1..].iter().position(|&c| c == '"').map(|p| i + 1 + p);
            if let Some(close) = close.filter(|&close| close > i + 1) {
                quoted.push(chars[i + 1..close].iter().collect::<String>());
                i = close + 1;
                continue;
            }
        }
        remainder.push(chars[i]);
        i += 1;
    }

    quoted
        .iter()
        .map(|t| t.trim())
        .chain(remainder.split_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Order-independent form of a token set: sorted, joined with `|`.
pub fn canonical(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_tokens_come_first() {
        assert_eq!(
            tokenize_keywords("\"AI\" LLM エンジニア"),
            vec!["AI", "LLM", "エンジニア"]
        );
        assert_eq!(
            tokenize_keywords("rust \"machine learning\" books"),
            vec!["machine learning", "rust", "books"]
        );
    }

    #[test]
    fn test_apostrophes_are_plain_characters() {
        assert_eq!(
            tokenize_keywords("\"own's\" LLM owns' エンジニア"),
            vec!["own's", "LLM", "owns'", "エンジニア"]
        );
    }

    #[test]
    fn test_unbalanced_and_empty_quotes() {
        assert_eq!(tokenize_keywords("\"\" a"), vec!["\"\"", "a"]);
        assert_eq!(tokenize_keywords("a \"b"), vec!["a", "\"b"]);
        assert!(tokenize_keywords("   ").is_empty());
        assert!(tokenize_keywords("\"  \"").is_empty());
    }

    #[test]
    fn test_canonical_ignores_order() {
        let a = tokenize_keywords("rust \"machine learning\"");
        let b = tokenize_keywords("\"machine learning\" rust");
        assert_eq!(canonical(&a), canonical(&b));
        assert_eq!(canonical(&a), "machine learning|rust");
    }
}
