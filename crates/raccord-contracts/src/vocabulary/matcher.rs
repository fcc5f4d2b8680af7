/// Finds vocabulary terms inside free scene or defect text.
pub trait TermMatcher: Send + Sync {
    /// Returns the first term (in table order) that occurs in `haystack`.
    fn find<'t>(&self, haystack: &str, terms: &'t [String]) -> Option<&'t str>;
}

/// Case-insensitive whole-token matcher.
///
/// Text is lowercased with Unicode rules and split on every non-alphanumeric
/// character, so accented French words tokenize intact and `face` does not
/// match inside `surface`. Multi-word terms match consecutive tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatcher;

impl TermMatcher for TokenMatcher {
    fn find<'t>(&self, haystack: &str, terms: &'t [String]) -> Option<&'t str> {
        let tokens = tokenize(haystack);
        if tokens.is_empty() {
            return None;
        }
        terms
            .iter()
            .find(|term| {
                let needle = tokenize(term);
                !needle.is_empty()
                    && tokens
                        .windows(needle.len())
                        .any(|window| window == needle.as_slice())
            })
            .map(String::as_str)
    }
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
