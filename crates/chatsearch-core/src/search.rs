//! Query matching shared by the in-memory sources and the contacts pane.
//!
//! - Multi-term AND queries, split on whitespace or '+'
//! - ASCII case-insensitive matching

use crate::models::Peer;

/// Split a query into lowercased terms that must all match.
///
/// # Examples
/// - "ann" -> ["ann"]
/// - "ann lee" -> ["ann", "lee"]
/// - "  ann + lee  " -> ["ann", "lee"]
/// - "" -> []
pub fn parse_search_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == '+' || c.is_whitespace())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Check if text contains a search term (ASCII case-insensitive)
pub fn text_contains_term(text: &str, term: &str) -> bool {
    let text_chars: Vec<char> = text.chars().collect();
    let term_chars: Vec<char> = term.chars().collect();

    if term_chars.is_empty() {
        return true;
    }
    if text_chars.len() < term_chars.len() {
        return false;
    }

    text_chars.windows(term_chars.len()).any(|window| {
        window
            .iter()
            .zip(&term_chars)
            .all(|(c, tc)| c.eq_ignore_ascii_case(tc))
    })
}

pub fn text_contains_all_terms(text: &str, terms: &[String]) -> bool {
    terms.iter().all(|term| text_contains_term(text, term))
}

fn starts_with_ignore_ascii_case(text: &str, prefix: &str) -> bool {
    let mut chars = text.chars();
    prefix
        .chars()
        .all(|pc| chars.next().is_some_and(|c| c.eq_ignore_ascii_case(&pc)))
}

/// Every term must prefix a word of the title or the username.
pub fn peer_matches_query(peer: &Peer, query: &str) -> bool {
    let terms = parse_search_terms(query);
    if terms.is_empty() {
        return false;
    }
    terms.iter().all(|term| {
        let in_title = peer
            .title
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| starts_with_ignore_ascii_case(word, term));
        let in_username = peer
            .username
            .as_deref()
            .is_some_and(|username| starts_with_ignore_ascii_case(username, term));
        in_title || in_username
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_terms() {
        assert_eq!(parse_search_terms("ann"), vec!["ann"]);
        assert_eq!(parse_search_terms("Ann Lee"), vec!["ann", "lee"]);
        assert_eq!(parse_search_terms("  ann + lee  "), vec!["ann", "lee"]);
        assert_eq!(parse_search_terms("ann++lee"), vec!["ann", "lee"]);
        assert!(parse_search_terms("").is_empty());
    }

    #[test]
    fn test_text_contains_term() {
        assert!(text_contains_term("Hello World", "hello"));
        assert!(text_contains_term("Hello World", "lo Wo"));
        assert!(!text_contains_term("Hello World", "xyz"));
        assert!(text_contains_term("Hello World", ""));
        assert!(!text_contains_term("Hi", "Hello"));
    }

    #[test]
    fn test_text_contains_all_terms() {
        let terms = vec!["lunch".to_string(), "friday".to_string()];
        assert!(text_contains_all_terms("Lunch on Friday?", &terms));
        assert!(!text_contains_all_terms("Lunch today", &terms));
        assert!(text_contains_all_terms("anything", &[]));
    }

    #[test]
    fn test_peer_matches_query() {
        let ann = Peer::user(1, "Ann Lee").with_username("annlee");
        assert!(peer_matches_query(&ann, "ann"));
        assert!(peer_matches_query(&ann, "lee"));
        assert!(peer_matches_query(&ann, "ann le"));
        assert!(!peer_matches_query(&ann, "nn"));
        assert!(!peer_matches_query(&ann, ""));

        let bot = Peer::user(2, "Weather").with_username("forecast_bot");
        assert!(peer_matches_query(&bot, "fore"));
        assert!(!peer_matches_query(&bot, "cast"));
    }
}
