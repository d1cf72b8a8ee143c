use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases a name can trail. Tried in order; the first capture wins.
static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"tell me about (.+)",
        r"remind me about (.+)",
        r"what do i know about (.+)",
        r"forget about (.+)",
        r"who (?:is|was) (.+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("name pattern"))
    .collect()
});

/// Extract a candidate person name from an utterance.
///
/// The utterance is lower-cased and a single trailing `? . ! ,` stripped
/// before matching. The captured noun phrase comes back title-cased word
/// by word, so extraction is idempotent and case-normalizing:
///
/// ```
/// use visage::name::extract_name;
///
/// assert_eq!(extract_name("Tell me about john smith."), Some("John Smith".into()));
/// assert_eq!(extract_name("tell me about John Smith"), Some("John Smith".into()));
/// assert_eq!(extract_name("what's the weather"), None);
/// ```
pub fn extract_name(utterance: &str) -> Option<String> {
    let mut lower = utterance.trim().to_lowercase();
    if lower.ends_with(['?', '.', '!', ',']) {
        lower.pop();
    }
    for pattern in NAME_PATTERNS.iter() {
        if let Some(m) = pattern.captures(&lower).and_then(|c| c.get(1)) {
            let name = title_case(m.as_str().trim());
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

/// Upper-case the first letter of each whitespace-separated token.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_punctuation_and_title_cases() {
        assert_eq!(extract_name("Tell me about john smith."), Some("John Smith".into()));
        assert_eq!(extract_name("tell me about John Smith"), Some("John Smith".into()));
        assert_eq!(extract_name("who is mark?"), Some("Mark".into()));
        assert_eq!(extract_name("who was ada lovelace"), Some("Ada Lovelace".into()));
    }

    #[test]
    fn pattern_order_is_stable() {
        assert_eq!(
            extract_name("remind me about the guy from the gym"),
            Some("The Guy From The Gym".into())
        );
        assert_eq!(extract_name("what do i know about jane"), Some("Jane".into()));
        assert_eq!(extract_name("forget about mark"), Some("Mark".into()));
    }

    #[test]
    fn no_match_or_empty_capture_yields_none() {
        assert_eq!(extract_name("take a photo"), None);
        assert_eq!(extract_name("tell me about ?"), None);
        assert_eq!(extract_name(""), None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let once = extract_name("tell me about JOHN SMITH").unwrap();
        assert_eq!(extract_name(&format!("tell me about {once}")), Some(once));
    }
}
