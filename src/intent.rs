use crate::name::extract_name;

/// A confirmed command parsed from one final utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Identify the person the user is looking at.
    Recognize,
    /// Look up a stored person by name.
    Query { name: Option<String> },
    /// Forget a stored person by name.
    Delete { name: Option<String> },
    /// Start collecting an introduction conversation.
    Remember,
}

/// The intent families worth acting on before the final transcript lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeculativeKind {
    Recognize,
    Remember,
    Query,
}

const RECOGNIZE_TRIGGERS: &[&str] = &[
    "who is this",
    "who's this",
    "who am i looking at",
    "who am i talking to",
    "do i know this person",
    "have i met this person",
];

// Deliberately no "who is" here: Recognize owns that family.
const QUERY_TRIGGERS: &[&str] = &["tell me about", "what do i know about", "remind me about"];

const DELETE_TRIGGERS: &[&str] = &["forget about", "delete person", "remove person"];

const REMEMBER_TRIGGERS: &[&str] = &[
    "remember this person",
    "remember who i'm talking to",
    "introduce yourself",
    "like you to meet",
];

const FAREWELL_PHRASES: &[&str] = &[
    "nice to meet you",
    "nice meeting you",
    "good to meet you",
    "great to meet you",
    "pleasure to meet you",
    "pleasure meeting you",
    "see you later",
    "see you around",
    "goodbye",
    "bye bye",
    "talk to you later",
];

fn contains_any(lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| lower.contains(p))
}

/// Classify one utterance into an [`Intent`].
///
/// Trigger phrases match by case-insensitive substring containment, and
/// families are tried in strict priority order Recognize > Query > Delete
/// > Remember; the first match wins. "who is this" is Recognize even
/// though it would also yield a Query name. Classification is pure: the
/// same string always yields the same result.
pub fn classify(utterance: &str) -> Option<Intent> {
    let lower = utterance.to_lowercase();
    if contains_any(&lower, RECOGNIZE_TRIGGERS) {
        return Some(Intent::Recognize);
    }
    if contains_any(&lower, QUERY_TRIGGERS) {
        return Some(Intent::Query {
            name: extract_name(utterance),
        });
    }
    if contains_any(&lower, DELETE_TRIGGERS) {
        return Some(Intent::Delete {
            name: extract_name(utterance),
        });
    }
    if contains_any(&lower, REMEMBER_TRIGGERS) {
        return Some(Intent::Remember);
    }
    None
}

/// Classify a partial transcript against the speculatable families only.
///
/// Priority here is Recognize > Remember > Query, per how expensive a
/// wrong head start is to correct.
pub fn classify_speculative(partial: &str) -> Option<SpeculativeKind> {
    let lower = partial.to_lowercase();
    if contains_any(&lower, RECOGNIZE_TRIGGERS) {
        return Some(SpeculativeKind::Recognize);
    }
    if contains_any(&lower, REMEMBER_TRIGGERS) {
        return Some(SpeculativeKind::Remember);
    }
    if contains_any(&lower, QUERY_TRIGGERS) {
        return Some(SpeculativeKind::Query);
    }
    None
}

/// Whether a collected line closes the conversation early.
pub fn is_farewell(line: &str) -> bool {
    contains_any(&line.to_lowercase(), FAREWELL_PHRASES)
}
