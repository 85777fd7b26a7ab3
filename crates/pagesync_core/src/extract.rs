use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// One field update extracted from commit free text. `field` is the
/// title-cased label as it should appear on the page; `value` is the
/// literal replacement text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitUpdate {
    pub field: String,
    pub value: String,
}

/// The bracketed routing triple plus the free text that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
    pub project: String,
    pub module: String,
    pub component: String,
    pub description: String,
}

/// Closed set of verb phrases, most specific first so that a longer
/// phrase wins over a bare "is" at the same position.
const UPDATE_PATTERN: &str =
    r"(?i)([\w\s\-]+?)\s+(?:is updated to|is changed to|is|was|changed to|updated to|set to)\s+([^\s,;]+)";

const BRACKET_PATTERN: &str = r"\[(.*?)\]";

/// Parse `"[project][module][component] <description>"`. Tokens are
/// trimmed and lowercased; everything after the third closing bracket is
/// kept verbatim as the description. Returns `None` with fewer than
/// three bracketed tokens.
pub fn parse_commit_message(message: &str) -> Option<CommitRef> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(BRACKET_PATTERN).expect("bracket pattern"));

    let mut tokens = Vec::with_capacity(3);
    let mut description_start = 0usize;
    for found in re.find_iter(message) {
        tokens.push(message[found.start() + 1..found.end() - 1].trim().to_lowercase());
        description_start = found.end();
        if tokens.len() == 3 {
            break;
        }
    }
    if tokens.len() < 3 {
        return None;
    }

    let mut tokens = tokens.into_iter();
    Some(CommitRef {
        project: tokens.next()?,
        module: tokens.next()?,
        component: tokens.next()?,
        description: message[description_start..].to_string(),
    })
}

/// Scan free text for `<field phrase> <verb phrase> <value token>`
/// occurrences. Matches are non-overlapping and returned left-to-right;
/// duplicates of the same field key are kept so that apply order decides
/// the winner. The value token grammar excludes `,` and `;`, so trailing
/// list punctuation never ends up in a captured value.
pub fn extract_updates(description: &str) -> Vec<CommitUpdate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(UPDATE_PATTERN).expect("update pattern"));

    re.captures_iter(description)
        .filter_map(|caps| {
            let raw_field = caps.get(1)?.as_str();
            let raw_value = caps.get(2)?.as_str();
            let field = title_case(raw_field.trim().trim_start_matches('-').trim());
            if field.is_empty() {
                return None;
            }
            Some(CommitUpdate {
                field,
                value: raw_value.trim().to_string(),
            })
        })
        .collect()
}

fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                output.extend(ch.to_uppercase());
            } else {
                output.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            output.push(ch);
            at_word_start = true;
        }
    }
    output
}
