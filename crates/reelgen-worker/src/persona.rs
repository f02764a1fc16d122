//! Persona anchoring for identity-preserving image prompts.
//!
//! Downstream lip-sync and avatar video need a visible face, so persona
//! prompts are anchored with the trigger token and scrubbed of
//! compositions that hide it.

/// Phrases that produce faceless or back-of-head compositions.
const FACELESS_PHRASES: &[&str] = &[
    "back of the head",
    "back of his head",
    "back of her head",
    "back of their head",
    "back to the camera",
    "back to camera",
    "seen from behind",
    "from behind",
    "rear view",
    "facing away",
    "turned away",
    "looking away",
    "over the shoulder",
    "face hidden",
    "hidden face",
    "faceless",
    "silhouetted",
    "silhouette",
];

/// Phrases that only hide the face when they close a clause;
/// "from behind the counter" is a location.
const CLAUSE_FINAL: &[&str] = &["seen from behind", "from behind"];

/// Appended when the description does not already ask for a visible face.
pub const FACE_VISIBLE: &str = "face clearly visible, looking toward the camera";

/// Anchor a visual description to a persona trigger token.
pub fn anchor_persona(visual: &str, trigger: &str) -> String {
    let trigger = trigger.trim();
    let mut description = strip_faceless(visual);

    // The trigger must be the whole first token: "ZETAS" is not "ZETA".
    let starts_with_trigger = description
        .get(..trigger.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(trigger))
        && !description[trigger.len()..]
            .chars()
            .next()
            .is_some_and(is_word_char);
    if !starts_with_trigger {
        description = if description.is_empty() {
            trigger.to_string()
        } else {
            format!("{}, {}", trigger, description)
        };
    }

    if !description.to_ascii_lowercase().contains("face clearly visible") {
        description = format!("{}, {}", description, FACE_VISIBLE);
    }
    description
}

/// Remove faceless phrasing, case-insensitively and on word boundaries.
pub fn strip_faceless(visual: &str) -> String {
    let mut text = visual.to_string();
    for phrase in FACELESS_PHRASES {
        let clause_final = CLAUSE_FINAL.contains(phrase);
        let mut from = 0;
        loop {
            // ASCII lowercasing keeps byte offsets aligned with `text`.
            let lower = text.to_ascii_lowercase();
            let Some(offset) = lower[from..].find(phrase) else {
                break;
            };
            let start = from + offset;
            let end = start + phrase.len();
            if is_standalone(&lower, start, end, clause_final) {
                text.replace_range(start..end, "");
                from = start;
            } else {
                from = end;
            }
        }
    }
    tidy(&text)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `lower[start..end]` is a whole phrase, and for clause-final
/// phrases, whether only punctuation or the end of text follows it.
fn is_standalone(lower: &str, start: usize, end: usize, clause_final: bool) -> bool {
    if lower[..start].chars().next_back().is_some_and(is_word_char) {
        return false;
    }
    let rest = &lower[end..];
    if rest.chars().next().is_some_and(is_word_char) {
        return false;
    }
    !clause_final
        || rest
            .trim_start()
            .chars()
            .next()
            .map_or(true, |c| matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | ')'))
}

/// Collapse whitespace and empty comma-separated fragments.
fn tidy(text: &str) -> String {
    text.split(',')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
