//! Creative brief drafting.
//!
//! The text model is asked to classify the intent and emit a brief as
//! JSON. Prose answers get one stricter retry, then a heuristic brief is
//! built from the raw prompt so drafting never fails a run on its own.

use std::sync::Arc;

use reelgen_models::{CreativeBrief, FlowKind, GenerationIntent, VoiceCategory};
use reelgen_providers::{TextGenerator, TextRequest};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Appended to every heuristic visual description.
pub const DEFAULT_QUALIFIERS: &str = "cinematic lighting, shallow depth of field, natural motion";

const DIRECTOR_SYSTEM: &str = r#"You are the director of a short vertical video clip.
Decide whether the clip is dialogue-driven (a person speaks a line to camera)
or ambience-only (no speech, just visuals and environmental sound).

Return a single JSON object with this schema:
{
  "mode": "dialogue" | "ambience",
  "visual_description": "what the first frame shows, concrete and photographic",
  "spoken_line": "the exact line spoken, or null for ambience clips",
  "ambience_description": "environmental sound bed for the scene",
  "performance_notes": "movement, camera motion and delivery",
  "voice_category": "male" | "female" | "neutral" | "child" | "elderly" | "narrator",
  "language": "ISO 639-1 code of the spoken line",
  "emotion": "one word delivery emotion"
}

Only choose "dialogue" when the user asks for someone to speak."#;

const STRICT_SUFFIX: &str = "\n\nReturn ONLY the JSON object. No prose, no markdown, no code fences.";

/// Builds the [`CreativeBrief`] for an intent.
pub struct BriefDrafter {
    text: Option<Arc<dyn TextGenerator>>,
}

impl BriefDrafter {
    pub fn new(text: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { text }
    }

    /// Draft a brief. Only text provider transport errors are returned;
    /// unparseable output falls back to [`heuristic_brief`].
    pub async fn draft(&self, intent: &GenerationIntent) -> PipelineResult<CreativeBrief> {
        let Some(text) = &self.text else {
            metrics::record_brief_fallback("no_text_provider");
            return Ok(apply_intent(heuristic_brief(&intent.prompt), intent));
        };

        let prompt = user_prompt(intent);
        let attempts = [
            TextRequest::json(DIRECTOR_SYSTEM, prompt.clone()),
            TextRequest::json(format!("{}{}", DIRECTOR_SYSTEM, STRICT_SUFFIX), prompt).with_temperature(0.2),
        ];

        for (attempt, request) in attempts.iter().enumerate() {
            let raw = text.complete(request).await?;
            match parse_brief(&raw) {
                Ok(brief) => {
                    info!(attempt = attempt + 1, mode = %brief.mode.as_str(), "Drafted creative brief");
                    return Ok(apply_intent(brief, intent));
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Text model returned an unusable brief");
                }
            }
        }

        metrics::record_brief_fallback("unparseable");
        warn!("Falling back to heuristic brief");
        Ok(apply_intent(heuristic_brief(&intent.prompt), intent))
    }
}

fn user_prompt(intent: &GenerationIntent) -> String {
    let mut prompt = format!("User request: {}", intent.prompt.trim());
    if let Some(line) = intent.dialogue() {
        prompt.push_str(&format!("\nThe person must say exactly: \"{}\"", line));
    }
    prompt
}

/// Parse model output as a brief, tolerating code fences and leading prose.
pub fn parse_brief(raw: &str) -> PipelineResult<CreativeBrief> {
    let text = strip_fences(raw);
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => return Err(PipelineError::brief_parse("no JSON object in response")),
    };

    let brief: CreativeBrief =
        serde_json::from_str(json).map_err(|e| PipelineError::brief_parse(e.to_string()))?;
    if !brief.is_usable() {
        return Err(PipelineError::brief_parse("brief has no visual description"));
    }
    Ok(CreativeBrief {
        synthetic: false,
        ..brief
    })
}

fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Override the drafted line with the caller's dialogue, if any.
fn apply_intent(mut brief: CreativeBrief, intent: &GenerationIntent) -> CreativeBrief {
    if let Some(line) = intent.dialogue() {
        brief.spoken_line = Some(line.to_string());
        brief.mode = FlowKind::Dialogue;
        if brief.language.is_none() {
            brief.language = Some(detect_language(line).to_string());
        }
    }
    brief
}

/// Pick the synthesis path.
///
/// Dialogue needs a non-empty spoken line. A caller-supplied line always
/// counts as a request for speech; a drafted line only counts when the
/// brief itself classified the clip as dialogue.
pub fn choose_flow(intent: &GenerationIntent, brief: &CreativeBrief) -> FlowKind {
    if brief.spoken_line().is_none() {
        return FlowKind::Ambience;
    }
    if intent.dialogue().is_some() || brief.mode == FlowKind::Dialogue {
        FlowKind::Dialogue
    } else {
        FlowKind::Ambience
    }
}

/// Brief built from the raw prompt without a text model.
pub fn heuristic_brief(prompt: &str) -> CreativeBrief {
    let prompt = prompt.trim();
    let spoken_line = extract_spoken_line(prompt);
    let language = detect_language(spoken_line.as_deref().unwrap_or(prompt));
    let mode = if spoken_line.is_some() {
        FlowKind::Dialogue
    } else {
        FlowKind::Ambience
    };

    let subject = prompt.trim_end_matches(['.', '!', '?', ',']);
    let performance_notes = match mode {
        FlowKind::Dialogue => "speaks directly to camera with natural expressions and subtle gestures",
        FlowKind::Ambience => "slow cinematic camera movement",
    };

    debug!(mode = %mode.as_str(), language = %language, "Built heuristic brief");
    CreativeBrief {
        mode,
        visual_description: format!("{}, {}", subject, DEFAULT_QUALIFIERS),
        spoken_line,
        ambience_description: ambience_for(prompt),
        performance_notes: performance_notes.to_string(),
        voice_category: VoiceCategory::Neutral,
        language: Some(language.to_string()),
        emotion: None,
        synthetic: true,
    }
}

/// First quoted phrase, or the text after a `say:`/`says` marker.
pub fn extract_spoken_line(prompt: &str) -> Option<String> {
    const QUOTES: [(char, char); 4] = [('"', '"'), ('\u{201c}', '\u{201d}'), ('\u{ab}', '\u{bb}'), ('\u{300c}', '\u{300d}')];

    for (open, close) in QUOTES {
        if let Some(start) = prompt.find(open) {
            let rest = &prompt[start + open.len_utf8()..];
            if let Some(end) = rest.find(close) {
                let line = rest[..end].trim();
                if !line.is_empty() {
                    return Some(line.to_string());
                }
            }
        }
    }

    // ASCII lowering keeps byte offsets aligned with `prompt`.
    let lower = prompt.to_ascii_lowercase();
    for marker in ["say:", "says:", "saying:", "says ", "saying "] {
        // Markers must start a word: "essays " is not "says ".
        let found = lower.match_indices(marker).map(|(pos, _)| pos).find(|&pos| {
            lower[..pos]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
        });
        if let Some(pos) = found {
            let line = prompt[pos + marker.len()..]
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches(|c: char| c == '\'' || c == '"');
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
    }
    None
}

/// ISO 639-1 guess from script ranges and common stop words.
pub fn detect_language(text: &str) -> &'static str {
    let mut kana = 0;
    let mut han = 0;
    let mut cyrillic = 0;
    let mut arabic = 0;
    let mut devanagari = 0;
    for c in text.chars() {
        match c as u32 {
            0x3040..=0x30FF => kana += 1,
            0x4E00..=0x9FFF => han += 1,
            0x0400..=0x04FF => cyrillic += 1,
            0x0600..=0x06FF => arabic += 1,
            0x0900..=0x097F => devanagari += 1,
            _ => {}
        }
    }
    if kana > 0 {
        return "ja";
    }
    let scripts = [(han, "zh"), (cyrillic, "ru"), (arabic, "ar"), (devanagari, "hi")];
    if let Some((_, lang)) = scripts.iter().filter(|(n, _)| *n > 0).max_by_key(|(n, _)| *n) {
        return *lang;
    }

    const STOP_WORDS: [(&str, &[&str]); 5] = [
        ("en", &["the", "and", "with", "of", "is", "on", "in", "a"]),
        ("es", &["el", "la", "los", "las", "y", "con", "una", "en", "que", "del"]),
        ("fr", &["le", "les", "et", "avec", "une", "des", "est", "du", "sur"]),
        ("de", &["der", "die", "das", "und", "mit", "ein", "eine", "ist", "auf"]),
        ("pt", &["o", "os", "e", "com", "uma", "um", "do", "da", "não"]),
    ];

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut best = ("en", 0);
    for (lang, stops) in STOP_WORDS {
        let hits = words.iter().filter(|w| stops.contains(&w.as_str())).count();
        if hits > best.1 {
            best = (lang, hits);
        }
    }
    best.0
}

const AMBIENCE_KEYWORDS: &[(&[&str], &str)] = &[
    (&["beach", "ocean", "sea", "shore", "waves", "surf"], "gentle ocean waves, distant seagulls, soft sea breeze"),
    (&["city", "street", "traffic", "downtown", "urban"], "city traffic, distant horns, footsteps on pavement"),
    (&["forest", "woods", "jungle", "trees"], "rustling leaves, birdsong, light breeze"),
    (&["rain", "storm", "thunder"], "steady rain, distant rolling thunder"),
    (&["cafe", "coffee", "espresso", "restaurant", "bar"], "cafe chatter, clinking cups, espresso machine hiss"),
    (&["night", "midnight", "stars"], "crickets, quiet night air"),
    (&["crowd", "stadium", "concert", "party", "festival"], "crowd murmur, cheering, distant music"),
    (&["office", "desk", "meeting"], "keyboard typing, quiet office hum"),
    (&["kitchen", "cooking", "chef"], "sizzling pan, kitchen clatter"),
    (&["mountain", "snow", "winter"], "howling wind, crunching snow"),
];

pub const DEFAULT_AMBIENCE: &str = "subtle room tone, soft natural ambience";

/// Sound bed for the scene keywords in `prompt`, at most two scenes.
pub fn ambience_for(prompt: &str) -> String {
    let words: Vec<String> = prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let matches: Vec<&str> = AMBIENCE_KEYWORDS
        .iter()
        .filter(|(keys, _)| keys.iter().any(|k| words.iter().any(|w| w == k)))
        .map(|(_, description)| *description)
        .take(2)
        .collect();

    if matches.is_empty() {
        DEFAULT_AMBIENCE.to_string()
    } else {
        matches.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelgen_providers::{ProviderError, ProviderResult};
    use std::sync::Mutex;

    struct ScriptedText {
        replies: Mutex<Vec<String>>,
        calls: Mutex<Vec<TextRequest>>,
    }

    impl ScriptedText {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedText {
        async fn complete(&self, request: &TextRequest) -> ProviderResult<String> {
            self.calls.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::invalid_response("gemini", "no more replies"))
        }
    }

    const GOOD: &str = r#"{"mode":"ambience","visual_description":"a beach at sunset","ambience_description":"waves","performance_notes":"slow pan"}"#;

    #[test]
    fn test_parse_brief_strips_fences() {
        let raw = format!("```json\n{}\n```", GOOD);
        let brief = parse_brief(&raw).unwrap();
        assert_eq!(brief.visual_description, "a beach at sunset");
        assert!(!brief.synthetic);
    }

    #[test]
    fn test_parse_brief_rejects_prose() {
        let err = parse_brief("Sure! Here is a lovely beach scene for you.").unwrap_err();
        assert!(matches!(err, PipelineError::BriefParse(_)));

        let err = parse_brief(r#"{"visual_description": "  "}"#).unwrap_err();
        assert!(matches!(err, PipelineError::BriefParse(_)));
    }

    #[tokio::test]
    async fn test_draft_uses_model_brief() {
        let text = ScriptedText::new(&[GOOD]);
        let drafter = BriefDrafter::new(Some(text.clone()));
        let brief = drafter
            .draft(&GenerationIntent::new("walking on the beach at sunset"))
            .await
            .unwrap();
        assert_eq!(brief.mode, FlowKind::Ambience);
        assert_eq!(text.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_draft_retries_strictly_once() {
        let text = ScriptedText::new(&["Here you go: a beach.", GOOD]);
        let drafter = BriefDrafter::new(Some(text.clone()));
        let brief = drafter
            .draft(&GenerationIntent::new("beach"))
            .await
            .unwrap();
        assert!(!brief.synthetic);

        let calls = text.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].system.contains("Return ONLY the JSON object"));
    }

    #[tokio::test]
    async fn test_draft_falls_back_on_prose() {
        let text = ScriptedText::new(&["A lovely beach.", "Still prose, sorry."]);
        let drafter = BriefDrafter::new(Some(text));
        let brief = drafter
            .draft(&GenerationIntent::new("walking on the beach at sunset"))
            .await
            .unwrap();
        assert!(brief.synthetic);
        assert_eq!(brief.mode, FlowKind::Ambience);
        assert!(brief.visual_description.ends_with(DEFAULT_QUALIFIERS));
        assert!(brief.ambience_description.contains("ocean waves"));
    }

    #[tokio::test]
    async fn test_draft_without_text_provider() {
        let drafter = BriefDrafter::new(None);
        let intent = GenerationIntent::new("a barista in a cafe").with_dialogue("Try our new espresso blend!");
        let brief = drafter.draft(&intent).await.unwrap();
        assert_eq!(brief.spoken_line(), Some("Try our new espresso blend!"));
        assert_eq!(brief.mode, FlowKind::Dialogue);
        assert_eq!(choose_flow(&intent, &brief), FlowKind::Dialogue);
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let text = ScriptedText::new(&[]);
        let drafter = BriefDrafter::new(Some(text));
        let err = drafter.draft(&GenerationIntent::new("beach")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ProviderRequest { .. }));
    }

    #[test]
    fn test_choose_flow() {
        let intent = GenerationIntent::new("beach");
        let mut brief = heuristic_brief("beach");
        assert_eq!(choose_flow(&intent, &brief), FlowKind::Ambience);

        // Drafted line on a brief classified as ambience is not spoken.
        brief.spoken_line = Some("hello".into());
        assert_eq!(choose_flow(&intent, &brief), FlowKind::Ambience);

        brief.mode = FlowKind::Dialogue;
        assert_eq!(choose_flow(&intent, &brief), FlowKind::Dialogue);

        brief.spoken_line = Some("   ".into());
        assert_eq!(choose_flow(&intent, &brief), FlowKind::Ambience);
    }

    #[test]
    fn test_extract_spoken_line() {
        assert_eq!(
            extract_spoken_line(r#"a chef who says "dinner is served" with a smile"#).as_deref(),
            Some("dinner is served")
        );
        assert_eq!(
            extract_spoken_line("a woman on a bench, say: welcome to Lisbon").as_deref(),
            Some("welcome to Lisbon")
        );
        assert_eq!(
            extract_spoken_line("\u{201c}Hola amigos\u{201d} en la playa").as_deref(),
            Some("Hola amigos")
        );
        assert_eq!(extract_spoken_line("walking on the beach at sunset"), None);
    }

    #[test]
    fn test_spoken_line_marker_needs_word_start() {
        assert_eq!(extract_spoken_line("a student who essays boldly on stage"), None);
        assert_eq!(extract_spoken_line("a tutor grading essays: all of them"), None);
        assert_eq!(
            extract_spoken_line("a critic reading essays, then says welcome back").as_deref(),
            Some("welcome back")
        );
        assert_eq!(
            extract_spoken_line("Says: good morning").as_deref(),
            Some("good morning")
        );
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("walking on the beach at sunset"), "en");
        assert_eq!(detect_language("una mujer en la playa con el perro"), "es");
        assert_eq!(detect_language("une femme sur la plage avec les enfants"), "fr");
        assert_eq!(detect_language("eine Frau mit dem Hund und der Katze"), "de");
        assert_eq!(detect_language("Привет, как дела"), "ru");
        assert_eq!(detect_language("こんにちは世界"), "ja");
        assert_eq!(detect_language("你好世界"), "zh");
        assert_eq!(detect_language("مرحبا بالعالم"), "ar");
        assert_eq!(detect_language("नमस्ते दुनिया"), "hi");
    }

    #[test]
    fn test_ambience_keywords() {
        assert_eq!(ambience_for("rainy night in the city"), "city traffic, distant horns, footsteps on pavement, crickets, quiet night air");
        assert_eq!(ambience_for("a portrait"), DEFAULT_AMBIENCE);
    }
}
