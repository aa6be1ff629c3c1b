//! Same-language detection and the alternate-target table

/// Target languages that switch to Chinese when the text is already in them;
/// every other listed language switches to English.
const SWITCH_TO_CHINESE: &[&str] = &["english"];

const SWITCH_TO_ENGLISH: &[&str] = &[
    "中文", "chinese",
    "日本語", "japanese",
    "한국어", "korean",
    "русский", "russian",
    "français", "french",
    "español", "spanish",
    "deutsch", "german",
    "português", "portuguese",
    "italiano", "italian",
    "العربية", "arabic",
    "ไทย", "thai",
    "tiếng việt", "vietnamese",
    "bahasa indonesia", "indonesian",
    "हिन्दी", "hindi",
    "tagalog", "filipino",
];

/// Loose equivalence: equal, or either contains the other, ignoring case
pub fn is_same_lang(detected: &str, target: &str) -> bool {
    let d = detected.trim().to_lowercase();
    let t = target.trim().to_lowercase();
    if d.is_empty() || t.is_empty() {
        return false;
    }
    d == t || d.contains(&t) || t.contains(&d)
}

/// Target to retry with when the provider echoed text already in `target`
pub fn alternate_target(target: &str) -> &'static str {
    let key = target.trim().to_lowercase();
    if SWITCH_TO_CHINESE.contains(&key.as_str()) {
        "中文"
    } else if SWITCH_TO_ENGLISH.contains(&key.as_str()) || target.contains('中') {
        "English"
    } else {
        "中文"
    }
}

/// The provider handed the input back unchanged
pub fn is_echo(input: &str, translation: &str) -> bool {
    input.trim() == translation.trim()
}
