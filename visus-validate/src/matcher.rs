//! Whole-word, case- and punctuation-insensitive matching of a spoken
//! transcription against the expected word.

/// Lowercases, turns punctuation into word breaks and collapses whitespace.
pub fn normalize_transcription(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `target` appears as whole word(s) anywhere in `transcription`.
///
/// "cat" matches "I see a cat." but not "caterpillar"; extra words are fine.
pub fn contains_word(transcription: &str, target: &str) -> bool {
    let target = normalize_transcription(target);
    let wanted: Vec<&str> = target.split(' ').filter(|w| !w.is_empty()).collect();
    if wanted.is_empty() {
        return false;
    }
    let heard = normalize_transcription(transcription);
    let words: Vec<&str> = heard.split(' ').collect();
    words.windows(wanted.len()).any(|window| window == wanted.as_slice())
}
