//! Sentence splitting and script-direction detection.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Rendering direction for one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// One practice sentence with its detected direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sentence {
    pub text: String,
    pub direction: Direction,
}

impl Sentence {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Terminators cover Latin and Arabic punctuation; the trailing class keeps
    // the terminator(s) attached to the sentence they end.
    PATTERN.get_or_init(|| Regex::new(r"[^.!؟?;]+[.!؟?;]*").unwrap_or_else(|e| panic!("{e}")))
}

/// Split a block of text into trimmed, non-empty sentences.
///
/// Text with no terminator at all comes back as a single sentence.
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences: Vec<Sentence> = sentence_pattern()
        .find_iter(text)
        .filter_map(|m| {
            let trimmed = m.as_str().trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(Sentence {
                text: trimmed.to_string(),
                direction: detect_direction(trimmed),
            })
        })
        .collect();

    if sentences.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            sentences.push(Sentence {
                text: trimmed.to_string(),
                direction: detect_direction(trimmed),
            });
        }
    }
    sentences
}

/// Arabic-block character ratio above 0.3 of non-whitespace marks a sentence
/// as right-to-left.
pub fn detect_direction(text: &str) -> Direction {
    let mut total = 0usize;
    let mut arabic = 0usize;
    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        total += 1;
        if ('\u{0600}'..='\u{06FF}').contains(&ch) {
            arabic += 1;
        }
    }
    if total > 0 && arabic as f32 / total as f32 > 0.3 {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}

/// Total word count across sentences, for progress reporting.
pub fn total_words(sentences: &[Sentence]) -> usize {
    sentences.iter().map(Sentence::word_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_latin_terminators() {
        let sentences = split_sentences("First one. Second one! Third one?");
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["First one.", "Second one!", "Third one?"]);
    }

    #[test]
    fn keeps_terminator_runs_attached() {
        let sentences = split_sentences("Wait... what?! Really.");
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["Wait...", "what?!", "Really."]);
    }

    #[test]
    fn unterminated_text_is_one_sentence() {
        let sentences = split_sentences("no punctuation here");
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "no punctuation here");
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(split_sentences("   \n\t ").is_empty());
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn splits_on_arabic_question_mark() {
        let sentences = split_sentences("كيف حالك؟ أنا بخير.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "كيف حالك؟");
        assert_eq!(sentences[0].direction, Direction::Rtl);
    }

    #[test]
    fn latin_text_is_ltr() {
        assert_eq!(detect_direction("plain English text."), Direction::Ltr);
    }

    #[test]
    fn mostly_arabic_text_is_rtl() {
        assert_eq!(detect_direction("مرحبا بالعالم"), Direction::Rtl);
    }

    #[test]
    fn sparse_arabic_stays_ltr() {
        // One Arabic word inside a long Latin sentence stays under the ratio.
        assert_eq!(
            detect_direction("the word سلام appears once in this long sentence"),
            Direction::Ltr
        );
    }

    #[test]
    fn counts_words_across_sentences() {
        let sentences = split_sentences("One two. Three four five.");
        assert_eq!(total_words(&sentences), 5);
        assert_eq!(sentences[0].word_count(), 2);
    }
}
