// formguard/src/workers/content.rs
//
// Content quality over company, subject and message.
//
// Each finding adds suspicion points (out of 100); a single weak finding never
// flags on its own, two together usually do. Integer points keep the threshold
// comparison exact.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::config::ClassifierConfig;
use crate::events::{CheckKind, SpamCheckResult, Submission};
use crate::workers::{longest_run, PASS_CONFIDENCE};

pub const REPEATED_CHAR_POINTS: u32   = 30;
pub const PLACEHOLDER_POINTS:   u32   = 30;
pub const SPAM_PHRASE_POINTS:   u32   = 40;
pub const SHOUTING_POINTS:      u32   = 20;
pub const SPAM_THRESHOLD:       u32   = 50;   // strictly above
pub const MAX_POINTS:           u32   = 90;

pub const REPEATED_CHAR_RUN:    usize = 5;
pub const SHOUTING_MIN_LEN:     usize = 20;
pub const SHOUTING_RATIO:       f32   = 0.7;

static PHRASE_AC: OnceLock<AhoCorasick> = OnceLock::new();

// Whole-word placeholder tokens.
const PLACEHOLDER_TOKENS: &[&str] = &[
    "test", "testing", "asdf", "dummy", "lorem", "ipsum", "placeholder", "sample",
    "fake", "foo", "foobar", "xxx", "blah",
];

const SPAM_PHRASES: &[&str] = &[
    "buy now",
    "click here",
    "free money",
    "make money",
    "earn money",
    "work from home",
    "limited time offer",
    "act now",
    "100% free",
    "risk-free",
    "viagra",
    "cialis",
    "casino",
    "crypto investment",
    "bitcoin investment",
    "forex signals",
    "seo services",
    "backlinks",
    "guest post",
    "rank your website",
    "first page of google",
];

fn phrase_automaton() -> &'static AhoCorasick {
    PHRASE_AC.get_or_init(|| {
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostFirst)
            .build(SPAM_PHRASES)
            .expect("spam phrase AC build failed")
    })
}

pub fn analyze(sub: &Submission, _cfg: &ClassifierConfig) -> SpamCheckResult {
    let fields = [sub.company.as_str(), sub.subject.as_str(), sub.message.as_str()];
    let mut points   = 0u32;
    let mut evidence = Vec::new();

    if fields.iter().any(|f| longest_run(f) >= REPEATED_CHAR_RUN) {
        points += REPEATED_CHAR_POINTS;
        evidence.push("repeated_characters".to_string());
    }

    let placeholders: BTreeSet<String> = fields
        .iter()
        .flat_map(|f| words(f))
        .filter(|w| PLACEHOLDER_TOKENS.contains(&w.as_str()))
        .collect();
    if !placeholders.is_empty() {
        points += PLACEHOLDER_POINTS;
        let joined: Vec<&str> = placeholders.iter().map(String::as_str).collect();
        evidence.push(format!("placeholder_text:{}", joined.join(",")));
    }

    let ac = phrase_automaton();
    if let Some(m) = fields.iter().find_map(|f| ac.find(*f)) {
        points += SPAM_PHRASE_POINTS;
        evidence.push(format!("spam_phrase:{}", SPAM_PHRASES[m.pattern().as_usize()]));
    }

    if [sub.subject.as_str(), sub.message.as_str()].iter().any(|t| is_shouting(t)) {
        points += SHOUTING_POINTS;
        evidence.push("excessive_caps".to_string());
    }

    if points > SPAM_THRESHOLD {
        let confidence = points.min(MAX_POINTS) as f32 / 100.0;
        return SpamCheckResult::spam(
            CheckKind::ContentQuality,
            format!("low quality content: {}", evidence.join(" | ")),
            confidence,
        );
    }

    let reason = if evidence.is_empty() {
        "content looks genuine".to_string()
    } else {
        format!("minor content signals: {}", evidence.join(" | "))
    };
    SpamCheckResult::pass(CheckKind::ContentQuality, reason, PASS_CONFIDENCE)
}

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn is_shouting(text: &str) -> bool {
    if text.chars().count() <= SHOUTING_MIN_LEN { return false; }
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() { return false; }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper as f32 / letters.len() as f32 > SHOUTING_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(company: &str, subject: &str, message: &str) -> SpamCheckResult {
        let sub = Submission {
            company: company.into(),
            subject: subject.into(),
            message: message.into(),
            ..Default::default()
        };
        analyze(&sub, &ClassifierConfig::default())
    }

    #[test]
    fn genuine_message_passes() {
        let r = content("Acme Inc", "Pricing", "We are evaluating vendors for our Q3 content program.");
        assert!(!r.is_spam);
        assert_eq!(r.confidence, PASS_CONFIDENCE);
    }

    #[test]
    fn single_weak_signal_does_not_flag() {
        assert!(!content("Test", "", "").is_spam);
        assert!(!content("", "", "Please click here to see our offer").is_spam);
    }

    #[test]
    fn placeholder_is_whole_word_only() {
        let r = content("Contest Winners LLC", "", "Testimonials attached");
        assert!(!r.reason.contains("placeholder"));
    }

    #[test]
    fn combined_signals_flag() {
        let r = content("test", "", "aaaaaaa");
        assert!(r.is_spam);
        assert!((r.confidence - 0.6).abs() < 1e-6);

        let r = content("", "BUY NOW BEFORE IT IS GONE", "");
        assert!(r.is_spam);
        assert!((r.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn confidence_capped() {
        let r = content("asdf", "CLICK HERE FOR FREE MONEY!!!!!", "zzzzzzz");
        assert!(r.is_spam);
        assert!((r.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn shouting_needs_length() {
        assert!(!is_shouting("URGENT"));
        assert!(is_shouting("THIS IS A VERY LOUD MESSAGE"));
        assert!(!is_shouting("This is a calm message, with an NDA"));
    }
}
