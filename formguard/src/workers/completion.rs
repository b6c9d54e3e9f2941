// formguard/src/workers/completion.rs
//
// How the identity fields were filled in: one-letter names, one-letter
// companies, keyboard walks. Empty fields are left to other checks.

use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::config::ClassifierConfig;
use crate::events::{CheckKind, SpamCheckResult, Submission};
use crate::workers::PASS_CONFIDENCE;

pub const SHORT_NAME_POINTS:    u32   = 30;
pub const SHORT_COMPANY_POINTS: u32   = 20;
pub const KEYBOARD_WALK_POINTS: u32   = 50;
pub const SPAM_THRESHOLD:       u32   = 40;   // strictly above
pub const MAX_POINTS:           u32   = 90;
pub const MIN_NAME_LEN:         usize = 2;
pub const MIN_COMPANY_LEN:      usize = 2;

static WALK_AC: OnceLock<AhoCorasick> = OnceLock::new();

const KEYBOARD_WALKS: &[&str] = &[
    "qwerty", "qwertz", "azerty", "asdf", "zxcv", "hjkl", "1234", "4321", "0987",
];

fn walk_automaton() -> &'static AhoCorasick {
    WALK_AC.get_or_init(|| {
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostFirst)
            .build(KEYBOARD_WALKS)
            .expect("keyboard walk AC build failed")
    })
}

pub fn analyze(sub: &Submission, _cfg: &ClassifierConfig) -> SpamCheckResult {
    let name    = sub.name.trim();
    let company = sub.company.trim();
    let mut points   = 0u32;
    let mut evidence = Vec::new();

    let name_len = name.chars().count();
    if name_len > 0 && name_len < MIN_NAME_LEN {
        points += SHORT_NAME_POINTS;
        evidence.push("short_name".to_string());
    }

    let company_len = company.chars().count();
    if company_len > 0 && company_len < MIN_COMPANY_LEN {
        points += SHORT_COMPANY_POINTS;
        evidence.push("short_company".to_string());
    }

    let ac = walk_automaton();
    if let Some(m) = [name, company].iter().find_map(|f| ac.find(*f)) {
        points += KEYBOARD_WALK_POINTS;
        evidence.push(format!("keyboard_walk:{}", KEYBOARD_WALKS[m.pattern().as_usize()]));
    }

    if points > SPAM_THRESHOLD {
        return SpamCheckResult::spam(
            CheckKind::CompletionPattern,
            format!("suspicious completion: {}", evidence.join(" | ")),
            points.min(MAX_POINTS) as f32 / 100.0,
        );
    }
    SpamCheckResult::pass(CheckKind::CompletionPattern, "completion pattern normal", PASS_CONFIDENCE)
}
