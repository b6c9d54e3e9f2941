// formguard/src/workers/honeypot.rs
//
// Honeypot check. Hidden fields are invisible to people and irresistible to
// form-filling bots; any value at all is conclusive.

use crate::config::ClassifierConfig;
use crate::events::{CheckKind, SpamCheckResult, Submission};
use crate::workers::PASS_CONFIDENCE;

pub const HONEYPOT_CONFIDENCE: f32 = 0.95;

pub fn analyze(sub: &Submission, _cfg: &ClassifierConfig) -> SpamCheckResult {
    let filled = sub.filled_honeypots();
    if filled.is_empty() {
        return SpamCheckResult::pass(CheckKind::Honeypot, "honeypot fields empty", PASS_CONFIDENCE);
    }
    SpamCheckResult::spam(
        CheckKind::Honeypot,
        format!("honeypot field filled: {}", filled.join(",")),
        HONEYPOT_CONFIDENCE,
    )
}
