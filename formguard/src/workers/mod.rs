pub mod client_identity;
pub mod completion;
pub mod content;
pub mod honeypot;
pub mod identity_format;
pub mod timing;

use crate::config::ClassifierConfig;
use crate::events::{SpamCheckResult, Submission};

/// Confidence reported by a check that found nothing.
pub const PASS_CONFIDENCE: f32 = 0.1;

/// Run every spam check against one submission. Each check is independent and
/// total: missing data yields a low-confidence pass, never an error.
pub fn run_all(sub: &Submission, cfg: &ClassifierConfig) -> Vec<SpamCheckResult> {
    vec![
        honeypot::analyze(sub, cfg),
        timing::analyze(sub, cfg),
        client_identity::analyze(sub, cfg),
        identity_format::analyze(sub, cfg),
        content::analyze(sub, cfg),
        completion::analyze(sub, cfg),
    ]
}

/// Longest run of one repeated character.
pub(crate) fn longest_run(s: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if Some(c) == prev { run += 1; } else { run = 1; prev = Some(c); }
        best = best.max(run);
    }
    best
}
