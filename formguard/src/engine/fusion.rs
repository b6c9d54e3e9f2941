// formguard/src/engine/fusion.rs
//
// Spam verdict fusion.
//
// Verdict:    spam if any single check says spam.
// Confidence: plain mean over all six checks, passing ones included.
//
// The mean dilutes a lone strong hit (a filled honeypot alone lands around
// 0.3). Kept as-is for compatibility with existing consumers of the score;
// SpamVerdict::max_confidence() exposes the undiluted signal.

use tracing::debug;

use crate::config::ClassifierConfig;
use crate::events::{SpamCheckResult, SpamVerdict, Submission};
use crate::workers;

pub struct SpamClassifier {
    config: ClassifierConfig,
}

impl SpamClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ClassifierConfig { self.config }

    pub fn check(&self, sub: &Submission) -> SpamVerdict {
        let verdict = fuse(workers::run_all(sub, &self.config));
        if verdict.is_spam {
            let flagged: Vec<String> = verdict.flagged().map(|c| c.check.to_string()).collect();
            debug!(flagged = %flagged.join(","), confidence = verdict.confidence, "spam verdict");
        }
        verdict
    }
}

impl Default for SpamClassifier { fn default() -> Self { Self::new(ClassifierConfig::default()) } }

pub fn fuse(checks: Vec<SpamCheckResult>) -> SpamVerdict {
    let is_spam = checks.iter().any(|c| c.is_spam);
    let confidence = if checks.is_empty() {
        0.0
    } else {
        let mean = checks.iter().map(|c| c.confidence).sum::<f32>() / checks.len() as f32;
        (mean * 10000.0).round() / 10000.0
    };
    let reason = checks
        .iter()
        .find(|c| c.is_spam)
        .map(|c| c.reason.clone())
        .unwrap_or_default();

    SpamVerdict { is_spam, confidence, reason, checks }
}
