// formguard/src/workers/timing.rs
//
// Form completion time. Needs both the client-reported render time and
// submit time; without them the check is inconclusive rather than suspicious.

use crate::config::ClassifierConfig;
use crate::events::{CheckKind, SpamCheckResult, Submission};
use crate::workers::PASS_CONFIDENCE;

pub const TOO_FAST_CONFIDENCE:    f32 = 0.9;
pub const TOO_SLOW_CONFIDENCE:    f32 = 0.7;
pub const MISSING_DATA_CONFIDENCE: f32 = 0.3;

pub fn analyze(sub: &Submission, cfg: &ClassifierConfig) -> SpamCheckResult {
    let Some(elapsed) = sub.completion_ms() else {
        return SpamCheckResult::pass(
            CheckKind::Timing,
            "timing data missing",
            MISSING_DATA_CONFIDENCE,
        );
    };

    // Negative elapsed means the client clock was tampered with; treat as too fast.
    if elapsed < cfg.min_completion_ms {
        return SpamCheckResult::spam(
            CheckKind::Timing,
            format!("form completed too quickly: {elapsed}ms"),
            TOO_FAST_CONFIDENCE,
        );
    }
    if elapsed > cfg.max_completion_ms {
        return SpamCheckResult::spam(
            CheckKind::Timing,
            format!("form session too old: {elapsed}ms"),
            TOO_SLOW_CONFIDENCE,
        );
    }
    SpamCheckResult::pass(CheckKind::Timing, format!("completed in {elapsed}ms"), PASS_CONFIDENCE)
}
