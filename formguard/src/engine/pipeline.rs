// formguard/src/engine/pipeline.rs
//
// Admission pipeline: sanitize → rate limit → cadence → classify → score.
//
// Rate-limited submissions get a 429 with a reset time. Spam gets a
// success-shaped response so the sender cannot tell it was caught. Only clean
// submissions are scored. Nothing in here can fail: every stage degrades to a
// decision.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::fusion::SpamClassifier;
use crate::engine::scoring;
use crate::events::{Decision, Outcome, RawSubmission};
use crate::metrics::PipelineMetrics;
use crate::sanitize::sanitize;
use crate::state::window::{bucket_key, now_ms, RateLimiter, PATTERN_WINDOW_MS};

pub const REASON_RATE_LIMIT: &str = "rate limit exceeded";

pub struct Pipeline {
    limiter:    Arc<RateLimiter>,
    classifier: SpamClassifier,
    metrics:    Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            Arc::new(RateLimiter::new(config.rate_limit)),
            SpamClassifier::new(config.classifier),
            PipelineMetrics::new(),
        )
    }

    pub fn with_parts(
        limiter:    Arc<RateLimiter>,
        classifier: SpamClassifier,
        metrics:    Arc<PipelineMetrics>,
    ) -> Self {
        Self { limiter, classifier, metrics }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> { &self.limiter }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> { &self.metrics }

    pub async fn process(&self, raw: RawSubmission) -> Decision {
        self.process_at(raw, now_ms()).await
    }

    /// Same as `process` with an explicit clock, in epoch ms.
    pub async fn process_at(&self, raw: RawSubmission, now: i64) -> Decision {
        let sub = sanitize(raw);
        let identifier = bucket_key(&sub.ip_address).to_string();
        let limits = self.limiter.config();

        let decision = 'decide: {
            let basic = self.limiter
                .check_basic_at(&identifier, limits.window_ms, limits.max_requests, now)
                .await;
            if !basic.allowed {
                break 'decide rate_limited(identifier, now, basic.reset_time, REASON_RATE_LIMIT.into());
            }

            let pattern = self.limiter.check_pattern_at(&identifier, now).await;
            if !pattern.allowed {
                let reason = pattern.reason.unwrap_or_else(|| REASON_RATE_LIMIT.into());
                break 'decide rate_limited(identifier, now, now + PATTERN_WINDOW_MS, reason);
            }

            let verdict = self.classifier.check(&sub);
            self.metrics.record_verdict(&verdict);
            if verdict.is_spam {
                break 'decide Decision {
                    allowed:               false,
                    is_spam:               true,
                    spam_reason:           verdict.reason,
                    confidence:            verdict.confidence,
                    lead_score:            None,
                    rate_limit_reset_time: None,
                    rate_limit_reason:     None,
                    outcome:               Outcome::SpamSuppressed,
                    identifier,
                    decided_at:            now,
                };
            }

            let lead = scoring::score(&sub);
            debug!(total = lead.total, grade = %lead.grade, reasons = ?lead.reasons, "lead scored");
            Decision {
                allowed:               true,
                is_spam:               false,
                spam_reason:           String::new(),
                confidence:            verdict.confidence,
                lead_score:            Some(lead),
                rate_limit_reset_time: None,
                rate_limit_reason:     None,
                outcome:               Outcome::Accepted,
                identifier,
                decided_at:            now,
            }
        };

        match decision.outcome {
            Outcome::Accepted => info!(
                identifier = %decision.identifier,
                score = decision.lead_score.as_ref().map(|s| s.total).unwrap_or(0),
                grade = %decision.lead_score.as_ref().map(|s| s.grade.to_string()).unwrap_or_default(),
                "ACCEPTED"
            ),
            Outcome::SpamSuppressed => info!(
                identifier = %decision.identifier,
                confidence = decision.confidence,
                reason = %decision.spam_reason,
                "SPAM_SUPPRESSED"
            ),
            Outcome::RateLimited => warn!(
                identifier = %decision.identifier,
                reason = decision.rate_limit_reason.as_deref().unwrap_or(""),
                retry_after_secs = decision.retry_after_secs().unwrap_or(0),
                "RATE_LIMITED"
            ),
        }
        self.metrics.record_decision(&decision);
        decision
    }
}

fn rate_limited(identifier: String, now: i64, reset_time: i64, reason: String) -> Decision {
    Decision {
        allowed:               false,
        is_spam:               false,
        spam_reason:           String::new(),
        confidence:            0.0,
        lead_score:            None,
        rate_limit_reset_time: Some(reset_time),
        rate_limit_reason:     Some(reason),
        outcome:               Outcome::RateLimited,
        identifier,
        decided_at:            now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::events::Grade;
    use crate::state::window::{REASON_CADENCE, SHARED_BUCKET};

    const T0: i64 = 1_700_000_000_000;
    const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_1) AppleWebKit/605.1.15 \
                          (KHTML, like Gecko) Version/17.1 Safari/605.1.15";

    fn raw(v: serde_json::Value) -> RawSubmission {
        serde_json::from_value(v).unwrap()
    }

    fn lead(ip: &str, submitted_at: i64) -> RawSubmission {
        raw(json!({
            "email": "jane.doe@acme.com",
            "name": "Jane Doe",
            "company": "Acme Inc",
            "role": "CMO",
            "companySize": "1000+",
            "phone": "+1 555 0100",
            "message": "We are planning a full content overhaul next quarter and would like \
                        to understand how your team approaches technical SEO audits.",
            "interests": ["seo", "content", "analytics"],
            "utmSource": "organic",
            "formStartTime": submitted_at - 45_000,
            "timestamp": submitted_at,
            "userAgent": SAFARI,
            "ipAddress": ip,
            "website": "",
            "consent": true
        }))
    }

    #[tokio::test]
    async fn clean_lead_is_accepted_and_scored() {
        let p = Pipeline::new(&Config::default());
        let d = p.process_at(lead("203.0.113.5", T0), T0).await;
        assert_eq!(d.outcome, Outcome::Accepted);
        assert!(d.allowed);
        assert_eq!(d.http_status(), 200);
        let score = d.lead_score.expect("scored");
        assert!(score.total >= 70);
        assert_eq!(score.grade, Grade::A);
    }

    #[tokio::test]
    async fn honeypot_is_suppressed_silently() {
        let p = Pipeline::new(&Config::default());
        let mut r = lead("203.0.113.6", T0);
        r.extra.insert("website".into(), json!("http://cheap-links.example"));
        let d = p.process_at(r, T0).await;
        assert_eq!(d.outcome, Outcome::SpamSuppressed);
        assert!(!d.allowed);
        assert!(d.is_spam);
        assert_eq!(d.http_status(), 200);
        assert!(d.lead_score.is_none());
        assert!(d.retry_after_secs().is_none());
    }

    #[tokio::test]
    async fn sixth_submission_is_rate_limited() {
        let p = Pipeline::new(&Config::default());
        // Irregular spacing so the cadence detector stays quiet.
        let offsets = [0, 4_000, 13_000, 15_500, 31_000, 40_000];
        let mut last = None;
        for off in offsets {
            last = Some(p.process_at(lead("198.51.100.1", T0 + off), T0 + off).await);
            if off < 40_000 {
                assert_eq!(last.as_ref().unwrap().outcome, Outcome::Accepted, "offset {off}");
            }
        }
        let d = last.unwrap();
        assert_eq!(d.outcome, Outcome::RateLimited);
        assert_eq!(d.http_status(), 429);
        assert_eq!(d.rate_limit_reset_time, Some(T0 + 60_000));
        assert_eq!(d.retry_after_secs(), Some(20));
        assert_eq!(d.confidence, 0.0);
    }

    #[tokio::test]
    async fn clockwork_cadence_is_rate_limited() {
        let p = Pipeline::new(&Config::default());
        let mut outcomes = Vec::new();
        for i in 0..6 {
            let now = T0 + i * 1_500;
            outcomes.push(p.process_at(lead("192.0.2.44", now), now).await);
        }
        let first_denied = outcomes.iter().position(|d| d.outcome == Outcome::RateLimited);
        assert_eq!(first_denied, Some(2));
        assert_eq!(outcomes[2].rate_limit_reason.as_deref(), Some(REASON_CADENCE));
        assert!(outcomes.iter().skip(2).all(|d| d.outcome == Outcome::RateLimited));
    }

    #[tokio::test]
    async fn spam_still_counts_against_the_limit() {
        let p = Pipeline::new(&Config::default());
        let offsets = [0, 7_000, 9_000, 20_000, 21_000];
        for off in offsets {
            let mut r = lead("203.0.113.99", T0 + off);
            r.extra.insert("_gotcha".into(), json!("x"));
            let d = p.process_at(r, T0 + off).await;
            assert_eq!(d.outcome, Outcome::SpamSuppressed);
        }
        let d = p.process_at(lead("203.0.113.99", T0 + 30_000), T0 + 30_000).await;
        assert_eq!(d.outcome, Outcome::RateLimited);
    }

    #[tokio::test]
    async fn missing_address_shares_a_bucket() {
        let p = Pipeline::new(&Config::default());
        let d = p.process_at(lead("", T0), T0).await;
        assert_eq!(d.identifier, SHARED_BUCKET);
        assert_eq!(p.limiter().n_identifiers(), 1);
    }

    #[tokio::test]
    async fn metrics_follow_decisions() {
        let p = Pipeline::new(&Config::default());
        p.process_at(lead("203.0.113.10", T0), T0).await;
        let mut spam = lead("203.0.113.11", T0);
        spam.extra.insert("fax".into(), json!("555"));
        p.process_at(spam, T0).await;

        let m = p.metrics();
        assert_eq!(m.submissions.load(std::sync::atomic::Ordering::Relaxed), 2);
        assert_eq!(m.grade_count(Grade::A), 1);
        assert_eq!(m.check_hits(crate::events::CheckKind::Honeypot), 1);
    }
}
