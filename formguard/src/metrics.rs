// formguard/src/metrics.rs
//
// Pipeline counters in Prometheus text exposition format.
//
//   formguard_submissions_total                  Counter  every processed submission
//   formguard_outcomes_total{outcome}            Counter  accepted / rate_limited / spam_suppressed
//   formguard_check_hits_total{check}            Counter  per-check spam verdicts
//   formguard_check_mean_confidence{check}       Gauge    mean confidence reported per check
//   formguard_leads_total{grade}                 Counter  accepted leads by grade
//   formguard_spam_confidence_bucket{le}         Counter  fused confidence, cumulative buckets
//   formguard_rate_limit_identifiers             Gauge    identifiers tracked by the limiter
//   formguard_store_errors_total                 Counter  checks denied on store failure
//
// Rendering only; exposing it over HTTP is the host application's business.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{CheckKind, Decision, Grade, Outcome, SpamVerdict};

#[derive(Default)]
pub struct PipelineMetrics {
    pub submissions:      AtomicU64,
    pub accepted:         AtomicU64,
    pub rate_limited:     AtomicU64,
    pub spam_suppressed:  AtomicU64,
    pub grade_a:          AtomicU64,
    pub grade_b:          AtomicU64,
    pub grade_c:          AtomicU64,
    pub grade_d:          AtomicU64,
    /// Per-check (spam hits, confidence sum, observations).
    checks:               Mutex<HashMap<CheckKind, (u64, f64, u64)>>,
    /// Fused confidence buckets [0.0, 0.1], (0.1, 0.2], ... (0.9, 1.0]
    confidence_buckets:   [AtomicU64; 10],
}

impl PipelineMetrics {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn record_decision(&self, decision: &Decision) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        match decision.outcome {
            Outcome::Accepted       => self.accepted.fetch_add(1, Ordering::Relaxed),
            Outcome::RateLimited    => self.rate_limited.fetch_add(1, Ordering::Relaxed),
            Outcome::SpamSuppressed => self.spam_suppressed.fetch_add(1, Ordering::Relaxed),
        };
        if let Some(score) = &decision.lead_score {
            self.grade_counter(score.grade).fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_verdict(&self, verdict: &SpamVerdict) {
        // Upper-inclusive so 0.1 lands under le="0.1"; the slack absorbs f32 error.
        let scaled = (verdict.confidence as f64 * 10.0 - 1e-4).ceil().max(1.0);
        let bucket = (scaled as usize - 1).min(9);
        self.confidence_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        let mut checks = self.checks.lock();
        for c in &verdict.checks {
            let entry = checks.entry(c.check).or_insert((0, 0.0, 0));
            if c.is_spam { entry.0 += 1; }
            entry.1 += c.confidence as f64;
            entry.2 += 1;
        }
    }

    pub fn check_hits(&self, check: CheckKind) -> u64 {
        self.checks.lock().get(&check).map(|e| e.0).unwrap_or(0)
    }

    pub fn grade_count(&self, grade: Grade) -> u64 {
        self.grade_counter(grade).load(Ordering::Relaxed)
    }

    fn grade_counter(&self, grade: Grade) -> &AtomicU64 {
        match grade {
            Grade::A => &self.grade_a,
            Grade::B => &self.grade_b,
            Grade::C => &self.grade_c,
            Grade::D => &self.grade_d,
        }
    }

    /// Render in Prometheus text exposition format. Limiter gauges are passed
    /// in because the limiter owns them.
    pub fn render_prometheus(&self, identifiers: usize, store_errors: u64) -> String {
        let mut out = String::with_capacity(4096);

        macro_rules! header {
            ($name:expr, $kind:expr, $help:expr) => {
                let _ = writeln!(out, "# HELP {} {}\n# TYPE {} {}", $name, $help, $name, $kind);
            };
        }

        header!("formguard_submissions_total", "counter", "Submissions processed");
        let _ = writeln!(out, "formguard_submissions_total {}", self.submissions.load(Ordering::Relaxed));

        header!("formguard_outcomes_total", "counter", "Admission decisions by outcome");
        for (label, counter) in [
            ("accepted",        &self.accepted),
            ("rate_limited",    &self.rate_limited),
            ("spam_suppressed", &self.spam_suppressed),
        ] {
            let _ = writeln!(out, "formguard_outcomes_total{{outcome=\"{label}\"}} {}", counter.load(Ordering::Relaxed));
        }

        {
            let checks = self.checks.lock();
            header!("formguard_check_hits_total", "counter", "Spam verdicts per check");
            for kind in CheckKind::ALL {
                let hits = checks.get(&kind).map(|e| e.0).unwrap_or(0);
                let _ = writeln!(out, "formguard_check_hits_total{{check=\"{kind}\"}} {hits}");
            }
            header!("formguard_check_mean_confidence", "gauge", "Mean confidence reported per check");
            for kind in CheckKind::ALL {
                let mean = match checks.get(&kind) {
                    Some(&(_, sum, n)) if n > 0 => sum / n as f64,
                    _ => 0.0,
                };
                let _ = writeln!(out, "formguard_check_mean_confidence{{check=\"{kind}\"}} {mean:.4}");
            }
        }

        header!("formguard_leads_total", "counter", "Accepted leads by grade");
        for grade in [Grade::A, Grade::B, Grade::C, Grade::D] {
            let _ = writeln!(out, "formguard_leads_total{{grade=\"{grade}\"}} {}", self.grade_count(grade));
        }

        header!("formguard_spam_confidence_bucket", "counter", "Fused spam confidence, cumulative 0.1-wide buckets");
        let mut cumulative = 0u64;
        for (i, bucket) in self.confidence_buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "formguard_spam_confidence_bucket{{le=\"{:.1}\"}} {cumulative}",
                (i + 1) as f64 * 0.1,
            );
        }
        let _ = writeln!(out, "formguard_spam_confidence_bucket{{le=\"+Inf\"}} {cumulative}");

        header!("formguard_rate_limit_identifiers", "gauge", "Identifiers tracked by the rate limiter");
        let _ = writeln!(out, "formguard_rate_limit_identifiers {identifiers}");

        header!("formguard_store_errors_total", "counter", "Rate-limit checks denied on store failure");
        let _ = writeln!(out, "formguard_store_errors_total {store_errors}");

        out
    }
}
