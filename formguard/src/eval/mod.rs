// formguard/src/eval/mod.rs
//
// Labelled-dataset evaluation of the spam classifier.
//
//   1. Loads a JSONL file of raw submissions, each carrying a "label"
//   2. Sanitizes and classifies every submission (no rate limiting: the
//      dataset is a corpus, not traffic)
//   3. Computes precision / recall / F1 / FPR for the fused verdict and for
//      every individual check
//   4. Keeps per-submission confidences for the ROC / AUC in report.rs
//
// Dataset line:
//   { ...RawSubmission fields..., "label": "spam" | "ham" }
//
// Run:
//   formguard --mode eval --path labelled.jsonl

pub mod report;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::fusion::SpamClassifier;
use crate::events::{CheckKind, RawSubmission};
use crate::sanitize::sanitize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Spam,
    Ham,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledSubmission {
    pub label: Label,
    #[serde(flatten)]
    pub submission: RawSubmission,
}

// ── Confusion counts ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub tp:  u64,
    pub fp:  u64,
    pub tn:  u64,
    pub fn_: u64,
}

impl Confusion {
    pub fn record(&mut self, predicted_spam: bool, actually_spam: bool) {
        match (predicted_spam, actually_spam) {
            (true,  true)  => self.tp  += 1,
            (true,  false) => self.fp  += 1,
            (false, true)  => self.fn_ += 1,
            (false, false) => self.tn  += 1,
        }
    }

    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 { 1.0 } else { self.tp as f64 / denom as f64 }
    }

    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 { 0.0 } else { self.tp as f64 / denom as f64 }
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    pub fn fpr(&self) -> f64 {
        let denom = self.fp + self.tn;
        if denom == 0 { 0.0 } else { self.fp as f64 / denom as f64 }
    }
}

// ── Result ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EvalResult {
    pub n_submissions: usize,
    pub n_spam:        usize,
    pub n_ham:         usize,
    pub n_skipped:     usize,
    pub global:        Confusion,
    pub per_check:     BTreeMap<CheckKind, Confusion>,
    /// (fused confidence, actually spam) per submission.
    pub scored:        Vec<(f32, bool)>,
}

impl EvalResult {
    /// Counts per 0.05-wide confidence bin: (bin lower bound, count).
    pub fn confidence_histogram(&self) -> Vec<(f32, usize)> {
        let mut bins = [0usize; 20];
        for (conf, _) in &self.scored {
            bins[((conf / 0.05) as usize).min(19)] += 1;
        }
        bins.iter().enumerate().map(|(i, &c)| (i as f32 * 0.05, c)).collect()
    }
}

// ── Evaluator ────────────────────────────────────────────────────────────────

pub struct Evaluator {
    classifier: SpamClassifier,
}

impl Evaluator {
    pub fn new(classifier: SpamClassifier) -> Self { Self { classifier } }

    pub async fn run_dataset(&self, path: &Path) -> Result<EvalResult> {
        let content = tokio::fs::read_to_string(path).await
            .with_context(|| format!("reading {}", path.display()))?;
        let mut rows = Vec::new();
        let mut skipped = 0;

        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            match serde_json::from_str::<LabelledSubmission>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    skipped += 1;
                    warn!(line = n + 1, error = %e, "eval dataset parse error");
                }
            }
        }

        info!(submissions = rows.len(), skipped, path = %path.display(), "dataset loaded");
        let mut result = self.evaluate(rows);
        result.n_skipped = skipped;
        Ok(result)
    }

    pub fn evaluate(&self, rows: Vec<LabelledSubmission>) -> EvalResult {
        let n_submissions = rows.len();
        let n_spam = rows.iter().filter(|r| r.label == Label::Spam).count();

        let mut global = Confusion::default();
        let mut per_check: BTreeMap<CheckKind, Confusion> = BTreeMap::new();
        let mut scored = Vec::with_capacity(n_submissions);

        for row in rows {
            let actually_spam = row.label == Label::Spam;
            let verdict = self.classifier.check(&sanitize(row.submission));

            for c in &verdict.checks {
                per_check.entry(c.check).or_default().record(c.is_spam, actually_spam);
            }
            global.record(verdict.is_spam, actually_spam);
            scored.push((verdict.confidence, actually_spam));
        }

        EvalResult {
            n_submissions,
            n_spam,
            n_ham: n_submissions - n_spam,
            n_skipped: 0,
            global,
            per_check,
            scored,
        }
    }
}
