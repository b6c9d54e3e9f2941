// formguard/src/eval/report.rs
//
// ROC / AUC and markdown / JSON output for the eval harness.

use super::EvalResult;

/// Area under the ROC curve of the fused confidence, by the rank-sum
/// (Mann-Whitney) formulation. Ties count half. 0.5 when either class is empty.
pub fn auc_roc(result: &EvalResult) -> f64 {
    let spam: Vec<f32> = result.scored.iter().filter(|s| s.1).map(|s| s.0).collect();
    let ham:  Vec<f32> = result.scored.iter().filter(|s| !s.1).map(|s| s.0).collect();
    if spam.is_empty() || ham.is_empty() { return 0.5; }

    let mut wins = 0.0;
    for s in &spam {
        for h in &ham {
            if s > h { wins += 1.0; } else if s == h { wins += 0.5; }
        }
    }
    wins / (spam.len() * ham.len()) as f64
}

/// ROC points (fpr, tpr) at every distinct confidence threshold, highest first.
pub fn roc_curve(result: &EvalResult) -> Vec<(f64, f64)> {
    let n_spam = result.scored.iter().filter(|s| s.1).count().max(1) as f64;
    let n_ham  = result.scored.iter().filter(|s| !s.1).count().max(1) as f64;

    let mut thresholds: Vec<f32> = result.scored.iter().map(|s| s.0).collect();
    thresholds.sort_by(|a, b| b.total_cmp(a));
    thresholds.dedup();

    let mut points = vec![(0.0, 0.0)];
    for t in thresholds {
        let tp = result.scored.iter().filter(|s| s.1 && s.0 >= t).count() as f64;
        let fp = result.scored.iter().filter(|s| !s.1 && s.0 >= t).count() as f64;
        points.push((fp / n_ham, tp / n_spam));
    }
    points
}

pub fn markdown(result: &EvalResult) -> String {
    let mut out = String::new();
    let g = &result.global;

    out.push_str("# FormGuard Classifier Evaluation\n\n");
    out.push_str(&format!(
        "**Submissions**: {}  **Spam**: {}  **Ham**: {}  **Skipped**: {}\n\n",
        result.n_submissions, result.n_spam, result.n_ham, result.n_skipped
    ));
    out.push_str("| Metric    | Value  |\n|-----------|--------|\n");
    out.push_str(&format!("| Precision | {:.4} |\n", g.precision()));
    out.push_str(&format!("| Recall    | {:.4} |\n", g.recall()));
    out.push_str(&format!("| F1        | {:.4} |\n", g.f1()));
    out.push_str(&format!("| FPR       | {:.4} |\n", g.fpr()));
    out.push_str(&format!("| AUC-ROC   | {:.4} |\n\n", auc_roc(result)));

    out.push_str("## Per-check performance\n\n");
    out.push_str("| Check | P | R | F1 | FPR |\n|-------|---|---|----|-----|\n");
    let mut checks: Vec<_> = result.per_check.iter().collect();
    checks.sort_by(|a, b| b.1.f1().total_cmp(&a.1.f1()));
    for (check, m) in checks {
        out.push_str(&format!(
            "| {:18} | {:.3} | {:.3} | {:.3} | {:.4} |\n",
            check.to_string(), m.precision(), m.recall(), m.f1(), m.fpr()
        ));
    }

    out.push_str("\n## Confidence distribution\n\n```\n");
    let total = result.n_submissions.max(1) as f64;
    for (lower, count) in result.confidence_histogram() {
        let bar = "#".repeat((count as f64 / total * 60.0) as usize);
        out.push_str(&format!("{:.2}-{:.2} | {:5} | {}\n", lower, lower + 0.05, count, bar));
    }
    out.push_str("```\n");
    out
}

pub fn to_json(result: &EvalResult) -> String {
    let per_check: serde_json::Map<String, serde_json::Value> = result.per_check.iter()
        .map(|(check, m)| (check.to_string(), serde_json::json!({
            "precision": m.precision(),
            "recall":    m.recall(),
            "f1":        m.f1(),
            "fpr":       m.fpr(),
            "confusion": m,
        })))
        .collect();

    serde_json::json!({
        "n_submissions": result.n_submissions,
        "n_spam":        result.n_spam,
        "n_ham":         result.n_ham,
        "n_skipped":     result.n_skipped,
        "precision":     result.global.precision(),
        "recall":        result.global.recall(),
        "f1":            result.global.f1(),
        "fpr":           result.global.fpr(),
        "auc_roc":       auc_roc(result),
        "per_check":     per_check,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Confusion;
    use std::collections::BTreeMap;

    fn result(scored: Vec<(f32, bool)>) -> EvalResult {
        let n_spam = scored.iter().filter(|s| s.1).count();
        EvalResult {
            n_submissions: scored.len(),
            n_spam,
            n_ham: scored.len() - n_spam,
            n_skipped: 0,
            global: Confusion::default(),
            per_check: BTreeMap::new(),
            scored,
        }
    }

    #[test]
    fn auc_perfect_and_inverted() {
        let perfect = result(vec![(0.9, true), (0.8, true), (0.1, false), (0.2, false)]);
        assert_eq!(auc_roc(&perfect), 1.0);
        let inverted = result(vec![(0.1, true), (0.9, false)]);
        assert_eq!(auc_roc(&inverted), 0.0);
        let tied = result(vec![(0.5, true), (0.5, false)]);
        assert_eq!(auc_roc(&tied), 0.5);
    }

    #[test]
    fn roc_ends_at_one_one() {
        let r = result(vec![(0.9, true), (0.3, false), (0.3, true)]);
        let curve = roc_curve(&r);
        assert_eq!(curve.first(), Some(&(0.0, 0.0)));
        assert_eq!(curve.last(), Some(&(1.0, 1.0)));
    }

    #[test]
    fn reports_render() {
        let r = result(vec![(0.9, true), (0.1, false)]);
        let md = markdown(&r);
        assert!(md.contains("AUC-ROC   | 1.0000"));
        let json: serde_json::Value = serde_json::from_str(&to_json(&r)).unwrap();
        assert_eq!(json["n_spam"], 1);
        assert_eq!(json["auc_roc"], 1.0);
    }
}
