// Property tests over the pure stages: sanitizer, classifier, scorer.

use proptest::prelude::*;
use serde_json::{json, Value};

use formguard::engine::scoring::{grade_for, score};
use formguard::events::HONEYPOT_FIELDS;
use formguard::sanitize::sanitize;
use formguard::{RawSubmission, SpamClassifier};

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        ".{0,64}",
        "[a-zA-Z <>=:\"'/]{0,40}",
        Just("<script>javascript:alert(1)</script>".to_string()),
        Just("javajavascript:script:x onclick=y".to_string()),
        Just("  padded  ".to_string()),
    ]
}

fn arb_json_field() -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_text().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
        Just(json!(["a", 1, null])),
    ]
}

prop_compose! {
    fn arb_raw()(
        email in arb_json_field(),
        name in arb_json_field(),
        company in arb_json_field(),
        role in arb_json_field(),
        company_size in arb_json_field(),
        message in arb_json_field(),
        interests in prop_oneof![
            prop::collection::vec(arb_text(), 0..30).prop_map(Value::from),
            arb_text().prop_map(Value::from),
        ],
        utm_source in arb_json_field(),
        timestamp in arb_json_field(),
        form_start_time in arb_json_field(),
        user_agent in arb_json_field(),
        website in arb_json_field(),
    ) -> RawSubmission {
        let mut raw = RawSubmission {
            email, name, company, role, company_size, message, interests, utm_source,
            timestamp, form_start_time, user_agent,
            ..Default::default()
        };
        raw.extra.insert("website".into(), website);
        raw
    }
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(raw in arb_raw()) {
        let once = sanitize(raw);
        let twice = sanitize(RawSubmission::from(once.clone()));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sanitized_fields_carry_no_markup(raw in arb_raw()) {
        let s = sanitize(raw);
        for field in [&s.email, &s.name, &s.company, &s.role, &s.message, &s.user_agent] {
            prop_assert!(!field.contains('<') && !field.contains('>'));
            prop_assert!(!field.to_lowercase().contains("javascript:"));
        }
        prop_assert_eq!(s.honeypot.len(), HONEYPOT_FIELDS.len());
    }

    #[test]
    fn lead_score_stays_in_range(raw in arb_raw()) {
        let lead = score(&sanitize(raw));
        prop_assert!(lead.total <= 100);
        prop_assert_eq!(lead.grade, grade_for(lead.total));
    }

    #[test]
    fn filled_honeypot_is_always_spam(
        raw in arb_raw(),
        field in prop::sample::select(HONEYPOT_FIELDS.to_vec()),
        value in prop_oneof![
            ".{1,20}",
            Just("<>".to_string()),
            Just("javascript:".to_string()),
            Just("onx=".to_string()),
            " {1,4}",
        ],
    ) {
        let mut raw = raw;
        raw.extra.insert(field.to_string(), Value::from(value));
        let verdict = SpamClassifier::default().check(&sanitize(raw));
        prop_assert!(verdict.is_spam);
        prop_assert!((0.0..=1.0).contains(&verdict.confidence));
    }

    #[test]
    fn verdict_is_spam_iff_a_check_flags(raw in arb_raw()) {
        let verdict = SpamClassifier::default().check(&sanitize(raw));
        prop_assert_eq!(verdict.checks.len(), 6);
        prop_assert_eq!(verdict.is_spam, verdict.checks.iter().any(|c| c.is_spam));
        if verdict.is_spam {
            prop_assert!(verdict.confidence <= verdict.max_confidence() + 1e-4);
        }
    }
}
