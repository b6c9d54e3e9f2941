// formguard/src/sanitize.rs
//
// Input sanitizer. Pure, total, idempotent.
//
// Per string field: strip angle brackets, javascript:/data: schemes and inline
// event handlers (repeated until nothing changes, so "javajavascript:script:"
// cannot reassemble), truncate, trim.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::events::{RawSubmission, Submission, HONEYPOT_FIELDS};

pub const MAX_FREE_TEXT: usize = 1000;  // message, subject
pub const MAX_SHORT:     usize = 255;   // identity fields, honeypots
pub const MAX_LONG:      usize = 2048;  // user agent, referrer
pub const MAX_INTERESTS: usize = 20;

/// Stands in for a honeypot value that cleaning reduced to nothing, so the
/// field still reads as filled.
pub const HONEYPOT_STRIPPED: &str = "[stripped]";

static SCHEME_RE:  OnceLock<Regex> = OnceLock::new();
static HANDLER_RE: OnceLock<Regex> = OnceLock::new();

fn scheme_re() -> &'static Regex {
    SCHEME_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:javascript|data)\s*:").expect("scheme regex")
    })
}

fn handler_re() -> &'static Regex {
    HANDLER_RE.get_or_init(|| Regex::new(r"(?i)on\w+\s*=").expect("handler regex"))
}

pub fn sanitize(raw: RawSubmission) -> Submission {
    let honeypot = HONEYPOT_FIELDS
        .iter()
        .map(|&name| {
            let value = raw.extra.get(name).map(honeypot_value).unwrap_or_default();
            (name.to_string(), value)
        })
        .collect();

    Submission {
        email:           clean(&text(&raw.email), MAX_SHORT),
        name:            clean(&text(&raw.name), MAX_SHORT),
        company:         clean(&text(&raw.company), MAX_SHORT),
        role:            clean(&text(&raw.role), MAX_SHORT),
        company_size:    clean(&text(&raw.company_size), MAX_SHORT),
        phone:           clean(&text(&raw.phone), MAX_SHORT),
        message:         clean(&text(&raw.message), MAX_FREE_TEXT),
        subject:         clean(&text(&raw.subject), MAX_FREE_TEXT),
        interests:       interests(&raw.interests),
        utm_source:      clean(&text(&raw.utm_source), MAX_SHORT),
        honeypot,
        timestamp:       epoch_ms(&raw.timestamp),
        form_start_time: epoch_ms(&raw.form_start_time),
        user_agent:      clean(&text(&raw.user_agent), MAX_LONG),
        ip_address:      clean(&text(&raw.ip_address), MAX_SHORT),
        referrer:        clean(&text(&raw.referrer), MAX_LONG),
        consent:         matches!(raw.consent, Value::Bool(true)),
    }
}

/// Sanitize one string and bound it to `max` characters.
pub fn clean(input: &str, max: usize) -> String {
    let mut s = input.to_string();
    loop {
        let next = strip_once(&s);
        if next == s { break; }
        s = next;
    }
    let truncated: String = s.chars().take(max).collect();
    truncated.trim().to_string()
}

fn strip_once(s: &str) -> String {
    let no_brackets: String = s.chars().filter(|c| *c != '<' && *c != '>').collect();
    let no_schemes = scheme_re().replace_all(&no_brackets, "");
    handler_re().replace_all(&no_schemes, "").into_owned()
}

// ── Loose JSON coercion ──────────────────────────────────────────────────────

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// A bot ticking a hidden checkbox sends `true`, which must still count as filled.
fn honeypot_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Filled is decided on the raw value; "<>" or "   " clean to nothing but are
// still a bot touching the field.
fn honeypot_value(v: &Value) -> String {
    let raw = honeypot_text(v);
    let cleaned = clean(&raw, MAX_SHORT);
    if cleaned.is_empty() && !raw.is_empty() {
        HONEYPOT_STRIPPED.to_string()
    } else {
        cleaned
    }
}

fn epoch_ms(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn interests(v: &Value) -> Vec<String> {
    let items: Vec<String> = match v {
        Value::Array(arr) => arr.iter().map(text).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items
        .iter()
        .map(|i| clean(i, MAX_SHORT))
        .filter(|i| !i.is_empty())
        .take(MAX_INTERESTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawSubmission {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn strips_markup_and_script_vectors() {
        assert_eq!(clean("<script>alert(1)</script>", MAX_SHORT), "scriptalert(1)/script");
        assert_eq!(clean("JavaScript:alert(1)", MAX_SHORT), "alert(1)");
        assert_eq!(clean("data:text/html,hi", MAX_SHORT), "text/html,hi");
        assert_eq!(clean("img onerror=steal()", MAX_SHORT), "img steal()");
        assert_eq!(clean("  Jane Doe \n", MAX_SHORT), "Jane Doe");
    }

    #[test]
    fn nested_vectors_do_not_reassemble() {
        assert_eq!(clean("javajavascript:script:x", MAX_SHORT), "x");
        assert_eq!(clean("oonclick=nclick=y", MAX_SHORT), "y");
    }

    #[test]
    fn keeps_ordinary_words() {
        assert_eq!(clean("Contact me at 5pm", MAX_SHORT), "Contact me at 5pm");
        assert_eq!(clean("Question = answer", MAX_SHORT), "Question = answer");
    }

    #[test]
    fn truncates_by_characters() {
        let long = "é".repeat(1500);
        let out = clean(&long, MAX_FREE_TEXT);
        assert_eq!(out.chars().count(), MAX_FREE_TEXT);
    }

    #[test]
    fn missing_and_mistyped_fields_become_empty() {
        let s = sanitize(raw(json!({ "name": 42, "company": {"x": 1}, "consent": "true" })));
        assert_eq!(s.name, "42");
        assert_eq!(s.company, "");
        assert_eq!(s.email, "");
        assert!(!s.consent);
        assert_eq!(s.timestamp, None);
    }

    #[test]
    fn consent_only_true_for_boolean_true() {
        assert!(sanitize(raw(json!({ "consent": true }))).consent);
        assert!(!sanitize(raw(json!({ "consent": 1 }))).consent);
    }

    #[test]
    fn timestamps_accept_numbers_and_numeric_strings() {
        let s = sanitize(raw(json!({ "timestamp": "1700000000000", "formStartTime": 1699999990000.0 })));
        assert_eq!(s.timestamp, Some(1_700_000_000_000));
        assert_eq!(s.form_start_time, Some(1_699_999_990_000));
        assert_eq!(sanitize(raw(json!({ "timestamp": "soon" }))).timestamp, None);
    }

    #[test]
    fn honeypots_always_present() {
        let s = sanitize(raw(json!({ "fax": true })));
        assert_eq!(s.honeypot.len(), HONEYPOT_FIELDS.len());
        assert_eq!(s.honeypot["fax"], "true");
        assert_eq!(s.honeypot["website"], "");
        assert_eq!(s.filled_honeypots(), vec!["fax"]);
    }

    #[test]
    fn honeypot_emptied_by_cleaning_still_counts() {
        for junk in ["<>", "javascript:", "   ", "onx="] {
            let s = sanitize(raw(json!({ "website": junk })));
            assert_eq!(s.honeypot["website"], HONEYPOT_STRIPPED, "{junk:?}");
            assert_eq!(s.filled_honeypots(), vec!["website"]);
            let again = sanitize(RawSubmission::from(s.clone()));
            assert_eq!(again, s);
        }
        let blank = sanitize(raw(json!({ "website": "" })));
        assert!(blank.filled_honeypots().is_empty());
    }

    #[test]
    fn interests_from_array_or_csv() {
        let a = sanitize(raw(json!({ "interests": ["SEO", " ", "<b>PPC</b>"] })));
        assert_eq!(a.interests, vec!["SEO", "bPPC/b"]);
        let b = sanitize(raw(json!({ "interests": "seo, content ,," })));
        assert_eq!(b.interests, vec!["seo", "content"]);
    }

    #[test]
    fn idempotent_on_hostile_input() {
        let first = sanitize(raw(json!({
            "name": "  <img src=x onerror=alert(1)>  ",
            "message": format!("{} javascript:void(0)   ", "a".repeat(998)),
            "interests": "x,<y>,z",
            "website": " data:evil ",
        })));
        let second = sanitize(RawSubmission::from(first.clone()));
        assert_eq!(first, second);
    }
}
