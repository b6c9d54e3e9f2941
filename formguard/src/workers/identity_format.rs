// formguard/src/workers/identity_format.rs
//
// Email shape and plausibility. Email is the one identity field every lead
// needs, so a missing or malformed address fails closed.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::ClassifierConfig;
use crate::events::{CheckKind, SpamCheckResult, Submission};
use crate::workers::{longest_run, PASS_CONFIDENCE};

pub const MALFORMED_CONFIDENCE:   f32   = 0.95;
pub const SUSPICIOUS_CONFIDENCE:  f32   = 0.8;
pub const MIN_LOCAL_PART:         usize = 2;
pub const MAX_LOCAL_RUN:          usize = 3;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

// Matched as substrings of the domain, so regional variants are covered too.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator",
    "guerrillamail",
    "10minutemail",
    "tempmail",
    "temp-mail",
    "throwaway",
    "yopmail",
    "trashmail",
    "sharklasers",
    "getnada",
    "dispostable",
    "maildrop",
    "fakeinbox",
    "mailnesia",
    "spamgourmet",
];

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email regex"))
}

pub fn analyze(sub: &Submission, _cfg: &ClassifierConfig) -> SpamCheckResult {
    let email = sub.email.trim();
    if email.is_empty() {
        return SpamCheckResult::spam(CheckKind::IdentityFormat, "missing email", MALFORMED_CONFIDENCE);
    }
    if !email_re().is_match(email) {
        return SpamCheckResult::spam(CheckKind::IdentityFormat, "malformed email", MALFORMED_CONFIDENCE);
    }

    // Regex guarantees exactly one '@'.
    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    let domain = domain.to_ascii_lowercase();

    if let Some(d) = DISPOSABLE_DOMAINS.iter().find(|d| domain.contains(*d)) {
        return SpamCheckResult::spam(
            CheckKind::IdentityFormat,
            format!("disposable email domain: {d}"),
            SUSPICIOUS_CONFIDENCE,
        );
    }
    if longest_run(local) > MAX_LOCAL_RUN {
        return SpamCheckResult::spam(
            CheckKind::IdentityFormat,
            "repeated characters in email",
            SUSPICIOUS_CONFIDENCE,
        );
    }
    if local.chars().count() < MIN_LOCAL_PART {
        return SpamCheckResult::spam(
            CheckKind::IdentityFormat,
            "email local part too short",
            SUSPICIOUS_CONFIDENCE,
        );
    }

    SpamCheckResult::pass(CheckKind::IdentityFormat, "email looks valid", PASS_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(s: &str) -> SpamCheckResult {
        let sub = Submission { email: s.into(), ..Default::default() };
        analyze(&sub, &ClassifierConfig::default())
    }

    #[test]
    fn valid_addresses_pass() {
        for e in ["jane.doe@acme.com", "jo@example.co.uk", "ops+leads@sub.domain.io"] {
            assert!(!email(e).is_spam, "{e}");
        }
    }

    #[test]
    fn malformed_addresses() {
        for e in ["", "jane", "jane@", "@acme.com", "jane@acme", "ja ne@acme.com", "a@b@c.com", "x@y.z"] {
            let r = email(e);
            assert!(r.is_spam, "{e}");
            assert_eq!(r.confidence, MALFORMED_CONFIDENCE, "{e}");
        }
    }

    #[test]
    fn disposable_domain() {
        let r = email("lead@mailinator.com");
        assert!(r.is_spam);
        assert_eq!(r.confidence, SUSPICIOUS_CONFIDENCE);
        assert!(r.reason.contains("mailinator"));
        assert!(email("x1@YOPMAIL.fr").is_spam);
    }

    #[test]
    fn repeated_and_short_local_parts() {
        assert!(email("aaaaa@acme.com").is_spam);
        assert!(!email("aaa@acme.com").is_spam);
        assert!(email("j@acme.com").is_spam);
    }
}
