// formguard/src/events.rs
//
// Shared domain types flowing through FormGuard.
//
// RawSubmission is what the form handler hands us: loosely typed JSON where any
// field can be missing or of the wrong type. Everything downstream of the
// sanitizer works on the strongly typed Submission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field names that are rendered invisibly on the form. Humans never fill them.
pub const HONEYPOT_FIELDS: &[&str] = &["website", "url", "fax", "honeypot", "_gotcha"];

// ── Inbound payload ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubmission {
    pub email:           Value,
    pub name:            Value,
    pub company:         Value,
    pub role:            Value,
    pub company_size:    Value,
    pub phone:           Value,
    pub message:         Value,
    pub subject:         Value,
    pub interests:       Value,
    pub utm_source:      Value,
    pub timestamp:       Value,   // client submit time, epoch ms
    pub form_start_time: Value,   // client form render time, epoch ms
    #[serde(alias = "clientIdentity")]
    pub user_agent:      Value,
    #[serde(alias = "originatingAddress")]
    pub ip_address:      Value,
    pub referrer:        Value,
    pub consent:         Value,
    /// Every other top-level key, honeypot fields included.
    #[serde(flatten)]
    pub extra:           BTreeMap<String, Value>,
}

// ── Sanitized submission ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub email:           String,
    pub name:            String,
    pub company:         String,
    pub role:            String,
    pub company_size:    String,
    pub phone:           String,
    pub message:         String,
    pub subject:         String,
    pub interests:       Vec<String>,
    pub utm_source:      String,
    /// Always holds every name in HONEYPOT_FIELDS; legitimate traffic leaves them empty.
    pub honeypot:        BTreeMap<String, String>,
    pub timestamp:       Option<i64>,
    pub form_start_time: Option<i64>,
    pub user_agent:      String,
    pub ip_address:      String,
    pub referrer:        String,
    pub consent:         bool,
}

impl Submission {
    /// Names of honeypot fields that carry a value.
    pub fn filled_honeypots(&self) -> Vec<&str> {
        self.honeypot
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Time between form render and submit, if the client reported both.
    pub fn completion_ms(&self) -> Option<i64> {
        match (self.form_start_time, self.timestamp) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

impl From<Submission> for RawSubmission {
    fn from(s: Submission) -> Self {
        let extra = s.honeypot
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self {
            email:           Value::String(s.email),
            name:            Value::String(s.name),
            company:         Value::String(s.company),
            role:            Value::String(s.role),
            company_size:    Value::String(s.company_size),
            phone:           Value::String(s.phone),
            message:         Value::String(s.message),
            subject:         Value::String(s.subject),
            interests:       Value::Array(s.interests.into_iter().map(Value::String).collect()),
            utm_source:      Value::String(s.utm_source),
            timestamp:       s.timestamp.map(Value::from).unwrap_or(Value::Null),
            form_start_time: s.form_start_time.map(Value::from).unwrap_or(Value::Null),
            user_agent:      Value::String(s.user_agent),
            ip_address:      Value::String(s.ip_address),
            referrer:        Value::String(s.referrer),
            consent:         Value::Bool(s.consent),
            extra,
        }
    }
}

// ── Spam checks ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    Honeypot,          // hidden fields filled in
    Timing,            // form completion time
    ClientIdentity,    // user agent plausibility
    IdentityFormat,    // email shape / disposable domains
    ContentQuality,    // placeholder text, spam phrases, shouting
    CompletionPattern, // keyboard walks, one-letter names
}

impl CheckKind {
    pub const ALL: [CheckKind; 6] = [
        CheckKind::Honeypot,
        CheckKind::Timing,
        CheckKind::ClientIdentity,
        CheckKind::IdentityFormat,
        CheckKind::ContentQuality,
        CheckKind::CompletionPattern,
    ];
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Honeypot => write!(f, "honeypot"),
            Self::Timing => write!(f, "timing"),
            Self::ClientIdentity => write!(f, "client_identity"),
            Self::IdentityFormat => write!(f, "identity_format"),
            Self::ContentQuality => write!(f, "content_quality"),
            Self::CompletionPattern => write!(f, "completion_pattern"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamCheckResult {
    pub check:      CheckKind,
    pub is_spam:    bool,
    pub reason:     String,
    pub confidence: f32,
}

impl SpamCheckResult {
    pub fn spam(check: CheckKind, reason: impl Into<String>, confidence: f32) -> Self {
        Self { check, is_spam: true, reason: reason.into(), confidence: confidence.clamp(0.0, 1.0) }
    }

    pub fn pass(check: CheckKind, reason: impl Into<String>, confidence: f32) -> Self {
        Self { check, is_spam: false, reason: reason.into(), confidence: confidence.clamp(0.0, 1.0) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamVerdict {
    pub is_spam:    bool,
    /// Mean of every check's confidence, passing checks included.
    pub confidence: f32,
    /// Reason of the first check that flagged spam, empty otherwise.
    pub reason:     String,
    pub checks:     Vec<SpamCheckResult>,
}

impl SpamVerdict {
    /// Strongest single signal. Not used for the verdict; exposed for callers
    /// comparing against the averaged confidence.
    pub fn max_confidence(&self) -> f32 {
        self.checks
            .iter()
            .filter(|c| c.is_spam)
            .map(|c| c.confidence)
            .fold(0.0, f32::max)
    }

    pub fn flagged(&self) -> impl Iterator<Item = &SpamCheckResult> {
        self.checks.iter().filter(|c| c.is_spam)
    }
}

// ── Lead scoring ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade { A, B, C, D }

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
            Self::D => write!(f, "D"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub role_seniority: f32,
    pub company_signal: f32,
    pub engagement:     f32,
    pub source_quality: f32,
    pub completeness:   f32,
}

impl ScoreBreakdown {
    pub fn sum(&self) -> f32 {
        self.role_seniority + self.company_signal + self.engagement
            + self.source_quality + self.completeness
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScore {
    pub total:     u8,
    pub breakdown: ScoreBreakdown,
    pub grade:     Grade,
    pub reasons:   Vec<String>,
}

// ── Rate limiting ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed:    bool,
    /// Epoch ms at which the identifier's current window ends.
    pub reset_time: i64,
    pub remaining:  u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDecision {
    pub allowed: bool,
    pub reason:  Option<String>,
}

// ── Admission decision ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    RateLimited,
    /// Spam gets a success-shaped response so the sender learns nothing.
    SpamSuppressed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::SpamSuppressed => write!(f, "SPAM_SUPPRESSED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed:                bool,
    pub is_spam:                bool,
    pub spam_reason:            String,
    pub confidence:             f32,
    pub lead_score:             Option<LeadScore>,
    pub rate_limit_reset_time:  Option<i64>,
    pub rate_limit_reason:      Option<String>,
    pub outcome:                Outcome,
    pub identifier:             String,
    pub decided_at:             i64,
}

impl Decision {
    /// Status the form handler should answer with.
    pub fn http_status(&self) -> u16 {
        match self.outcome {
            Outcome::RateLimited => 429,
            Outcome::Accepted | Outcome::SpamSuppressed => 200,
        }
    }

    /// Seconds until the rate-limit window resets, rounded up. None unless rate limited.
    pub fn retry_after_secs(&self) -> Option<u64> {
        if self.outcome != Outcome::RateLimited { return None; }
        let reset = self.rate_limit_reset_time?;
        let ms = (reset - self.decided_at).max(0) as u64;
        Some(ms.div_ceil(1000))
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
