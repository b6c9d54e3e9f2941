// formguard/src/workers/client_identity.rs
//
// User-agent plausibility.
// Aho-Corasick over the automation markers: one pass per UA however long the list.
//
// Order matters: a missing UA and an outright automation marker are stronger
// signals than a UA that is merely short or engine-less, so they win.

use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::config::ClassifierConfig;
use crate::events::{CheckKind, SpamCheckResult, Submission};
use crate::workers::PASS_CONFIDENCE;

pub const MISSING_CONFIDENCE:    f32   = 0.8;
pub const AUTOMATION_CONFIDENCE: f32   = 0.9;
pub const IMPLAUSIBLE_CONFIDENCE: f32  = 0.6;
pub const MIN_UA_LEN:            usize = 20;

static MARKER_AC: OnceLock<(AhoCorasick, Vec<&'static str>)> = OnceLock::new();

// Pattern → label pairs
const AUTOMATION_MARKERS: &[(&str, &str)] = &[
    ("curl/", "curl"),
    ("wget", "wget"),
    ("python-requests", "python_requests"),
    ("python-urllib", "python_urllib"),
    ("python-httpx", "python_httpx"),
    ("aiohttp", "aiohttp"),
    ("go-http-client", "go_http"),
    ("java/", "java"),
    ("okhttp", "okhttp"),
    ("libwww-perl", "perl"),
    ("apache-httpclient", "java"),
    ("axios/", "node"),
    ("node-fetch", "node"),
    ("postmanruntime", "postman"),
    ("insomnia", "insomnia"),
    ("httpie", "httpie"),
    ("scrapy", "scrapy"),
    ("headlesschrome", "headless_browser"),
    ("phantomjs", "headless_browser"),
    ("selenium", "browser_automation"),
    ("puppeteer", "browser_automation"),
    ("playwright", "browser_automation"),
    ("crawler", "crawler"),
    ("spider", "crawler"),
    ("scraper", "crawler"),
    ("bot", "bot"),
];

// Tokens every mainstream browser engine puts in its UA.
const ENGINE_TOKENS: &[&str] = &[
    "mozilla/", "applewebkit", "gecko", "chrome/", "safari/", "firefox/", "edg/", "trident", "opera",
];

fn marker_automaton() -> &'static (AhoCorasick, Vec<&'static str>) {
    MARKER_AC.get_or_init(|| {
        let patterns: Vec<&str> = AUTOMATION_MARKERS.iter().map(|(p, _)| *p).collect();
        let labels: Vec<&str> = AUTOMATION_MARKERS.iter().map(|(_, l)| *l).collect();
        let ac = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostFirst)
            .build(&patterns)
            .expect("automation marker AC build failed");
        (ac, labels)
    })
}

pub fn analyze(sub: &Submission, _cfg: &ClassifierConfig) -> SpamCheckResult {
    let ua = sub.user_agent.trim();
    if ua.is_empty() {
        return SpamCheckResult::spam(CheckKind::ClientIdentity, "missing user agent", MISSING_CONFIDENCE);
    }

    let (ac, labels) = marker_automaton();
    if let Some(m) = ac.find(ua) {
        return SpamCheckResult::spam(
            CheckKind::ClientIdentity,
            format!("automation client: {}", labels[m.pattern().as_usize()]),
            AUTOMATION_CONFIDENCE,
        );
    }

    let lower = ua.to_ascii_lowercase();
    let has_engine = ENGINE_TOKENS.iter().any(|t| lower.contains(t));
    if ua.chars().count() < MIN_UA_LEN || !has_engine {
        return SpamCheckResult::spam(
            CheckKind::ClientIdentity,
            "implausible user agent",
            IMPLAUSIBLE_CONFIDENCE,
        );
    }

    SpamCheckResult::pass(CheckKind::ClientIdentity, "browser user agent", PASS_CONFIDENCE)
}
