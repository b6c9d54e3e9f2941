// formguard/src/engine/scoring.rs
//
// Lead quality score: independent, capped, additive dimensions.
//
//   Role seniority   0–30  lookup on the declared role
//   Company signal   0–25  15 for naming a company + 2..10 by size bracket
//   Engagement       0–20  10 for a real message + 2 per interest (max 10)
//   Source quality   0–15  lookup on the acquisition channel
//   Completeness     0–10  share of the five core identity fields
//
// Maximum 100. Pure and deterministic; unknown values score zero rather than erroring.

use crate::events::{Grade, LeadScore, ScoreBreakdown, Submission};

pub const GRADE_A: u8 = 70;
pub const GRADE_B: u8 = 50;
pub const GRADE_C: u8 = 30;

pub const COMPANY_BASE_POINTS:    f32   = 15.0;
pub const MESSAGE_POINTS:         f32   = 10.0;
pub const MESSAGE_MIN_LEN:        usize = 50;
pub const POINTS_PER_INTEREST:    f32   = 2.0;
pub const MAX_INTEREST_POINTS:    f32   = 10.0;
pub const UNKNOWN_SOURCE_POINTS:  f32   = 5.0;
pub const COMPLETENESS_POINTS:    f32   = 10.0;
/// Dimensions below this contribute no reason string.
pub const MATERIALITY:            f32   = 5.0;

// Keys are normalised: lowercase, punctuation collapsed to single spaces.
const ROLE_POINTS: &[(&str, f32)] = &[
    ("cmo",                      30.0),
    ("chief marketing officer",  30.0),
    ("ceo",                      28.0),
    ("founder",                  28.0),
    ("co founder",               28.0),
    ("founder ceo",              28.0),
    ("owner",                    26.0),
    ("president",                26.0),
    ("vp marketing",             25.0),
    ("vp of marketing",          25.0),
    ("head of marketing",        25.0),
    ("marketing director",       22.0),
    ("director of marketing",    22.0),
    ("head of growth",           22.0),
    ("director",                 20.0),
    ("growth lead",              18.0),
    ("marketing manager",        18.0),
    ("content manager",          15.0),
    ("seo manager",              15.0),
    ("manager",                  12.0),
    ("marketing specialist",     10.0),
    ("seo specialist",           10.0),
    ("consultant",                8.0),
    ("marketing coordinator",     8.0),
    ("content writer",            8.0),
    ("freelancer",                6.0),
    ("student",                   2.0),
];

const SIZE_POINTS: &[(&str, f32)] = &[
    ("1-10",      2.0),
    ("11-50",     4.0),
    ("51-200",    6.0),
    ("201-1000",  8.0),
    ("1000+",    10.0),
];

const SOURCE_POINTS: &[(&str, f32)] = &[
    ("organic",    15.0),
    ("direct",     15.0),
    ("referral",   12.0),
    ("partner",    12.0),
    ("email",      10.0),
    ("newsletter", 10.0),
    ("linkedin",   10.0),
    ("google_ads", 10.0),
    ("cpc",        10.0),
    ("facebook",    5.0),
    ("instagram",   5.0),
    ("twitter",     5.0),
    ("tiktok",      5.0),
    ("social",      5.0),
];

pub fn grade_for(total: u8) -> Grade {
    match total {
        t if t >= GRADE_A => Grade::A,
        t if t >= GRADE_B => Grade::B,
        t if t >= GRADE_C => Grade::C,
        _ => Grade::D,
    }
}

pub fn score(sub: &Submission) -> LeadScore {
    let mut reasons = Vec::new();

    let role_seniority = role_points(&sub.role);
    if role_seniority >= MATERIALITY {
        reasons.push(format!("senior role: {} (+{:.0})", sub.role, role_seniority));
    }

    let company_signal = company_points(sub);
    if company_signal >= MATERIALITY {
        let size = if sub.company_size.is_empty() { String::new() }
                   else { format!(", {} employees", sub.company_size) };
        reasons.push(format!("company: {}{} (+{:.0})", sub.company, size, company_signal));
    }

    let engagement = engagement_points(sub);
    if engagement >= MATERIALITY {
        reasons.push(format!(
            "engagement: {} chars, {} interests (+{:.0})",
            sub.message.chars().count(), sub.interests.len(), engagement
        ));
    }

    let source_quality = source_points(&sub.utm_source);
    if source_quality >= MATERIALITY {
        reasons.push(format!("source: {} (+{:.0})", sub.utm_source, source_quality));
    }

    let completeness = completeness_points(sub);
    if completeness >= MATERIALITY {
        reasons.push(format!("profile {:.0}% complete (+{:.0})", completeness * 10.0, completeness));
    }

    let breakdown = ScoreBreakdown { role_seniority, company_signal, engagement, source_quality, completeness };
    let total = breakdown.sum().round().clamp(0.0, 100.0) as u8;

    LeadScore { total, breakdown, grade: grade_for(total), reasons }
}

// ── Dimensions ───────────────────────────────────────────────────────────────

fn role_points(role: &str) -> f32 {
    lookup(ROLE_POINTS, &normalise_role(role)).unwrap_or(0.0)
}

fn company_points(sub: &Submission) -> f32 {
    if sub.company.trim().is_empty() { return 0.0; }
    let size: String = sub.company_size.chars().filter(|c| !c.is_whitespace()).collect();
    COMPANY_BASE_POINTS + lookup(SIZE_POINTS, &size).unwrap_or(0.0)
}

fn engagement_points(sub: &Submission) -> f32 {
    let message = if sub.message.chars().count() > MESSAGE_MIN_LEN { MESSAGE_POINTS } else { 0.0 };
    let interests = (sub.interests.len() as f32 * POINTS_PER_INTEREST).min(MAX_INTEREST_POINTS);
    message + interests
}

fn source_points(source: &str) -> f32 {
    let key: String = source
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();
    if key.is_empty() { return 0.0; }
    lookup(SOURCE_POINTS, &key).unwrap_or(UNKNOWN_SOURCE_POINTS)
}

fn completeness_points(sub: &Submission) -> f32 {
    let core = [&sub.name, &sub.email, &sub.company, &sub.role, &sub.phone];
    let filled = core.iter().filter(|f| !f.trim().is_empty()).count();
    filled as f32 / core.len() as f32 * COMPLETENESS_POINTS
}

fn lookup(table: &[(&str, f32)], key: &str) -> Option<f32> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn normalise_role(role: &str) -> String {
    role.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_lead() -> Submission {
        Submission {
            email:        "cmo@acme.com".into(),
            name:         "Jane Doe".into(),
            company:      "Acme Inc".into(),
            role:         "CMO".into(),
            company_size: "1000+".into(),
            phone:        "+1 555 0100".into(),
            message:      "x".repeat(200),
            interests:    vec!["seo".into(), "content".into(), "ppc".into()],
            utm_source:   "organic".into(),
            ..Default::default()
        }
    }

    #[test]
    fn grade_boundaries_are_exact() {
        assert_eq!(grade_for(100), Grade::A);
        assert_eq!(grade_for(70), Grade::A);
        assert_eq!(grade_for(69), Grade::B);
        assert_eq!(grade_for(50), Grade::B);
        assert_eq!(grade_for(49), Grade::C);
        assert_eq!(grade_for(30), Grade::C);
        assert_eq!(grade_for(29), Grade::D);
        assert_eq!(grade_for(0), Grade::D);
    }

    #[test]
    fn strong_lead_is_grade_a() {
        let s = score(&strong_lead());
        // 30 + (15 + 10) + (10 + 6) + 15 + 10
        assert_eq!(s.total, 96);
        assert_eq!(s.grade, Grade::A);
        assert_eq!(s.reasons.len(), 5);
    }

    #[test]
    fn empty_submission_scores_zero() {
        let s = score(&Submission::default());
        assert_eq!(s.total, 0);
        assert_eq!(s.grade, Grade::D);
        assert!(s.reasons.is_empty());
    }

    #[test]
    fn role_lookup_is_normalised() {
        assert_eq!(role_points("VP, Marketing"), 25.0);
        assert_eq!(role_points("  co-founder "), 28.0);
        assert_eq!(role_points("Astronaut"), 0.0);
    }

    #[test]
    fn company_size_without_company_scores_nothing() {
        let sub = Submission { company_size: "1000+".into(), ..Default::default() };
        assert_eq!(company_points(&sub), 0.0);
        let sub = Submission { company: "Acme".into(), company_size: "51 - 200".into(), ..Default::default() };
        assert_eq!(company_points(&sub), 21.0);
    }

    #[test]
    fn interests_cap_at_ten() {
        let sub = Submission { interests: vec!["i".into(); 9], ..Default::default() };
        assert_eq!(engagement_points(&sub), 10.0);
    }

    #[test]
    fn message_must_exceed_fifty_chars() {
        let at = Submission { message: "m".repeat(50), ..Default::default() };
        let over = Submission { message: "m".repeat(51), ..Default::default() };
        assert_eq!(engagement_points(&at), 0.0);
        assert_eq!(engagement_points(&over), 10.0);
    }

    #[test]
    fn sources() {
        assert_eq!(source_points("Organic"), 15.0);
        assert_eq!(source_points("google-ads"), 10.0);
        assert_eq!(source_points("facebook"), 5.0);
        assert_eq!(source_points("carrier pigeon"), UNKNOWN_SOURCE_POINTS);
        assert_eq!(source_points(""), 0.0);
    }

    #[test]
    fn partial_completeness_rounds_total() {
        let sub = Submission { name: "Jo".into(), email: "jo@x.io".into(), ..Default::default() };
        let s = score(&sub);
        assert_eq!(s.breakdown.completeness, 4.0);
        assert_eq!(s.total, 4);
        // Below materiality: no reason.
        assert!(s.reasons.is_empty());
    }

    #[test]
    fn deterministic() {
        assert_eq!(score(&strong_lead()), score(&strong_lead()));
    }
}
