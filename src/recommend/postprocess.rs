// src/recommend/postprocess.rs
//! Dedup / verify-apply / sort / truncate. Pure functions over the candidate pool.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::recommend::types::Candidate;

/// Exact link -> reachability, scoped to one request.
pub type VerificationMap = HashMap<String, bool>;

/// Keep the first occurrence of each case-insensitive `title:link` pair, preserving order.
pub fn dedupe(items: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|c| seen.insert(c.dedup_key()))
        .collect()
}

/// Set `verified` from the map; unprobed links keep their prior value or become `false`.
pub fn apply_verification(
    items: Vec<Candidate>,
    verifications: &VerificationMap,
) -> Vec<Candidate> {
    items
        .into_iter()
        .map(|mut c| {
            let probed = verifications.get(&c.link).copied();
            c.verified = Some(probed.or(c.verified).unwrap_or(false));
            c
        })
        .collect()
}

/// Stable sort, all keys descending: verified, score (absent = 0), publishedAt (absent = epoch).
pub fn sort_candidates(mut items: Vec<Candidate>) -> Vec<Candidate> {
    items.sort_by(compare);
    items
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    let va = a.verified.unwrap_or(false);
    let vb = b.verified.unwrap_or(false);
    vb.cmp(&va)
        .then_with(|| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)))
        .then_with(|| published_millis(b).cmp(&published_millis(a)))
}

fn published_millis(c: &Candidate) -> i64 {
    c.published_at.as_deref().map(parse_timestamp_millis).unwrap_or(0)
}

/// Milliseconds since epoch for the date formats providers emit; 0 when unparseable.
pub fn parse_timestamp_millis(raw: &str) -> i64 {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_millis();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.timestamp_millis();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return dt.and_utc().timestamp_millis();
        }
    }
    for fmt in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis())
                .unwrap_or(0);
        }
    }
    0
}

/// Verify-apply, sort, then keep the first `limit` entries.
pub fn rank(
    items: Vec<Candidate>,
    verifications: &VerificationMap,
    limit: usize,
) -> Vec<Candidate> {
    let mut ranked = sort_candidates(apply_verification(items, verifications));
    ranked.truncate(limit);
    ranked
}
