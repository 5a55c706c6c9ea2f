// src/rank.rs
//! Orderings over analyzed records. Pure; callers pick the one they need.

use chrono::{DateTime, Duration, Utc};

use crate::record::AnalyzedRecord;

/// `HIGH < MEDIUM < LOW`, then score descending. Equal keys keep input order.
pub fn rank_by_priority(mut records: Vec<AnalyzedRecord>) -> Vec<AnalyzedRecord> {
    records.sort_by(|a, b| {
        a.analysis
            .priority
            .cmp(&b.analysis.priority)
            .then_with(|| b.analysis.score.cmp(&a.analysis.score))
    });
    records
}

/// Soonest deadline first. Equal deadlines keep input order.
pub fn rank_by_deadline(mut records: Vec<AnalyzedRecord>) -> Vec<AnalyzedRecord> {
    records.sort_by_key(|r| r.record.deadline);
    records
}

/// Whole days from `now` to the deadline, rounded up; negative once expired.
pub fn days_until_deadline(record: &AnalyzedRecord, now: DateTime<Utc>) -> i64 {
    let secs = (record.record.deadline - now).num_seconds();
    secs.div_euclid(86_400) + i64::from(secs.rem_euclid(86_400) != 0)
}

/// Records whose deadline falls within `[now, now + within_days]`, soonest first.
pub fn urgent(records: &[AnalyzedRecord], now: DateTime<Utc>, within_days: i64) -> Vec<AnalyzedRecord> {
    let horizon = now + Duration::days(within_days);
    let hits: Vec<AnalyzedRecord> = records
        .iter()
        .filter(|r| r.record.deadline >= now && r.record.deadline <= horizon)
        .cloned()
        .collect();
    rank_by_deadline(hits)
}
