// src/ingest/mod.rs
pub mod adapter;
pub mod catalog;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod types;

use crate::record::Record;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

pub use orchestrator::{Collection, CollectionStats, Orchestrator, SourceStat, SourceStatus};
pub use registry::{CollectorRegistry, RegisteredCollector};
pub use types::{Category, Collector, CollectorMeta};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_runs_total", "Collection runs started.");
        describe_counter!(
            "collect_records_total",
            "Records returned by collectors before dedup."
        );
        describe_counter!(
            "collect_collector_errors_total",
            "Collector failures (error, timeout or cancellation)."
        );
        describe_counter!(
            "collect_invalid_total",
            "Records dropped because their title was empty."
        );
        describe_counter!("collect_dedup_total", "Records removed as duplicates.");
        describe_histogram!("collect_duration_ms", "Collection run time in milliseconds.");
        describe_gauge!(
            "collect_last_unique_records",
            "Unique records produced by the last collection run."
        );
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (including NBSP left over from entity decoding)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Reduce records to one per `(trim(title), trim(organization))` key.
/// First-seen wins; input order is preserved for the survivors.
pub fn dedup(records: impl IntoIterator<Item = Record>) -> Vec<Record> {
    dedup_counted(records).0
}

/// Same as [`dedup`], also returning how many duplicates were dropped.
pub fn dedup_counted(records: impl IntoIterator<Item = Record>) -> (Vec<Record>, usize) {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut keep = Vec::new();
    let mut dropped = 0usize;

    for rec in records {
        let (title, org) = rec.dedup_key();
        if seen.insert((title.to_string(), org.to_string())) {
            keep.push(rec);
        } else {
            dropped += 1;
        }
    }

    (keep, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rec(id: &str, title: &str, org: &str) -> Record {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        Record::new(id, title, org, "test", t, t)
    }

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <b>2025 창업&nbsp;&nbsp;지원</b>\n  &ldquo;공고&rdquo; ";
        assert_eq!(normalize_text(s), "2025 창업 지원 \"공고\"");
    }

    #[test]
    fn first_seen_wins() {
        let out = dedup(vec![rec("1", "X", "Y"), rec("2", "X", "Y")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn whitespace_only_differences_are_duplicates() {
        let (out, dropped) = dedup_counted(vec![
            rec("1", "Grant A", "Gov"),
            rec("2", "  Grant A", "Gov  "),
            rec("3", "grant a", "Gov"),
        ]);
        assert_eq!(dropped, 1);
        let ids: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn same_title_different_org_is_kept() {
        let out = dedup(vec![rec("1", "X", "A"), rec("2", "X", "B")]);
        assert_eq!(out.len(), 2);
    }
}
