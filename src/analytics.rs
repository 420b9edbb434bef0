//! Day-bucketed analytics for the admin dashboard.
//!
//! Every time-series view shares one spine: a contiguous run of calendar-day
//! buckets ending at local today, oldest first. Records are dropped into a
//! bucket by the local calendar day of their `createdAt`; records whose
//! timestamp cannot be parsed, or that fall outside the window, are skipped
//! and never fail the aggregation.
//!
//! The `_at` variants take "today" explicitly so the window is reproducible
//! in tests; the plain variants read the local wall clock.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::models::Transaction;
use crate::status::normalize_status;

// ---------------------------------------------------------------------------
// Day buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayBuckets {
    pub buckets: Vec<DayBucket>,
    #[serde(skip)]
    pub index_map: HashMap<String, usize>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayBuckets {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket index for a local timestamp, `None` when outside the window.
    pub fn index_of(&self, at: NaiveDateTime) -> Option<usize> {
        self.index_map.get(&day_key(at.date())).copied()
    }
}

/// Zero-padded `YYYY-MM-DD`.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn build_day_buckets(days: NonZeroU32) -> DayBuckets {
    build_day_buckets_at(days, local_today())
}

pub fn build_day_buckets_at(days: NonZeroU32, today: NaiveDate) -> DayBuckets {
    let days = days.get() as usize;
    let start = today - Duration::days(days as i64 - 1);

    let mut buckets = Vec::with_capacity(days);
    let mut index_map = HashMap::with_capacity(days);
    for i in 0..days {
        let date = start + Duration::days(i as i64);
        let key = day_key(date);
        index_map.insert(key.clone(), i);
        buckets.push(DayBucket { date, key });
    }

    DayBuckets {
        buckets,
        index_map,
        start,
        end: today,
    }
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parse a backend timestamp into local wall-clock time.
///
/// Accepted: RFC 3339 (converted to local time), naive date-times (taken as
/// local), bare `YYYY-MM-DD` (local midnight), and JSON numbers as epoch
/// milliseconds. Everything else is `None`.
pub fn parse_record_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&Local).naive_local())
        }
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_optional_date(value: Option<&Value>) -> Option<NaiveDateTime> {
    value.and_then(parse_record_date)
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSeries {
    pub buckets: Vec<DayBucket>,
    pub credit: Vec<f64>,
    pub debit: Vec<f64>,
    pub net: Vec<f64>,
}

pub fn build_transaction_series_at(
    transactions: &[Transaction],
    days: NonZeroU32,
    today: NaiveDate,
) -> TransactionSeries {
    let spine = build_day_buckets_at(days, today);
    let mut credit = vec![0.0; spine.len()];
    let mut debit = vec![0.0; spine.len()];

    for tx in transactions {
        let Some(at) = parse_optional_date(tx.created_at.as_ref()) else {
            continue;
        };
        let Some(idx) = spine.index_of(at) else {
            continue;
        };
        let amount = tx.amount.filter(|a| a.is_finite()).unwrap_or(0.0);
        match tx.kind.as_deref() {
            Some("credit") => credit[idx] += amount,
            Some("debit") => debit[idx] += amount,
            _ => {}
        }
    }

    let net = credit.iter().zip(&debit).map(|(c, d)| c - d).collect();
    TransactionSeries {
        buckets: spine.buckets,
        credit,
        debit,
        net,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountSeries {
    pub buckets: Vec<DayBucket>,
    pub counts: Vec<u64>,
}

pub fn build_count_series_at<T, F>(
    items: &[T],
    days: NonZeroU32,
    date_of: F,
    today: NaiveDate,
) -> CountSeries
where
    F: Fn(&T) -> Option<&Value>,
{
    let spine = build_day_buckets_at(days, today);
    let mut counts = vec![0u64; spine.len()];
    for item in items {
        if let Some(idx) = parse_optional_date(date_of(item)).and_then(|at| spine.index_of(at)) {
            counts[idx] += 1;
        }
    }
    CountSeries {
        buckets: spine.buckets,
        counts,
    }
}

// ---------------------------------------------------------------------------
// Status summaries
// ---------------------------------------------------------------------------

/// Occurrences per normalized status. Iteration order is unspecified.
pub fn build_status_counts<T, F>(items: &[T], status_of: F) -> HashMap<String, usize>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(normalize_status(status_of(item))).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub status: String,
    pub value: usize,
    pub percent: u32,
}

/// Status breakdown with rounded percentages, largest first (ties by name).
pub fn status_rows(counts: &HashMap<String, usize>) -> Vec<StatusRow> {
    let total: usize = counts.values().sum();
    let mut rows: Vec<StatusRow> = counts
        .iter()
        .map(|(status, &value)| StatusRow {
            status: status.clone(),
            value,
            percent: if total == 0 {
                0
            } else {
                ((value as f64 / total as f64) * 100.0).round() as u32
            },
        })
        .collect();
    rows.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.status.cmp(&b.status)));
    rows
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransactionTotals {
    pub credit: f64,
    pub debit: f64,
    pub net: f64,
}

/// Credit/debit totals over all records, regardless of date.
pub fn transaction_totals(transactions: &[Transaction]) -> TransactionTotals {
    let mut totals = TransactionTotals::default();
    for tx in transactions {
        let amount = tx.amount.filter(|a| a.is_finite()).unwrap_or(0.0);
        match tx.kind.as_deref() {
            Some("credit") => totals.credit += amount,
            Some("debit") => totals.debit += amount,
            _ => {}
        }
    }
    totals.net = totals.credit - totals.debit;
    totals
}

/// Percent change of the second half of a series against the first half.
pub fn series_trend(data: &[f64]) -> Option<f64> {
    if data.len() < 4 {
        return None;
    }
    let midpoint = data.len() / 2;
    let previous: f64 = data[..midpoint].iter().sum();
    let current: f64 = data[midpoint..].iter().sum();
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous.abs() * 100.0)
}

// ---------------------------------------------------------------------------
// Metric selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyticsRange {
    Week,
    #[default]
    Month,
    Quarter,
}

impl AnalyticsRange {
    pub fn days(self) -> NonZeroU32 {
        let days = match self {
            AnalyticsRange::Week => 7,
            AnalyticsRange::Month => 30,
            AnalyticsRange::Quarter => 90,
        };
        NonZeroU32::new(days).unwrap_or(NonZeroU32::MIN)
    }

    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            7 => Some(AnalyticsRange::Week),
            30 => Some(AnalyticsRange::Month),
            90 => Some(AnalyticsRange::Quarter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyticsMetric {
    #[default]
    NetFlow,
    NewUsers,
    QrVolume,
}

impl AnalyticsMetric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "net-flow" | "net" | "transactions" => Some(AnalyticsMetric::NetFlow),
            "new-users" | "users" => Some(AnalyticsMetric::NewUsers),
            "qr-volume" | "qrs" => Some(AnalyticsMetric::QrVolume),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalyticsMetric::NetFlow => "Net flow",
            AnalyticsMetric::NewUsers => "New users",
            AnalyticsMetric::QrVolume => "QR volume",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricView {
    pub label: &'static str,
    pub keys: Vec<String>,
    pub data: Vec<f64>,
    pub total: f64,
    pub trend: Option<f64>,
}

/// The series the analytics panel shows for the selected metric.
pub fn metric_view(
    metric: AnalyticsMetric,
    transactions: &TransactionSeries,
    users: &CountSeries,
    qrs: &CountSeries,
) -> MetricView {
    let (buckets, data): (&[DayBucket], Vec<f64>) = match metric {
        AnalyticsMetric::NetFlow => (transactions.buckets.as_slice(), transactions.net.clone()),
        AnalyticsMetric::NewUsers => (
            users.buckets.as_slice(),
            users.counts.iter().map(|&c| c as f64).collect(),
        ),
        AnalyticsMetric::QrVolume => (
            qrs.buckets.as_slice(),
            qrs.counts.iter().map(|&c| c as f64).collect(),
        ),
    };
    MetricView {
        label: metric.label(),
        keys: buckets.iter().map(|b| b.key.clone()).collect(),
        total: data.iter().sum(),
        trend: series_trend(&data),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn days(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn tx(kind: &str, amount: f64, created_at: Value) -> Transaction {
        Transaction {
            kind: Some(kind.to_string()),
            amount: Some(amount),
            created_at: Some(created_at),
            ..Default::default()
        }
    }

    #[test]
    fn three_day_window_ends_today() {
        let spine = build_day_buckets_at(days(3), jan(15));
        let keys: Vec<&str> = spine.buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01-13", "2024-01-14", "2024-01-15"]);
        assert_eq!(spine.start, jan(13));
        assert_eq!(spine.end, jan(15));
        assert_eq!(spine.index_map.get("2024-01-14"), Some(&1));
    }

    #[test]
    fn buckets_are_contiguous_across_month_and_year_boundaries() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        for n in [1, 7, 30, 90, 400] {
            let spine = build_day_buckets_at(days(n), today);
            assert_eq!(spine.len(), n as usize);
            assert_eq!(spine.buckets.last().unwrap().date, today);
            for pair in spine.buckets.windows(2) {
                assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
                assert!(pair[0].key < pair[1].key);
            }
        }
    }

    #[test]
    fn transaction_series_example() {
        let txs = vec![
            tx("credit", 100.0, json!("2024-01-14")),
            tx("debit", 40.0, json!("2024-01-14")),
        ];
        let series = build_transaction_series_at(&txs, days(3), jan(15));
        assert_eq!(series.credit, vec![0.0, 100.0, 0.0]);
        assert_eq!(series.debit, vec![0.0, 40.0, 0.0]);
        assert_eq!(series.net, vec![0.0, 60.0, 0.0]);
    }

    #[test]
    fn malformed_dates_are_skipped() {
        let txs = vec![
            tx("credit", 10.0, Value::Null),
            tx("credit", 10.0, json!("not-a-date")),
            tx("credit", 10.0, json!({ "nested": true })),
            Transaction {
                kind: Some("credit".into()),
                amount: Some(10.0),
                created_at: None,
                ..Default::default()
            },
        ];
        let series = build_transaction_series_at(&txs, days(7), jan(15));
        assert!(series.credit.iter().all(|v| *v == 0.0));
        assert!(series.net.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn out_of_window_and_unknown_types_do_not_contribute() {
        let txs = vec![
            tx("credit", 500.0, json!("2024-01-01")),
            tx("debit", 70.0, json!("2024-01-16")),
            tx("refund", 30.0, json!("2024-01-15T08:00:00")),
            tx("credit", 20.0, json!("2024-01-15T08:00:00")),
            tx("debit", 5.0, json!("2024-01-13 23:59:59")),
        ];
        let series = build_transaction_series_at(&txs, days(3), jan(15));
        let credit: f64 = series.credit.iter().sum();
        let debit: f64 = series.debit.iter().sum();
        assert_eq!(credit - debit, 15.0);
        assert_eq!(series.credit, vec![0.0, 0.0, 20.0]);
        assert_eq!(series.debit, vec![5.0, 0.0, 0.0]);
    }

    #[test]
    fn count_series_uses_caller_date_extractor() {
        let items = vec![
            json!({ "joined": "2024-01-15" }),
            json!({ "joined": "2024-01-15T12:00:00" }),
            json!({ "joined": "2024-01-13" }),
            json!({ "joined": null }),
            json!({}),
        ];
        let series = build_count_series_at(&items, days(3), |v| v.get("joined"), jan(15));
        assert_eq!(series.counts, vec![1, 0, 2]);
    }

    #[test]
    fn status_counts_sum_to_input_length() {
        let items = vec![
            json!({ "status": "Active" }),
            json!({ "status": "active" }),
            json!({ "status": null }),
            json!({}),
            json!({ "status": "Redeemed" }),
        ];
        let counts = build_status_counts(&items, |v| v.get("status").and_then(Value::as_str));
        assert_eq!(counts.values().sum::<usize>(), items.len());
        assert_eq!(counts.get("active"), Some(&2));
        assert_eq!(counts.get("unknown"), Some(&2));
        assert_eq!(counts.get("redeemed"), Some(&1));
    }

    #[test]
    fn status_rows_are_sorted_with_percentages() {
        let counts = HashMap::from([("active".to_string(), 3), ("redeemed".to_string(), 1)]);
        let rows = status_rows(&counts);
        assert_eq!(rows[0].status, "active");
        assert_eq!(rows[0].percent, 75);
        assert_eq!(rows[1].percent, 25);
        assert!(status_rows(&HashMap::new()).is_empty());
    }

    #[test]
    fn trend_needs_four_points_and_a_nonzero_baseline() {
        assert_eq!(series_trend(&[1.0, 2.0, 3.0]), None);
        assert_eq!(series_trend(&[0.0, 0.0, 5.0, 5.0]), None);
        assert_eq!(series_trend(&[5.0, 5.0, 10.0, 5.0]), Some(50.0));
        assert_eq!(series_trend(&[-10.0, 0.0, -5.0, 0.0]), Some(50.0));
    }

    #[test]
    fn epoch_millis_are_accepted() {
        let parsed = parse_record_date(&json!(0)).expect("epoch should parse");
        let expected = DateTime::from_timestamp_millis(0)
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn metric_view_selects_series() {
        let txs = vec![tx("credit", 10.0, json!("2024-01-15"))];
        let users = vec![json!({ "createdAt": "2024-01-14" })];
        let tx_series = build_transaction_series_at(&txs, days(7), jan(15));
        let user_series = build_count_series_at(&users, days(7), |u| u.get("createdAt"), jan(15));
        let qr_series = build_count_series_at(&Vec::<Value>::new(), days(7), |q| q.get("createdAt"), jan(15));

        let view = metric_view(AnalyticsMetric::NewUsers, &tx_series, &user_series, &qr_series);
        assert_eq!(view.label, "New users");
        assert_eq!(view.total, 1.0);
        assert_eq!(view.keys.len(), 7);

        let view = metric_view(AnalyticsMetric::NetFlow, &tx_series, &user_series, &qr_series);
        assert_eq!(view.total, 10.0);
        assert_eq!(AnalyticsRange::from_days(90), Some(AnalyticsRange::Quarter));
        assert_eq!(AnalyticsRange::from_days(14), None);
    }

    #[test]
    fn metric_names_parse_leniently() {
        assert_eq!(AnalyticsMetric::parse("net_flow"), Some(AnalyticsMetric::NetFlow));
        assert_eq!(AnalyticsMetric::parse("New-Users"), Some(AnalyticsMetric::NewUsers));
        assert_eq!(AnalyticsMetric::parse("qrs"), Some(AnalyticsMetric::QrVolume));
        assert_eq!(AnalyticsMetric::parse("revenue"), None);
    }
}
