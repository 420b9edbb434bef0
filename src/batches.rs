//! QR batch grouping for the registry views.
//!
//! A batch is not persisted anywhere: it is every QR that shares a campaign
//! and a cashback amount, summarised for listing, sorting and export.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::analytics::parse_record_date;
use crate::models::QrRecord;
use crate::status::QrStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub key: String,
    pub campaign_id: Option<String>,
    pub campaign_title: String,
    pub brand_name: String,
    pub vendor_label: String,
    pub cashback_amount: Option<f64>,
    pub total: u64,
    pub active: u64,
    pub redeemed: u64,
    /// Raw `createdAt` of the newest record in the batch.
    pub last_created_at: Option<String>,
    #[serde(skip)]
    last_created_sort: Option<NaiveDateTime>,
}

impl BatchSummary {
    fn recency(&self) -> NaiveDateTime {
        self.last_created_sort.unwrap_or_default()
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.campaign_title, self.brand_name, self.vendor_label
        )
        .to_lowercase()
    }
}

/// `{campaignId}-{cashback}` with `unknown` / `na` placeholders.
pub fn batch_key(campaign_id: Option<&str>, cashback: Option<f64>) -> String {
    let campaign = campaign_id.unwrap_or("unknown");
    match cashback.filter(|v| v.is_finite()) {
        Some(amount) => format!("{campaign}-{amount:.2}"),
        None => format!("{campaign}-na"),
    }
}

fn raw_timestamp(qr: &QrRecord) -> Option<String> {
    match qr.created_at.as_ref()? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Group QR records by (campaign, cashback amount), in first-seen order.
pub fn group_batches(records: &[QrRecord]) -> Vec<BatchSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, BatchSummary> = HashMap::new();

    for qr in records {
        let cashback = qr.cashback_amount.filter(|v| v.is_finite());
        let key = batch_key(qr.resolved_campaign_id(), cashback);

        let batch = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            BatchSummary {
                key: key.clone(),
                campaign_id: qr.resolved_campaign_id().map(str::to_string),
                campaign_title: qr.campaign_title().unwrap_or("Campaign").to_string(),
                brand_name: qr.brand_name().unwrap_or("-").to_string(),
                vendor_label: qr.vendor_label().unwrap_or_else(|| "-".to_string()),
                cashback_amount: cashback,
                total: 0,
                active: 0,
                redeemed: 0,
                last_created_at: None,
                last_created_sort: None,
            }
        });

        batch.total += 1;
        let status = QrStatus::classify(qr.status.as_deref());
        if status == QrStatus::Redeemed {
            batch.redeemed += 1;
        } else if status.counts_as_active() {
            batch.active += 1;
        }

        let parsed = qr.created_at.as_ref().and_then(parse_record_date);
        let adopt = match (parsed, batch.last_created_sort) {
            (Some(candidate), Some(current)) => candidate > current,
            (Some(_), None) => true,
            // Invalid dates only stand in while nothing valid has been seen.
            (None, None) => batch.last_created_at.is_none(),
            (None, Some(_)) => false,
        };
        if adopt {
            batch.last_created_at = raw_timestamp(qr);
            batch.last_created_sort = parsed;
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

// ---------------------------------------------------------------------------
// Sorting, filtering, pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchSort {
    #[default]
    Recent,
    Quantity,
    Active,
    Cashback,
    Oldest,
}

impl BatchSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recent" | "newest" => Some(BatchSort::Recent),
            "quantity" | "total" => Some(BatchSort::Quantity),
            "active" => Some(BatchSort::Active),
            "cashback" | "amount" => Some(BatchSort::Cashback),
            "oldest" => Some(BatchSort::Oldest),
            _ => None,
        }
    }
}

fn compare_f64_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.unwrap_or(f64::NEG_INFINITY);
    let b = b.unwrap_or(f64::NEG_INFINITY);
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn sort_batches(batches: &mut [BatchSummary], sort: BatchSort) {
    batches.sort_by(|a, b| {
        let recency_desc = || b.recency().cmp(&a.recency());
        let primary = match sort {
            BatchSort::Recent => recency_desc(),
            BatchSort::Quantity => b.total.cmp(&a.total).then_with(recency_desc),
            BatchSort::Active => b.active.cmp(&a.active).then_with(recency_desc),
            BatchSort::Cashback => {
                compare_f64_desc(a.cashback_amount, b.cashback_amount).then_with(recency_desc)
            }
            BatchSort::Oldest => a.recency().cmp(&b.recency()),
        };
        primary.then_with(|| a.key.cmp(&b.key))
    });
}

/// Case-insensitive substring match over campaign, brand and vendor.
pub fn filter_batches(batches: Vec<BatchSummary>, query: &str) -> Vec<BatchSummary> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return batches;
    }
    batches
        .into_iter()
        .filter(|b| b.search_text().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// One-based page; out-of-range pages are clamped.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_items);
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        total_pages,
        total_items,
    }
}

#[derive(Debug, Clone)]
pub struct BatchQuery {
    pub search: String,
    pub sort: BatchSort,
    pub page: usize,
    pub per_page: usize,
}

impl Default for BatchQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort: BatchSort::Recent,
            page: 1,
            per_page: 10,
        }
    }
}

/// Group, filter, sort and paginate in one pass.
pub fn query_batches(records: &[QrRecord], query: &BatchQuery) -> Page<BatchSummary> {
    let mut batches = filter_batches(group_batches(records), &query.search);
    sort_batches(&mut batches, query.sort);
    paginate(&batches, query.page, query.per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrandRef, CampaignRef, VendorRef};
    use serde_json::json;

    fn qr(campaign: &str, amount: Option<f64>, status: &str, created: &str) -> QrRecord {
        QrRecord {
            unique_hash: format!("{campaign}-{status}-{created}"),
            cashback_amount: amount,
            status: Some(status.to_string()),
            campaign_id: Some(campaign.to_string()),
            campaign: Some(CampaignRef {
                id: Some(campaign.to_string()),
                title: Some(format!("Campaign {campaign}")),
                brand: Some(BrandRef {
                    name: Some("Acme".into()),
                    vendor: Some(Box::new(VendorRef {
                        business_name: Some(format!("Vendor of {campaign}")),
                        ..Default::default()
                    })),
                }),
            }),
            created_at: Some(json!(created)),
            ..Default::default()
        }
    }

    #[test]
    fn groups_by_campaign_and_amount() {
        let records = vec![
            qr("c1", Some(10.0), "active", "2024-01-10"),
            qr("c1", Some(10.0), "redeemed", "2024-01-12"),
            qr("c1", Some(10.0), "blocked", "2024-01-11"),
            qr("c1", Some(20.0), "used", "2024-01-09"),
            qr("c2", None, "pending", "2024-01-08"),
        ];
        let batches = group_batches(&records);
        assert_eq!(batches.len(), 3);

        let first = &batches[0];
        assert_eq!(first.key, "c1-10.00");
        assert_eq!((first.total, first.active, first.redeemed), (3, 1, 1));
        assert_eq!(first.last_created_at.as_deref(), Some("2024-01-12"));

        assert_eq!(batches[1].key, "c1-20.00");
        assert_eq!(batches[1].redeemed, 1);
        assert_eq!(batches[2].key, "c2-na");
        assert_eq!(batches[2].active, 1);
    }

    #[test]
    fn missing_campaign_groups_under_unknown() {
        let mut record = qr("x", Some(5.0), "active", "2024-01-01");
        record.campaign_id = None;
        record.campaign = None;
        let batches = group_batches(&[record]);
        assert_eq!(batches[0].key, "unknown-5.00");
        assert_eq!(batches[0].campaign_title, "Campaign");
    }

    #[test]
    fn invalid_dates_never_replace_a_valid_maximum() {
        let records = vec![
            qr("c1", Some(1.0), "active", "garbage"),
            qr("c1", Some(1.0), "active", "2024-01-05"),
            qr("c1", Some(1.0), "active", "also-garbage"),
        ];
        let batches = group_batches(&records);
        assert_eq!(batches[0].last_created_at.as_deref(), Some("2024-01-05"));

        let only_invalid = group_batches(&[qr("c9", Some(1.0), "active", "garbage")]);
        assert_eq!(only_invalid[0].last_created_at.as_deref(), Some("garbage"));
    }

    #[test]
    fn grouping_is_order_independent_after_sorting() {
        let records = vec![
            qr("c1", Some(10.0), "active", "2024-01-10"),
            qr("c2", Some(10.0), "redeemed", "2024-01-12"),
            qr("c1", Some(10.0), "redeemed", "2024-01-11"),
            qr("c3", Some(30.0), "active", "2024-01-01"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let mut a = group_batches(&records);
        let mut b = group_batches(&reversed);
        sort_batches(&mut a, BatchSort::Recent);
        sort_batches(&mut b, BatchSort::Recent);
        assert_eq!(a, b);
        assert_eq!(group_batches(&records), group_batches(&records));
    }

    #[test]
    fn sort_modes_and_tie_breaks() {
        let records = vec![
            qr("old", Some(50.0), "active", "2024-01-01"),
            qr("new", Some(10.0), "active", "2024-01-20"),
            qr("mid", Some(10.0), "active", "2024-01-10"),
            qr("mid", Some(10.0), "redeemed", "2024-01-09"),
        ];
        let keys = |sort| {
            let mut batches = group_batches(&records);
            sort_batches(&mut batches, sort);
            batches.into_iter().map(|b| b.key).collect::<Vec<_>>()
        };

        assert_eq!(keys(BatchSort::Recent), ["new-10.00", "mid-10.00", "old-50.00"]);
        assert_eq!(keys(BatchSort::Oldest), ["old-50.00", "mid-10.00", "new-10.00"]);
        assert_eq!(keys(BatchSort::Quantity), ["mid-10.00", "new-10.00", "old-50.00"]);
        // active counts tie at 1; recency decides
        assert_eq!(keys(BatchSort::Active), ["new-10.00", "mid-10.00", "old-50.00"]);
        assert_eq!(keys(BatchSort::Cashback), ["old-50.00", "new-10.00", "mid-10.00"]);
    }

    #[test]
    fn filter_matches_campaign_brand_or_vendor() {
        let records = vec![
            qr("alpha", Some(1.0), "active", "2024-01-01"),
            qr("beta", Some(1.0), "active", "2024-01-01"),
        ];
        let batches = group_batches(&records);
        assert_eq!(filter_batches(batches.clone(), "  ").len(), 2);
        assert_eq!(filter_batches(batches.clone(), "CAMPAIGN ALPHA").len(), 1);
        assert_eq!(filter_batches(batches.clone(), "vendor of beta").len(), 1);
        assert_eq!(filter_batches(batches.clone(), "acme").len(), 2);
        assert!(filter_batches(batches, "zzz").is_empty());
    }

    #[test]
    fn pagination_clamps_page_numbers() {
        let items: Vec<u32> = (1..=25).collect();
        let page = paginate(&items, 3, 10);
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total_pages, 3);

        let clamped = paginate(&items, 99, 10);
        assert_eq!(clamped.page, 3);
        assert_eq!(paginate(&items, 0, 10).page, 1);

        let empty = paginate::<u32>(&[], 1, 10);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn query_filters_before_paginating() {
        let records: Vec<QrRecord> = (0..15)
            .map(|i| qr(&format!("c{i}"), Some(1.0), "active", "2024-01-01"))
            .collect();
        let query = BatchQuery {
            search: "campaign c1".into(),
            per_page: 4,
            ..Default::default()
        };
        let page = query_batches(&records, &query);
        // c1, c10..c14
        assert_eq!(page.total_items, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 4);
    }
}
