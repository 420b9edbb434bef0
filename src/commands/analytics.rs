use anyhow::bail;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::Context;
use crate::analytics::{
    build_count_series_at, build_day_buckets, build_status_counts, build_transaction_series_at,
    metric_view, status_rows, transaction_totals, AnalyticsMetric, AnalyticsRange,
};
use crate::auth::{classify_failure, Failure, NOTICE_EXPIRED};
use crate::endpoints;

/// Rows of one input, or an empty set with its message recorded in `errors`.
fn loaded<T>(name: &str, result: Result<Vec<T>, Failure>, errors: &mut Map<String, Value>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(failure) => {
            let message = match failure {
                Failure::Message(message) => message,
                Failure::SessionExpired => NOTICE_EXPIRED.to_string(),
            };
            warn!(input = name, error = %message, "analytics input failed");
            errors.insert(name.to_string(), json!(message));
            Vec::new()
        }
    }
}

pub async fn run(ctx: &Context, range: u32, metric: &str) -> anyhow::Result<Value> {
    let Some(range) = AnalyticsRange::from_days(range) else {
        bail!("Range must be 7, 30 or 90 days.");
    };
    let Some(metric) = AnalyticsMetric::parse(metric) else {
        bail!("Unknown metric `{metric}`. Use net-flow, new-users or qr-volume.");
    };
    let token = ctx.token()?;
    let days = range.days();

    let (transactions, users, qrs) = tokio::join!(
        endpoints::transactions(&ctx.client, &token, &[]),
        endpoints::users(&ctx.client, &token),
        endpoints::qrs(&ctx.client, &token, &[]),
    );
    let transactions = transactions.map_err(|e| classify_failure(&e, "Unable to load transactions."));
    let users = users.map_err(|e| classify_failure(&e, "Unable to load users."));
    let qrs = qrs.map_err(|e| classify_failure(&e, "Unable to load QR codes."));

    // A 401 from any input ends the session, whatever the others returned.
    let expired = [
        transactions.as_ref().err(),
        users.as_ref().err(),
        qrs.as_ref().err(),
    ]
    .into_iter()
    .flatten()
    .any(|f| *f == Failure::SessionExpired);
    if expired {
        return Err(ctx.session_expired());
    }

    let mut errors = Map::new();
    let transactions = loaded("transactions", transactions, &mut errors);
    let users = loaded("users", users, &mut errors);
    let qrs = loaded("qrs", qrs, &mut errors);
    if errors.len() == 3 {
        let message = errors
            .get("transactions")
            .and_then(Value::as_str)
            .unwrap_or("Unable to load analytics.");
        bail!("{message}");
    }
    debug!(
        transactions = transactions.len(),
        users = users.len(),
        qrs = qrs.len(),
        days = days.get(),
        "analytics inputs loaded"
    );

    let window = build_day_buckets(days);
    let today = window.end;
    let tx_series = build_transaction_series_at(&transactions, days, today);
    let user_series = build_count_series_at(&users, days, |u| u.created_at.as_ref(), today);
    let qr_series = build_count_series_at(&qrs, days, |q| q.created_at.as_ref(), today);
    let view = metric_view(metric, &tx_series, &user_series, &qr_series);

    let tx_status = status_rows(&build_status_counts(&transactions, |t| t.status.as_deref()));
    let qr_status = status_rows(&build_status_counts(&qrs, |q| q.status.as_deref()));

    Ok(json!({
        "days": days.get(),
        "from": window.start,
        "to": window.end,
        "metric": view,
        "totals": transaction_totals(&transactions),
        "transactions": tx_series,
        "transactionStatus": tx_status,
        "qrStatus": qr_status,
        "errors": errors,
    }))
}
