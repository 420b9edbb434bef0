//! Typed wrappers for the backend routes the dashboards call.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{
    Campaign, DashboardStats, LoginResponse, NewCampaign, Notification, Order, Profile, QrRecord,
    QrVerification, RedeemResult, Subscription, Transaction, User, UserDashboard, Vendor,
    Withdrawal,
};

/// Upper bound the dashboards request when pulling every QR of a batch.
pub const BATCH_FETCH_LIMIT: u32 = 5000;

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Accept a bare array or an envelope keyed by `items` (or `alt_key`).
/// Rows that fail to deserialize are skipped.
fn decode_list<T: DeserializeOwned>(data: Value, alt_key: &str) -> Vec<T> {
    let rows = match data {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("items").or_else(|| map.remove(alt_key)) {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let total = rows.len();
    let parsed: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                None
            }
        })
        .collect();
    if parsed.len() != total {
        warn!(kept = parsed.len(), total, "some rows could not be parsed");
    }
    parsed
}

fn get<'a>(token: Option<&'a str>) -> RequestOptions<'a> {
    RequestOptions::get(token)
}

fn send<'a>(method: Method, token: Option<&'a str>, body: Option<Value>) -> RequestOptions<'a> {
    RequestOptions::with_body(method, token, body)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let body = json!({ "email": email, "password": password });
    let data = client
        .request("/api/auth/login", send(Method::POST, None, Some(body)))
        .await?;
    decode(data)
}

pub async fn me(client: &ApiClient, token: &str) -> Result<Profile, ApiError> {
    decode(client.request("/api/auth/me", get(Some(token))).await?)
}

pub async fn send_otp(client: &ApiClient, phone_number: &str) -> Result<Value, ApiError> {
    let body = json!({ "phoneNumber": phone_number });
    client
        .request("/api/auth/send-otp", send(Method::POST, None, Some(body)))
        .await
}

pub async fn verify_otp(client: &ApiClient, phone_number: &str, otp: &str) -> Result<LoginResponse, ApiError> {
    let body = json!({ "phoneNumber": phone_number, "otp": otp });
    let data = client
        .request("/api/auth/verify-otp", send(Method::POST, None, Some(body)))
        .await?;
    decode(data)
}

// ---------------------------------------------------------------------------
// User / public
// ---------------------------------------------------------------------------

/// Wallet balance and recent activity of the signed-in consumer.
pub async fn user_dashboard(client: &ApiClient, token: &str) -> Result<UserDashboard, ApiError> {
    decode(client.request("/api/user/dashboard", get(Some(token))).await?)
}

/// Redeem a QR into the signed-in user's wallet.
pub async fn scan_qr(client: &ApiClient, token: &str, hash: &str) -> Result<RedeemResult, ApiError> {
    let opts = send(Method::POST, Some(token), None).at(&[hash]);
    decode(client.request("/api/user/scan-qr", opts).await?)
}

pub async fn verify_public_qr(client: &ApiClient, hash: &str) -> Result<QrVerification, ApiError> {
    decode(client.request("/api/public/qrs", get(None).at(&[hash])).await?)
}

// ---------------------------------------------------------------------------
// Vendor
// ---------------------------------------------------------------------------

pub async fn wallet(client: &ApiClient, token: &str) -> Result<Value, ApiError> {
    client.request("/api/vendor/wallet", get(Some(token))).await
}

pub async fn recharge_wallet(client: &ApiClient, token: &str, amount: f64) -> Result<Value, ApiError> {
    let body = json!({ "amount": amount });
    client
        .request("/api/vendor/wallet/recharge", send(Method::POST, Some(token), Some(body)))
        .await
}

/// The vendor's campaigns. A vendor without a brand gets 404, read as none.
pub async fn vendor_campaigns(client: &ApiClient, token: &str) -> Result<Vec<Campaign>, ApiError> {
    match client.request("/api/vendor/campaigns", get(Some(token))).await {
        Ok(data) => Ok(decode_list(data, "campaigns")),
        Err(e) if e.status() == Some(404) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

pub async fn create_vendor_campaign(
    client: &ApiClient,
    token: &str,
    campaign: &NewCampaign,
) -> Result<Campaign, ApiError> {
    let body = serde_json::to_value(campaign).map_err(|e| ApiError::Decode(e.to_string()))?;
    let opts = send(Method::POST, Some(token), Some(body));
    decode(client.request("/api/vendor/campaigns", opts).await?)
}

pub async fn vendor_qrs(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<QrRecord>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(client.request("/api/vendor/qrs", opts).await?, "qrs"))
}

pub async fn delete_qr_batch(
    client: &ApiClient,
    token: &str,
    campaign_id: &str,
    cashback_amount: Option<f64>,
) -> Result<Value, ApiError> {
    let body = json!({ "campaignId": campaign_id, "cashbackAmount": cashback_amount });
    let opts = send(Method::DELETE, Some(token), Some(body)).query(&[
        ("campaignId", Some(campaign_id.to_string())),
        ("cashbackAmount", cashback_amount.map(|a| a.to_string())),
    ]);
    client.request("/api/vendor/qrs/batch", opts).await
}

pub async fn vendor_orders(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<Order>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(client.request("/api/vendor/orders", opts).await?, "orders"))
}

pub async fn create_order(
    client: &ApiClient,
    token: &str,
    campaign_id: &str,
    quantity: u32,
    cashback_amount: f64,
) -> Result<Value, ApiError> {
    let body = json!({
        "campaignId": campaign_id,
        "quantity": quantity,
        "cashbackAmount": cashback_amount,
    });
    client
        .request("/api/vendor/orders", send(Method::POST, Some(token), Some(body)))
        .await
}

pub async fn pay_order(client: &ApiClient, token: &str, order_id: &str) -> Result<Value, ApiError> {
    let opts = send(Method::POST, Some(token), None).at(&[order_id, "pay"]);
    client.request("/api/vendor/orders", opts).await
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

pub async fn dashboard(client: &ApiClient, token: &str) -> Result<DashboardStats, ApiError> {
    decode(client.request("/api/admin/dashboard", get(Some(token))).await?)
}

pub async fn users(client: &ApiClient, token: &str) -> Result<Vec<User>, ApiError> {
    Ok(decode_list(
        client.request("/api/admin/users", get(Some(token))).await?,
        "users",
    ))
}

pub async fn update_user_status(
    client: &ApiClient,
    token: &str,
    user_id: &str,
    status: &str,
) -> Result<Value, ApiError> {
    let body = json!({ "status": status });
    let opts = send(Method::PUT, Some(token), Some(body)).at(&[user_id, "status"]);
    client.request("/api/admin/users", opts).await
}

pub async fn vendors(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<Vendor>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(client.request("/api/admin/vendors", opts).await?, "vendors"))
}

pub async fn update_vendor_status(
    client: &ApiClient,
    token: &str,
    vendor_id: &str,
    status: &str,
) -> Result<Value, ApiError> {
    let body = json!({ "status": status });
    let opts = send(Method::PUT, Some(token), Some(body)).at(&[vendor_id, "verify"]);
    client.request("/api/admin/vendors", opts).await
}

pub async fn transactions(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<Transaction>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(
        client.request("/api/admin/transactions", opts).await?,
        "transactions",
    ))
}

pub async fn qrs(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<QrRecord>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(client.request("/api/admin/qrs", opts).await?, "qrs"))
}

/// Every QR of one batch, selected either by order or by campaign + amount.
pub async fn qr_batch(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<QrRecord>, ApiError> {
    let mut all: Vec<(&str, Option<String>)> = params.to_vec();
    if !all.iter().any(|(k, _)| *k == "limit") {
        all.push(("limit", Some(BATCH_FETCH_LIMIT.to_string())));
    }
    let opts = get(Some(token)).query(&all);
    Ok(decode_list(client.request("/api/admin/qrs/batch", opts).await?, "qrs"))
}

pub async fn withdrawals(client: &ApiClient, token: &str) -> Result<Vec<Withdrawal>, ApiError> {
    Ok(decode_list(
        client.request("/api/admin/withdrawals", get(Some(token))).await?,
        "withdrawals",
    ))
}

pub async fn process_withdrawal(
    client: &ApiClient,
    token: &str,
    withdrawal_id: &str,
    status: &str,
    reference_id: Option<&str>,
    admin_note: Option<&str>,
) -> Result<Value, ApiError> {
    let mut body = json!({ "status": status });
    if let Some(reference) = reference_id.map(str::trim).filter(|s| !s.is_empty()) {
        body["referenceId"] = json!(reference);
    }
    if let Some(note) = admin_note.map(str::trim).filter(|s| !s.is_empty()) {
        body["adminNote"] = json!(note);
    }
    let opts = send(Method::PUT, Some(token), Some(body)).at(&[withdrawal_id, "process"]);
    client.request("/api/admin/withdrawals", opts).await
}

pub async fn subscriptions(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<Subscription>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(
        client.request("/api/admin/subscriptions", opts).await?,
        "subscriptions",
    ))
}

pub async fn notifications(client: &ApiClient, token: &str) -> Result<Vec<Notification>, ApiError> {
    Ok(decode_list(
        client.request("/api/admin/notifications", get(Some(token))).await?,
        "notifications",
    ))
}

pub async fn orders(
    client: &ApiClient,
    token: &str,
    params: &[(&str, Option<String>)],
) -> Result<Vec<Order>, ApiError> {
    let opts = get(Some(token)).query(params);
    Ok(decode_list(client.request("/api/admin/orders", opts).await?, "orders"))
}

pub async fn update_order_status(
    client: &ApiClient,
    token: &str,
    order_id: &str,
    status: &str,
) -> Result<Value, ApiError> {
    let body = json!({ "status": status });
    let opts = send(Method::PUT, Some(token), Some(body)).at(&[order_id, "status"]);
    client.request("/api/admin/orders", opts).await
}

pub async fn update_campaign_status(
    client: &ApiClient,
    token: &str,
    campaign_id: &str,
    status: &str,
) -> Result<Value, ApiError> {
    let body = json!({ "status": status });
    let opts = send(Method::PUT, Some(token), Some(body)).at(&[campaign_id, "status"]);
    client.request("/api/admin/campaigns", opts).await
}

/// Per-QR print price for a brand; `None` clears it back to the platform default.
pub async fn update_brand_price(
    client: &ApiClient,
    token: &str,
    brand_id: &str,
    qr_price_per_unit: Option<f64>,
) -> Result<Value, ApiError> {
    let body = json!({ "qrPricePerUnit": qr_price_per_unit });
    let opts = send(Method::PUT, Some(token), Some(body)).at(&[brand_id]);
    client.request("/api/admin/brands", opts).await
}

pub async fn credit_vendor_wallet(
    client: &ApiClient,
    token: &str,
    vendor_id: &str,
    amount: f64,
    description: Option<&str>,
) -> Result<Value, ApiError> {
    let mut body = json!({ "vendorId": vendor_id, "amount": amount });
    if let Some(description) = description.map(str::trim).filter(|s| !s.is_empty()) {
        body["description"] = json!(description);
    }
    client
        .request("/api/admin/wallets/credit", send(Method::POST, Some(token), Some(body)))
        .await
}
