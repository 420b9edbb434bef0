//! Admin moderation: account status, vendor verification, withdrawals,
//! campaign status, wallet credits and brand pricing, plus the
//! subscription and notification feeds.

use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use super::Context;
use crate::endpoints;
use crate::format::{format_date, format_decimal};
use crate::status::StatusTone;
use crate::validation::{require, validate_amount, validate_qr_price};

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Set a user account's status (active, blocked, ...).
    UserStatus { id: String, status: String },
    /// List vendors, optionally by status.
    Vendors {
        #[arg(long)]
        status: Option<String>,
    },
    /// Approve or reject a vendor's verification.
    VerifyVendor { id: String, status: String },
    /// List withdrawal requests.
    Withdrawals,
    /// Settle a withdrawal request.
    ProcessWithdrawal {
        id: String,
        /// processed or rejected.
        #[arg(long)]
        status: String,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Set a campaign's status (active, paused, rejected, ...).
    CampaignStatus { id: String, status: String },
    /// Credit a vendor wallet.
    Credit {
        vendor: String,
        amount: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Set a brand's per-QR print price; pass "" to clear it.
    BrandPrice { brand: String, price: String },
    /// Vendor subscriptions, optionally by status.
    Subscriptions {
        #[arg(long)]
        status: Option<String>,
    },
    /// Platform notifications for admins.
    Notifications,
}

fn status_arg(raw: &str) -> anyhow::Result<String> {
    Ok(require(raw, "Select a status.")?.to_lowercase())
}

pub async fn run(ctx: &Context, action: AdminCommand) -> anyhow::Result<Value> {
    let token = ctx.token()?;
    let client = &ctx.client;
    match action {
        AdminCommand::UserStatus { id, status } => {
            let status = status_arg(&status)?;
            endpoints::update_user_status(client, &token, &id, &status)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to update user status."))?;
            info!(user_id = %id, %status, "user status updated");
            Ok(json!({ "id": id, "status": status, "message": "User status updated." }))
        }
        AdminCommand::Vendors { status } => {
            let vendors = endpoints::vendors(client, &token, &[("status", status)])
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load vendors."))?;
            let rows: Vec<Value> = vendors
                .iter()
                .map(|v| {
                    json!({
                        "id": v.id,
                        "businessName": v.business_name,
                        "email": v.user.as_ref().and_then(|u| u.email.clone()),
                        "phone": v.contact_phone,
                        "gstin": v.gstin,
                        "status": v.status,
                        "tone": StatusTone::of(v.status.as_deref()),
                        "joined": format_date(v.created_at.as_ref()),
                    })
                })
                .collect();
            Ok(json!({ "vendors": rows }))
        }
        AdminCommand::VerifyVendor { id, status } => {
            let status = status_arg(&status)?;
            endpoints::update_vendor_status(client, &token, &id, &status)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to update vendor status."))?;
            info!(vendor_id = %id, %status, "vendor status updated");
            Ok(json!({ "id": id, "status": status, "message": "Vendor status updated." }))
        }
        AdminCommand::Withdrawals => {
            let withdrawals = endpoints::withdrawals(client, &token)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load withdrawals."))?;
            let rows: Vec<Value> = withdrawals
                .iter()
                .map(|w| {
                    json!({
                        "id": w.id,
                        "amount": w.amount.map(format_decimal),
                        "status": w.status,
                        "tone": StatusTone::of(w.status.as_deref()),
                        "referenceId": w.reference_id,
                        "date": format_date(w.created_at.as_ref()),
                    })
                })
                .collect();
            Ok(json!({ "withdrawals": rows }))
        }
        AdminCommand::ProcessWithdrawal {
            id,
            status,
            reference,
            note,
        } => {
            let id = require(&id, "Withdrawal ID is required.")?;
            let status = status_arg(&status)?;
            endpoints::process_withdrawal(
                client,
                &token,
                id,
                &status,
                reference.as_deref(),
                note.as_deref(),
            )
            .await
            .map_err(|e| ctx.api_failure(e, "Unable to process withdrawal."))?;
            info!(withdrawal_id = id, %status, "withdrawal processed");
            Ok(json!({ "id": id, "status": status, "message": "Withdrawal updated." }))
        }
        AdminCommand::CampaignStatus { id, status } => {
            let status = status_arg(&status)?;
            endpoints::update_campaign_status(client, &token, &id, &status)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to update campaign status."))?;
            Ok(json!({ "id": id, "status": status, "message": "Campaign status updated." }))
        }
        AdminCommand::Credit {
            vendor,
            amount,
            description,
        } => {
            let vendor = require(&vendor, "Select a vendor.")?;
            let amount = validate_amount(&amount, "credit")?;
            endpoints::credit_vendor_wallet(client, &token, vendor, amount, description.as_deref())
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to credit wallet."))?;
            info!(vendor_id = vendor, amount, "vendor wallet credited");
            Ok(json!({
                "vendorId": vendor,
                "amount": format_decimal(amount),
                "message": "Wallet credited.",
            }))
        }
        AdminCommand::BrandPrice { brand, price } => {
            let brand = require(&brand, "Select a brand.")?;
            let price = validate_qr_price(&price)?;
            endpoints::update_brand_price(client, &token, brand, price)
                .await
                .map_err(|e| ctx.api_failure(e, "Failed to update brand."))?;
            Ok(json!({
                "brandId": brand,
                "qrPricePerUnit": price,
                "message": "Brand details updated successfully.",
            }))
        }
        AdminCommand::Subscriptions { status } => {
            let status = status.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
            let subscriptions = endpoints::subscriptions(client, &token, &[("status", status)])
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load subscriptions."))?;
            let rows: Vec<Value> = subscriptions
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "vendor": s.vendor.as_ref().and_then(|v| v.business_name.clone()),
                        "plan": s.plan,
                        "status": s.status,
                        "tone": StatusTone::of(s.status.as_deref()),
                        "start": format_date(s.start_date.as_ref()),
                        "expires": format_date(s.end_date.as_ref()),
                    })
                })
                .collect();
            Ok(json!({ "subscriptions": rows }))
        }
        AdminCommand::Notifications => {
            let notifications = endpoints::notifications(client, &token)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load notifications."))?;
            let unread = notifications.iter().filter(|n| n.is_read != Some(true)).count();
            Ok(json!({ "unread": unread, "notifications": notifications }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server;
    use crate::storage;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    async fn signed_in(router: Router, dir: &std::path::Path) -> Context {
        let ctx = crate::commands::test_context(&test_server::spawn(router).await, dir);
        storage::save_token(ctx.store.as_ref(), "tok").unwrap();
        ctx
    }

    fn brand_backend(calls: Arc<AtomicUsize>, seen: Arc<Mutex<Option<Value>>>) -> Router {
        Router::new().route(
            "/api/admin/brands/:id",
            put(move |Path(id): Path<String>, Json(body): Json<Value>| {
                let calls = calls.clone();
                let seen = seen.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    *seen.lock().unwrap() = Some(json!({ "id": id, "body": body }));
                    Json(json!({ "ok": true }))
                }
            }),
        )
    }

    #[tokio::test]
    async fn invalid_brand_price_never_reaches_the_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dir = tempfile::tempdir().unwrap();
        let ctx = signed_in(brand_backend(calls.clone(), Arc::default()), dir.path()).await;

        for bad in ["0", "-2", "101", "abc"] {
            let err = run(
                &ctx,
                AdminCommand::BrandPrice {
                    brand: "b-1".into(),
                    price: bad.into(),
                },
            )
            .await
            .unwrap_err();
            assert_eq!(err.to_string(), "QR price per unit must be between 0.01 and 100.");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn brand_price_puts_the_parsed_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));
        let dir = tempfile::tempdir().unwrap();
        let ctx = signed_in(brand_backend(calls.clone(), seen.clone()), dir.path()).await;

        let out = run(
            &ctx,
            AdminCommand::BrandPrice {
                brand: " b-1 ".into(),
                price: "2.5".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(out["message"], "Brand details updated successfully.");
        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen["id"], "b-1");
        assert_eq!(seen["body"]["qrPricePerUnit"], 2.5);

        // Blank clears the price back to the platform default.
        run(
            &ctx,
            AdminCommand::BrandPrice {
                brand: "b-1".into(),
                price: "".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn withdrawal_and_credit_inputs_are_checked_first() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = signed_in(Router::new(), dir.path()).await;

        let err = run(
            &ctx,
            AdminCommand::ProcessWithdrawal {
                id: "  ".into(),
                status: "processed".into(),
                reference: None,
                note: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Withdrawal ID is required.");

        let err = run(
            &ctx,
            AdminCommand::Credit {
                vendor: "v-1".into(),
                amount: "0".into(),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Enter a valid credit amount.");
    }

    #[tokio::test]
    async fn unauthorized_listing_clears_the_session() {
        let router = Router::new().route(
            "/api/admin/vendors",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "message": "jwt expired" }))) }),
        );
        let dir = tempfile::tempdir().unwrap();
        let ctx = signed_in(router, dir.path()).await;

        let err = run(&ctx, AdminCommand::Vendors { status: None })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Session expired.");
        assert!(storage::load_token(ctx.store.as_ref()).is_none());
    }

    #[tokio::test]
    async fn feeds_report_subscriptions_and_unread_notifications() {
        let router = Router::new()
            .route(
                "/api/admin/subscriptions",
                get(|| async {
                    Json(json!({ "subscriptions": [{
                        "id": "s1",
                        "plan": "yearly",
                        "status": "Expired",
                        "endDate": "2024-01-14",
                        "Vendor": { "businessName": "Acme Foods" }
                    }]}))
                }),
            )
            .route(
                "/api/admin/notifications",
                get(|| async {
                    Json(json!([
                        { "title": "New vendor", "isRead": false },
                        { "title": "Withdrawal", "isRead": true },
                        { "title": "Order" },
                    ]))
                }),
            );
        let dir = tempfile::tempdir().unwrap();
        let ctx = signed_in(router, dir.path()).await;

        let out = run(&ctx, AdminCommand::Subscriptions { status: Some("expired".into()) })
            .await
            .unwrap();
        let row = &out["subscriptions"][0];
        assert_eq!(row["vendor"], "Acme Foods");
        assert_eq!(row["tone"], json!(StatusTone::Negative));
        assert_eq!(row["expires"], "Jan 14, 2024");

        let out = run(&ctx, AdminCommand::Notifications).await.unwrap();
        assert_eq!(out["unread"], 2);
        assert_eq!(out["notifications"].as_array().unwrap().len(), 3);
    }
}
