use anyhow::anyhow;
use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use super::Context;
use crate::auth::{self, Role};
use crate::dashboard::{self, DashboardState};
use crate::endpoints;
use crate::format::{format_date, format_decimal};
use crate::storage;
use crate::validation::require;

const RECENT_TRANSACTIONS: usize = 5;

#[derive(Subcommand, Debug)]
pub enum OtpCommand {
    /// Text a one-time code to the phone number.
    Send { phone: String },
    /// Exchange the code for a session.
    Verify { phone: String, otp: String },
}

#[derive(Subcommand, Debug)]
pub enum SidebarCommand {
    Collapse,
    Expand,
    Show,
}

pub fn role(vendor: bool) -> Role {
    if vendor {
        Role::Vendor
    } else {
        Role::Admin
    }
}

pub async fn login(ctx: &Context, email: &str, password: &str, role: Role) -> anyhow::Result<Value> {
    let state = auth::sign_in(&ctx.client, ctx.store.as_ref(), email, password, role)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(json!({
        "status": "Signed in successfully.",
        "profile": state.profile(),
    }))
}

pub fn logout(ctx: &Context) -> Value {
    let state = auth::sign_out(ctx.store.as_ref());
    json!({ "status": state.notice() })
}

pub async fn otp(ctx: &Context, action: OtpCommand) -> anyhow::Result<Value> {
    match action {
        OtpCommand::Send { phone } => {
            let phone = require(&phone, "Enter your phone number.")?;
            endpoints::send_otp(&ctx.client, phone)
                .await
                .map_err(|e| ctx.api_failure(e, "Failed to send OTP."))?;
            Ok(json!({ "status": "OTP sent." }))
        }
        OtpCommand::Verify { phone, otp } => {
            let phone = require(&phone, "Enter your phone number.")?;
            let otp = require(&otp, "Enter the OTP.")?;
            let login = endpoints::verify_otp(&ctx.client, phone, otp)
                .await
                .map_err(|e| ctx.api_failure(e, "Invalid OTP."))?;
            if login.token.trim().is_empty() {
                return Err(anyhow!("Invalid OTP."));
            }
            storage::save_token(ctx.store.as_ref(), login.token.trim())?;
            Ok(json!({
                "status": "Signed in successfully.",
                "profile": login.profile(),
            }))
        }
    }
}

pub async fn whoami(ctx: &Context, role: Role) -> anyhow::Result<Value> {
    let state = auth::restore(&ctx.client, ctx.store.as_ref(), role)
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to load admin profile."))?;
    match state.profile() {
        Some(profile) => Ok(json!({ "profile": profile })),
        None => Err(anyhow!(state
            .notice()
            .unwrap_or("Not signed in.")
            .to_string())),
    }
}

pub async fn dashboard(
    ctx: &Context,
    user_query: Option<&str>,
    vendor_query: Option<&str>,
) -> anyhow::Result<Value> {
    let session = auth::restore(&ctx.client, ctx.store.as_ref(), Role::Admin)
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to load admin profile."))?;
    if !session.is_signed_in() {
        return Err(anyhow!(session.notice().unwrap_or("Not signed in.").to_string()));
    }

    let mut state = DashboardState::new(session);
    dashboard::load_all(&ctx.client, ctx.store.as_ref(), &mut state).await;
    if let Some(notice) = state.session.notice() {
        return Err(anyhow!(notice.to_string()));
    }

    let users = dashboard::search_users(&state.users.items, user_query.unwrap_or_default());
    let vendors = dashboard::search_vendors(&state.vendors.items, vendor_query.unwrap_or_default());
    let balance = state.stats.items.as_ref().map(|s| s.balance());
    let recent: Vec<Value> = state
        .transactions
        .items
        .iter()
        .take(RECENT_TRANSACTIONS)
        .map(|tx| {
            json!({
                "type": tx.kind,
                "amount": tx.amount.map(format_decimal),
                "counterparty": tx.counterparty(),
                "date": format_date(tx.created_at.as_ref()),
            })
        })
        .collect();
    info!(
        users = users.len(),
        vendors = vendors.len(),
        "dashboard loaded"
    );

    Ok(json!({
        "stats": state.stats,
        "balance": balance,
        "users": { "items": users, "error": state.users.error },
        "vendors": { "items": vendors, "error": state.vendors.error },
        "transactions": {
            "count": state.transactions.items.len(),
            "recent": recent,
            "error": state.transactions.error,
        },
        "qrs": { "count": state.qrs.items.len(), "error": state.qrs.error },
        "withdrawals": {
            "count": state.withdrawals.items.len(),
            "pending": state.pending_withdrawal_count(),
            "error": state.withdrawals.error,
        },
        "orders": { "count": state.orders.items.len(), "error": state.orders.error },
    }))
}

pub fn sidebar(ctx: &Context, action: SidebarCommand) -> anyhow::Result<Value> {
    let store = ctx.store.as_ref();
    match action {
        SidebarCommand::Collapse => storage::set_sidebar_collapsed(store, true)?,
        SidebarCommand::Expand => storage::set_sidebar_collapsed(store, false)?,
        SidebarCommand::Show => {}
    }
    let collapsed = storage::sidebar_collapsed(store);
    Ok(json!({ "sidebar": if collapsed { "collapsed" } else { "expanded" } }))
}
