//! Consumer surface: QR lookup and redemption, and the wallet view of an
//! `otp verify` session.

use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use super::Context;
use crate::endpoints;
use crate::format::{format_date, format_decimal};
use crate::status::QrStatus;
use crate::validation::require;

#[derive(Subcommand, Debug)]
pub enum RedeemCommand {
    /// Public lookup; no sign-in needed.
    Verify { hash: String },
    /// Credit the QR's cashback to the signed-in account.
    Claim { hash: String },
}

pub async fn run(ctx: &Context, action: RedeemCommand) -> anyhow::Result<Value> {
    match action {
        RedeemCommand::Verify { hash } => {
            let hash = require(&hash, "Enter a QR hash to verify.")?;
            let qr = endpoints::verify_public_qr(&ctx.client, hash)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to verify QR."))?;
            let status = QrStatus::classify(qr.status.as_deref());
            Ok(json!({
                "qr": qr,
                "redeemable": status == QrStatus::Active,
            }))
        }
        RedeemCommand::Claim { hash } => {
            let hash = require(&hash, "Enter a QR hash to redeem.")?;
            let token = ctx.token()?;
            let result = endpoints::scan_qr(&ctx.client, &token, hash)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to redeem QR."))?;
            info!(hash, amount = ?result.amount, "QR redeemed");
            let message = result.message.clone().unwrap_or_else(|| match result.amount {
                Some(amount) => format!("INR {} credited to your wallet.", format_decimal(amount)),
                None => "QR redeemed.".to_string(),
            });
            Ok(json!({ "result": result, "message": message }))
        }
    }
}

/// Balance and recent activity of the signed-in consumer.
pub async fn wallet(ctx: &Context) -> anyhow::Result<Value> {
    let token = ctx.token()?;
    let dashboard = endpoints::user_dashboard(&ctx.client, &token)
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to load wallet."))?;
    let balance = dashboard.wallet.as_ref().and_then(|w| w.balance).unwrap_or(0.0);
    let activity: Vec<Value> = dashboard
        .recent_transactions
        .iter()
        .map(|tx| {
            json!({
                "type": tx.kind,
                "amount": tx.amount.map(format_decimal),
                "description": tx.description,
                "counterparty": tx.counterparty(),
                "date": format_date(tx.created_at.as_ref()),
            })
        })
        .collect();
    Ok(json!({ "balance": format_decimal(balance), "recent": activity }))
}
