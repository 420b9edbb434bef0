//! Vendor-side wallet, QR inventory and printed-QR orders. Requires a
//! session from `login --vendor`.

use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use super::Context;
use crate::batches::{query_batches, BatchQuery};
use crate::endpoints;
use crate::format::{format_date, format_decimal};
use crate::status::StatusTone;
use crate::validation::{require, validate_amount, validate_campaign, validate_quantity, CampaignInput};

#[derive(Subcommand, Debug)]
pub enum VendorCommand {
    /// Wallet balance and recent ledger entries.
    Wallet,
    /// Add funds to the wallet.
    Recharge { amount: String },
    /// The vendor's campaigns.
    Campaigns,
    /// Start a new campaign.
    CreateCampaign {
        #[arg(long)]
        title: String,
        /// Cashback per QR, in INR.
        #[arg(long)]
        cashback: String,
        /// YYYY-MM-DD.
        #[arg(long)]
        start: String,
        /// YYYY-MM-DD.
        #[arg(long)]
        end: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        budget: String,
    },
    /// The vendor's QR batches.
    Qrs {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Delete every QR of one campaign at one cashback amount.
    DeleteBatch {
        campaign: String,
        #[arg(long)]
        amount: Option<f64>,
    },
    /// The vendor's printed-QR orders.
    Orders {
        #[arg(long)]
        status: Option<String>,
    },
    /// Order printed QRs for a campaign.
    Order {
        campaign: String,
        quantity: String,
        cashback: String,
    },
    /// Pay for an order from the wallet.
    Pay { id: String },
}

pub async fn run(ctx: &Context, action: VendorCommand) -> anyhow::Result<Value> {
    let token = ctx.token()?;
    let client = &ctx.client;
    match action {
        VendorCommand::Wallet => {
            let wallet = endpoints::wallet(client, &token)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load wallet."))?;
            Ok(json!({ "wallet": wallet }))
        }
        VendorCommand::Recharge { amount } => {
            let amount = validate_amount(&amount, "recharge")?;
            endpoints::recharge_wallet(client, &token, amount)
                .await
                .map_err(|e| ctx.api_failure(e, "Recharge failed."))?;
            info!(amount, "wallet recharged");
            Ok(json!({
                "amount": format_decimal(amount),
                "message": "Wallet recharged successfully.",
            }))
        }
        VendorCommand::Campaigns => {
            let campaigns = endpoints::vendor_campaigns(client, &token)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load campaigns."))?;
            let rows: Vec<Value> = campaigns
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "title": c.title,
                        "cashbackAmount": c.cashback_amount.map(format_decimal),
                        "totalBudget": c.total_budget.map(format_decimal),
                        "status": c.status,
                        "tone": StatusTone::of(c.status.as_deref()),
                        "start": format_date(c.start_date.as_ref()),
                        "end": format_date(c.end_date.as_ref()),
                    })
                })
                .collect();
            Ok(json!({ "campaigns": rows }))
        }
        VendorCommand::CreateCampaign {
            title,
            cashback,
            start,
            end,
            description,
            budget,
        } => {
            let campaign = validate_campaign(&CampaignInput {
                title: &title,
                description: &description,
                cashback_amount: &cashback,
                start_date: &start,
                end_date: &end,
                total_budget: &budget,
            })?;
            let created = endpoints::create_vendor_campaign(client, &token, &campaign)
                .await
                .map_err(|e| ctx.api_failure(e, "Campaign creation failed."))?;
            info!(campaign_id = ?created.id, title = %campaign.title, "campaign created");
            Ok(json!({ "campaign": created, "message": "Campaign created." }))
        }
        VendorCommand::Qrs { search, page } => {
            let records = endpoints::vendor_qrs(client, &token, &[])
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load QR codes."))?;
            let query = BatchQuery {
                search,
                page,
                ..Default::default()
            };
            Ok(json!({ "batches": query_batches(&records, &query) }))
        }
        VendorCommand::DeleteBatch { campaign, amount } => {
            let campaign = require(&campaign, "Enter a campaign ID.")?;
            let result = endpoints::delete_qr_batch(client, &token, campaign, amount)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to delete QR batch."))?;
            info!(campaign_id = campaign, amount = ?amount, "QR batch deleted");
            Ok(json!({ "result": result, "message": "QR batch deleted." }))
        }
        VendorCommand::Orders { status } => {
            let orders = endpoints::vendor_orders(client, &token, &[("status", status)])
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load orders."))?;
            Ok(json!({ "orders": orders }))
        }
        VendorCommand::Order {
            campaign,
            quantity,
            cashback,
        } => {
            let campaign = require(&campaign, "Enter a campaign ID.")?;
            let quantity = validate_quantity(&quantity)?;
            let cashback = validate_amount(&cashback, "cashback")?;
            let order = endpoints::create_order(client, &token, campaign, quantity, cashback)
                .await
                .map_err(|e| ctx.api_failure(e, "QR order failed."))?;
            info!(campaign_id = campaign, quantity, "QR order placed");
            Ok(json!({ "order": order, "message": "Order placed." }))
        }
        VendorCommand::Pay { id } => {
            let id = require(&id, "Select an order.")?;
            let result = endpoints::pay_order(client, &token, id)
                .await
                .map_err(|e| ctx.api_failure(e, "Payment failed."))?;
            Ok(json!({ "result": result, "message": "Order paid." }))
        }
    }
}
