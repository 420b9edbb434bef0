use anyhow::{anyhow, bail};
use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use super::Context;
use crate::endpoints;
use crate::format::{format_date, format_decimal};
use crate::models::Order;
use crate::status::{OrderAction, OrderStatus, StatusTone};

#[derive(Subcommand, Debug)]
pub enum OrdersCommand {
    /// List orders, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Approve {
        id: String,
    },
    Reject {
        id: String,
    },
    Ship {
        id: String,
    },
}

pub async fn run(ctx: &Context, action: OrdersCommand) -> anyhow::Result<Value> {
    match action {
        OrdersCommand::List { status } => list(ctx, status).await,
        OrdersCommand::Approve { id } => transition(ctx, &id, OrderAction::Approve).await,
        OrdersCommand::Reject { id } => transition(ctx, &id, OrderAction::Reject).await,
        OrdersCommand::Ship { id } => transition(ctx, &id, OrderAction::Ship).await,
    }
}

fn order_row(order: &Order) -> Value {
    let status = OrderStatus::parse(order.status.as_deref());
    json!({
        "id": order.id,
        "campaign": order.campaign_title,
        "brand": order.brand_name,
        "vendor": order.vendor_name,
        "quantity": order.quantity,
        "cashbackAmount": order.cashback_amount.map(format_decimal),
        "date": format_date(order.created_at.as_ref()),
        "status": status.as_str(),
        "tone": StatusTone::of(order.status.as_deref()),
        "actions": status.available_actions(),
        "exportable": status.is_export_eligible(),
    })
}

async fn list(ctx: &Context, status: Option<String>) -> anyhow::Result<Value> {
    let token = ctx.token()?;
    let status = status.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    let orders = endpoints::orders(&ctx.client, &token, &[("status", status)])
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to load orders."))?;
    let rows: Vec<Value> = orders.iter().map(order_row).collect();
    Ok(json!({ "orders": rows }))
}

/// Look an order up by id in the admin order list.
pub(super) async fn find_order(ctx: &Context, token: &str, order_id: &str) -> anyhow::Result<Order> {
    let orders = endpoints::orders(&ctx.client, token, &[])
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to load orders."))?;
    orders
        .into_iter()
        .find(|o| o.id.as_deref() == Some(order_id))
        .ok_or_else(|| anyhow!("Order {order_id} not found."))
}

async fn transition(ctx: &Context, order_id: &str, action: OrderAction) -> anyhow::Result<Value> {
    let token = ctx.token()?;
    let order = find_order(ctx, &token, order_id).await?;
    let status = OrderStatus::parse(order.status.as_deref());
    if !status.allows(action) {
        bail!(
            "Order {order_id} is {} and cannot be {}.",
            status.as_str(),
            action.target_status()
        );
    }

    endpoints::update_order_status(&ctx.client, &token, order_id, action.target_status())
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to update order."))?;
    info!(order_id, status = action.target_status(), "order status updated");
    Ok(json!({
        "id": order_id,
        "status": action.target_status(),
        "message": "Order updated.",
    }))
}
