use anyhow::{anyhow, bail};
use chrono::Local;
use clap::Subcommand;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::warn;

use super::{orders, Context};
use crate::batches::group_batches;
use crate::endpoints;
use crate::format::format_decimal;
use crate::models::QrRecord;
use crate::qr_pdf::{export_qr_pdf, file_component, ExportHeader, GridPreset};
use crate::qr_render::{render_batch, render_png, RenderOptions};
use crate::status::OrderStatus;
use crate::validation::require;

#[derive(Subcommand, Debug)]
pub enum ExportCommand {
    /// Every QR printed for one order.
    Order {
        id: String,
        /// label-sheet or detail-card.
        #[arg(long, default_value = "label-sheet")]
        preset: String,
        /// Output directory (defaults to <data dir>/exports).
        #[arg(long)]
        out: Option<PathBuf>,
        /// Open the PDF once written.
        #[arg(long)]
        open: bool,
    },
    /// Every QR of one campaign at one cashback amount.
    Batch {
        campaign: String,
        amount: f64,
        #[arg(long, default_value = "label-sheet")]
        preset: String,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum QrCommand {
    /// Write one QR as a PNG image.
    Png {
        hash: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_preset(raw: &str) -> anyhow::Result<GridPreset> {
    GridPreset::parse(raw)
        .ok_or_else(|| anyhow!("Unknown preset `{raw}`. Use label-sheet or detail-card."))
}

pub async fn run(ctx: &Context, target: ExportCommand) -> anyhow::Result<Value> {
    let token = ctx.token()?;
    let (records, header, preset, out, open) = match target {
        ExportCommand::Order {
            id,
            preset,
            out,
            open,
        } => {
            let preset = parse_preset(&preset)?;
            let order = orders::find_order(ctx, &token, &id).await?;
            let status = OrderStatus::parse(order.status.as_deref());
            if !status.is_export_eligible() {
                bail!("Order {id} is {} and has no printable QRs yet.", status.as_str());
            }
            let records = endpoints::qr_batch(&ctx.client, &token, &[("orderId", Some(id))])
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load QR batch."))?;
            (records, ExportHeader::Order(order), preset, out, open)
        }
        ExportCommand::Batch {
            campaign,
            amount,
            preset,
            out,
            open,
        } => {
            let preset = parse_preset(&preset)?;
            let params = [
                ("campaignId", Some(campaign)),
                ("cashbackAmount", Some(format_decimal(amount))),
            ];
            let records = endpoints::qr_batch(&ctx.client, &token, &params)
                .await
                .map_err(|e| ctx.api_failure(e, "Unable to load QR batch."))?;
            let Some(summary) = group_batches(&records).into_iter().next() else {
                bail!("No QRs found.");
            };
            (records, ExportHeader::Batch(summary), preset, out, open)
        }
    };

    write_pdf(ctx, &records, &header, preset, out, open).await
}

async fn write_pdf(
    ctx: &Context,
    records: &[QrRecord],
    header: &ExportHeader,
    preset: GridPreset,
    out: Option<PathBuf>,
    open: bool,
) -> anyhow::Result<Value> {
    let hashes: Vec<String> = records.iter().map(|r| r.unique_hash.clone()).collect();
    let bitmaps = render_batch(&hashes, &ctx.config, RenderOptions::default()).await;
    let outcome = export_qr_pdf(
        records,
        header,
        preset,
        &bitmaps,
        &ctx.export_dir(out),
        Local::now(),
    )?;

    if open {
        if let Err(e) = webbrowser::open(&outcome.path.to_string_lossy()) {
            warn!(path = %outcome.path.display(), error = %e, "failed to open exported PDF");
        }
    }
    Ok(json!({ "export": outcome, "failed": bitmaps.failed() }))
}

pub fn run_qr(ctx: &Context, action: QrCommand) -> anyhow::Result<Value> {
    match action {
        QrCommand::Png { hash, out } => {
            let hash = require(&hash, "Enter a QR hash.")?.to_string();
            let path = out.unwrap_or_else(|| {
                let name = format!("qr-{}.png", file_component(&hash));
                ctx.config.export_dir().join(name)
            });
            render_png(&hash, &ctx.config, RenderOptions::default(), &path)?;
            Ok(json!({
                "path": path,
                "value": ctx.config.qr_value(&hash),
            }))
        }
    }
}
