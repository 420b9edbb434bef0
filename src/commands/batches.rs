use anyhow::bail;
use serde_json::{json, Value};

use super::Context;
use crate::batches::{query_batches, BatchQuery, BatchSort};
use crate::endpoints;

pub async fn run(
    ctx: &Context,
    search: String,
    sort: &str,
    page: usize,
    per_page: usize,
) -> anyhow::Result<Value> {
    let Some(sort) = BatchSort::parse(sort) else {
        bail!("Unknown sort `{sort}`. Use recent, quantity, active, cashback or oldest.");
    };
    let token = ctx.token()?;
    let records = endpoints::qrs(&ctx.client, &token, &[])
        .await
        .map_err(|e| ctx.api_failure(e, "Unable to load QR codes."))?;

    let query = BatchQuery {
        search,
        sort,
        page,
        per_page,
    };
    let page = query_batches(&records, &query);
    Ok(json!({ "batches": page }))
}
