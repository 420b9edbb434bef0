//! Input checks run before a request is sent.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::NewCampaign;

/// Highest per-QR print price an admin may set, in INR.
pub const MAX_QR_PRICE: f64 = 100.0;

/// Inline message shown next to the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Per-QR price; blank means "leave unchanged".
pub fn validate_qr_price(raw: &str) -> Result<Option<f64>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 && v <= MAX_QR_PRICE => Ok(Some(v)),
        _ => Err(ValidationError::new(format!(
            "QR price per unit must be between 0.01 and {MAX_QR_PRICE}."
        ))),
    }
}

pub fn validate_quantity(raw: &str) -> Result<u32, ValidationError> {
    match raw.trim().parse::<u32>() {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(ValidationError::new("Enter a valid quantity.")),
    }
}

/// Positive finite decimal. `purpose` names the amount in the message,
/// e.g. "recharge" gives "Enter a valid recharge amount.".
pub fn validate_amount(raw: &str, purpose: &str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ValidationError::new(format!(
            "Enter a valid {purpose} amount."
        ))),
    }
}

/// Trimmed non-empty text, else `message`.
pub fn require<'a>(value: &'a str, message: &str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::new(message))
    } else {
        Ok(value)
    }
}

/// Raw campaign form fields as typed by the vendor.
#[derive(Debug, Clone, Default)]
pub struct CampaignInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub cashback_amount: &'a str,
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub total_budget: &'a str,
}

fn campaign_date(raw: &str) -> Result<String, ValidationError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| ValidationError::new("Dates must be in YYYY-MM-DD format."))
}

/// Check a new campaign in form order and build its request body.
pub fn validate_campaign(input: &CampaignInput<'_>) -> Result<NewCampaign, ValidationError> {
    let title = require(input.title, "Campaign title is required.")?;
    let cashback_amount = validate_amount(input.cashback_amount, "cashback")?;
    let start = input.start_date.trim();
    let end = input.end_date.trim();
    if start.is_empty() || end.is_empty() {
        return Err(ValidationError::new("Start and end dates are required."));
    }
    let (start_date, end_date) = (campaign_date(start)?, campaign_date(end)?);
    let total_budget = match input.total_budget.trim() {
        "" => None,
        raw => Some(validate_amount(raw, "total budget").map_err(|_| {
            ValidationError::new("Enter a valid total budget or leave it empty.")
        })?),
    };
    let description = input.description.trim();
    Ok(NewCampaign {
        title: title.to_string(),
        description: (!description.is_empty()).then(|| description.to_string()),
        cashback_amount,
        start_date,
        end_date,
        total_budget,
    })
}
