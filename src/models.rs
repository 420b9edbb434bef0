//! Backend entities as returned by the cashback REST API.
//!
//! All of these are owned by the backend; the client only holds transient
//! copies. Deserialization is deliberately lenient: decimals arrive as
//! numbers or numeric strings depending on the endpoint, nested relations are
//! frequently absent, and `createdAt` is kept raw so that malformed
//! timestamps survive parsing and are skipped by the aggregators instead of
//! failing the whole response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept `12.5`, `"12.50"`, `null` or a missing field.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Accept `25`, `"25"` or `null` for counts.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

/// Accept `"abc"`, `42` or `null` for identifiers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrandRef {
    pub name: Option<String>,
    #[serde(rename = "Vendor", alias = "vendor")]
    pub vendor: Option<Box<VendorRef>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorRef {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub business_name: Option<String>,
    #[serde(rename = "Brand", alias = "brand")]
    pub brand: Option<Box<BrandRef>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignRef {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "Brand", alias = "brand")]
    pub brand: Option<BrandRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletRef {
    #[serde(rename = "Vendor", alias = "vendor")]
    pub vendor: Option<VendorRef>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A wallet ledger entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<Value>,
    #[serde(rename = "Wallet", alias = "wallet")]
    pub wallet: Option<WalletRef>,
}

impl Transaction {
    /// Brand or vendor label for list output.
    pub fn counterparty(&self) -> Option<String> {
        let vendor = self.wallet.as_ref()?.vendor.as_ref()?;
        vendor
            .brand
            .as_ref()
            .and_then(|b| b.name.clone())
            .or_else(|| vendor.business_name.clone())
    }
}

/// A single redeemable QR code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrRecord {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub unique_hash: String,
    #[serde(deserialize_with = "lenient_decimal")]
    pub cashback_amount: Option<f64>,
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub campaign_id: Option<String>,
    #[serde(rename = "Campaign", alias = "campaign")]
    pub campaign: Option<CampaignRef>,
    pub created_at: Option<Value>,
}

impl QrRecord {
    pub fn campaign_title(&self) -> Option<&str> {
        self.campaign.as_ref()?.title.as_deref()
    }

    pub fn brand_name(&self) -> Option<&str> {
        self.campaign.as_ref()?.brand.as_ref()?.name.as_deref()
    }

    /// Vendor business name, falling back to the vendor id.
    pub fn vendor_label(&self) -> Option<String> {
        let vendor = self.campaign.as_ref()?.brand.as_ref()?.vendor.as_ref()?;
        vendor.business_name.clone().or_else(|| vendor.id.clone())
    }

    /// Campaign id from the record itself or from the embedded campaign.
    pub fn resolved_campaign_id(&self) -> Option<&str> {
        self.campaign_id
            .as_deref()
            .or_else(|| self.campaign.as_ref()?.id.as_deref())
    }
}

/// A vendor's printed-QR order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub campaign_id: Option<String>,
    pub campaign_title: Option<String>,
    pub brand_name: Option<String>,
    pub vendor_name: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    pub quantity: Option<u64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub cashback_amount: Option<f64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub print_cost: Option<f64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_amount: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<Value>,
}

impl Order {
    /// Print cost divided across the ordered quantity; 0 when unknown.
    pub fn per_qr_price(&self) -> f64 {
        match (self.print_cost, self.quantity) {
            (Some(cost), Some(qty)) if qty > 0 => {
                let per = cost / qty as f64;
                if per.is_finite() && per > 0.0 {
                    per
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRef {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vendor {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub business_name: Option<String>,
    pub contact_phone: Option<String>,
    pub gstin: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "User", alias = "user")]
    pub user: Option<UserRef>,
    pub created_at: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Withdrawal {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub reference_id: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: Option<Value>,
}

/// `/api/auth/me` and the profile part of a login response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginResponse {
    pub token: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl LoginResponse {
    pub fn profile(&self) -> Profile {
        Profile {
            id: None,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// Headline counters from `/api/admin/dashboard`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    #[serde(deserialize_with = "lenient_count")]
    pub users: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub vendors: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub active_campaigns: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub total_transactions: Option<u64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_credit: Option<f64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_debit: Option<f64>,
}

impl DashboardStats {
    /// Platform balance: total credit minus total debit.
    pub fn balance(&self) -> f64 {
        self.total_credit.unwrap_or(0.0) - self.total_debit.unwrap_or(0.0)
    }
}

/// Public QR lookup used by the redemption route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrVerification {
    pub unique_hash: Option<String>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub cashback_amount: Option<f64>,
    pub status: Option<String>,
    #[serde(rename = "Campaign", alias = "campaign")]
    pub campaign: Option<CampaignRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedeemResult {
    pub message: Option<String>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub amount: Option<f64>,
}

/// Consumer wallet view from `/api/user/dashboard`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDashboard {
    pub wallet: Option<WalletBalance>,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletBalance {
    #[serde(deserialize_with = "lenient_decimal")]
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Campaign {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub cashback_amount: Option<f64>,
    #[serde(deserialize_with = "lenient_decimal")]
    pub total_budget: Option<f64>,
    pub status: Option<String>,
    pub start_date: Option<Value>,
    pub end_date: Option<Value>,
    pub created_at: Option<Value>,
}

/// Body of a new campaign. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub title: String,
    pub description: Option<String>,
    pub cashback_amount: f64,
    pub start_date: String,
    pub end_date: String,
    pub total_budget: Option<f64>,
}

/// A vendor's platform subscription.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub plan: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<Value>,
    pub end_date: Option<Value>,
    #[serde(rename = "Vendor", alias = "vendor")]
    pub vendor: Option<VendorRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Notification {
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(alias = "read")]
    pub is_read: Option<bool>,
    pub created_at: Option<Value>,
}
