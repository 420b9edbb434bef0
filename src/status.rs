//! Status classification shared by every view that needs to agree on what
//! "active", "redeemed" or "pending" means.

use serde::Serialize;

/// Lower-cased, trimmed status; missing or blank values become `unknown`.
pub fn normalize_status(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

// ---------------------------------------------------------------------------
// QR status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QrStatus {
    Active,
    Pending,
    Redeemed,
    Blocked,
    Unknown,
}

impl QrStatus {
    /// Backends have used `redeemed`, `used`, `blocked` and `revoked`
    /// interchangeably, so matching is by substring.
    pub fn classify(raw: Option<&str>) -> Self {
        let normalized = normalize_status(raw);
        if normalized.contains("redeem") || normalized.contains("used") {
            QrStatus::Redeemed
        } else if normalized.contains("block") || normalized.contains("revoked") {
            QrStatus::Blocked
        } else if normalized == "pending" {
            QrStatus::Pending
        } else if normalized == "unknown" {
            QrStatus::Unknown
        } else {
            QrStatus::Active
        }
    }

    /// Anything neither redeemed nor blocked still counts as an open QR.
    pub fn counts_as_active(self) -> bool {
        !matches!(self, QrStatus::Redeemed | QrStatus::Blocked)
    }
}

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Approved,
    Rejected,
    Other(String),
}

/// Admin actions offered for an order in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Approve,
    Reject,
    Ship,
}

impl OrderAction {
    /// Status string sent to `PUT /api/admin/orders/:id/status`.
    pub fn target_status(self) -> &'static str {
        match self {
            OrderAction::Approve => "approved",
            OrderAction::Reject => "rejected",
            OrderAction::Ship => "shipped",
        }
    }
}

impl OrderStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match normalize_status(raw).as_str() {
            "pending" => OrderStatus::Pending,
            "paid" => OrderStatus::Paid,
            "shipped" => OrderStatus::Shipped,
            "approved" => OrderStatus::Approved,
            "rejected" => OrderStatus::Rejected,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    pub fn available_actions(&self) -> &'static [OrderAction] {
        match self {
            OrderStatus::Pending => &[OrderAction::Approve, OrderAction::Reject],
            OrderStatus::Paid | OrderStatus::Approved => &[OrderAction::Ship],
            _ => &[],
        }
    }

    pub fn allows(&self, action: OrderAction) -> bool {
        self.available_actions().contains(&action)
    }

    /// Pending orders have no printable QRs yet.
    pub fn is_export_eligible(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Other(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Badge tone
// ---------------------------------------------------------------------------

/// Colour family a status badge is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Positive,
    Attention,
    Muted,
    Negative,
    Neutral,
}

impl StatusTone {
    pub fn of(raw: Option<&str>) -> Self {
        match normalize_status(raw).as_str() {
            "active" | "success" | "processed" | "paid" | "completed" | "shipped" => {
                StatusTone::Positive
            }
            "pending" | "processing" => StatusTone::Attention,
            "paused" | "inactive" => StatusTone::Muted,
            "rejected" | "blocked" | "failed" | "expired" => StatusTone::Negative,
            _ => StatusTone::Neutral,
        }
    }
}
