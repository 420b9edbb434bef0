//! Admin dashboard state.
//!
//! Each data set is a [`Section`] with its own loading flag and error, so
//! one failing endpoint never hides the others. All mutations go through
//! [`DashboardState::reduce`].

use serde::Serialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::api::{ApiClient, ApiError};
use crate::auth::{classify_failure, Failure, SessionEvent, SessionState};
use crate::endpoints;
use crate::models::{DashboardStats, Order, QrRecord, Transaction, User, Vendor, Withdrawal};
use crate::status::normalize_status;
use crate::storage::{self, SecureStore};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Section<T> {
    pub items: T,
    pub error: Option<String>,
    pub loading: bool,
}

impl<T: Default> Section<T> {
    fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn load(&mut self, items: T) {
        self.items = items;
        self.loading = false;
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Stats,
    Users,
    Vendors,
    Transactions,
    Qrs,
    Withdrawals,
    Orders,
}

impl SectionKind {
    pub const ALL: [SectionKind; 7] = [
        SectionKind::Stats,
        SectionKind::Users,
        SectionKind::Vendors,
        SectionKind::Transactions,
        SectionKind::Qrs,
        SectionKind::Withdrawals,
        SectionKind::Orders,
    ];

    fn fallback_message(self) -> &'static str {
        match self {
            SectionKind::Stats => "Unable to load dashboard stats.",
            SectionKind::Users => "Unable to load users.",
            SectionKind::Vendors => "Unable to load vendors.",
            SectionKind::Transactions => "Unable to load transactions.",
            SectionKind::Qrs => "Unable to load QR codes.",
            SectionKind::Withdrawals => "Unable to load withdrawals.",
            SectionKind::Orders => "Unable to load orders.",
        }
    }
}

#[derive(Debug)]
pub enum DashboardAction {
    Started(SectionKind),
    StatsLoaded(DashboardStats),
    UsersLoaded(Vec<User>),
    VendorsLoaded(Vec<Vendor>),
    TransactionsLoaded(Vec<Transaction>),
    QrsLoaded(Vec<QrRecord>),
    WithdrawalsLoaded(Vec<Withdrawal>),
    OrdersLoaded(Vec<Order>),
    Failed { section: SectionKind, message: String },
    SessionExpired,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    #[serde(skip)]
    pub session: SessionState,
    pub stats: Section<Option<DashboardStats>>,
    pub users: Section<Vec<User>>,
    pub vendors: Section<Vec<Vendor>>,
    pub transactions: Section<Vec<Transaction>>,
    pub qrs: Section<Vec<QrRecord>>,
    pub withdrawals: Section<Vec<Withdrawal>>,
    pub orders: Section<Vec<Order>>,
}

impl DashboardState {
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            ..Default::default()
        }
    }

    pub fn reduce(&mut self, action: DashboardAction) {
        match action {
            DashboardAction::Started(kind) => match kind {
                SectionKind::Stats => self.stats.start(),
                SectionKind::Users => self.users.start(),
                SectionKind::Vendors => self.vendors.start(),
                SectionKind::Transactions => self.transactions.start(),
                SectionKind::Qrs => self.qrs.start(),
                SectionKind::Withdrawals => self.withdrawals.start(),
                SectionKind::Orders => self.orders.start(),
            },
            DashboardAction::StatsLoaded(stats) => self.stats.load(Some(stats)),
            DashboardAction::UsersLoaded(items) => self.users.load(items),
            DashboardAction::VendorsLoaded(items) => self.vendors.load(items),
            DashboardAction::TransactionsLoaded(items) => self.transactions.load(items),
            DashboardAction::QrsLoaded(items) => self.qrs.load(items),
            DashboardAction::WithdrawalsLoaded(items) => self.withdrawals.load(items),
            DashboardAction::OrdersLoaded(items) => self.orders.load(items),
            DashboardAction::Failed { section, message } => match section {
                SectionKind::Stats => self.stats.fail(message),
                SectionKind::Users => self.users.fail(message),
                SectionKind::Vendors => self.vendors.fail(message),
                SectionKind::Transactions => self.transactions.fail(message),
                SectionKind::Qrs => self.qrs.fail(message),
                SectionKind::Withdrawals => self.withdrawals.fail(message),
                SectionKind::Orders => self.orders.fail(message),
            },
            DashboardAction::SessionExpired => {
                // Drop the session and every derived data set.
                let session = std::mem::take(&mut self.session).apply(SessionEvent::Expired);
                *self = DashboardState::new(session);
            }
        }
    }

    pub fn pending_withdrawal_count(&self) -> usize {
        self.withdrawals
            .items
            .iter()
            .filter(|w| normalize_status(w.status.as_deref()) == "pending")
            .count()
    }
}

fn outcome<T>(
    kind: SectionKind,
    result: Result<T, ApiError>,
    loaded: impl FnOnce(T) -> DashboardAction,
) -> DashboardAction {
    match result {
        Ok(items) => loaded(items),
        Err(e) => match classify_failure(&e, kind.fallback_message()) {
            Failure::SessionExpired => DashboardAction::SessionExpired,
            Failure::Message(message) => DashboardAction::Failed {
                section: kind,
                message,
            },
        },
    }
}

/// Load every section concurrently. Each load settles on its own; a 401 in
/// any of them ends the session and clears the stored token.
pub async fn load_all(client: &ApiClient, store: &dyn SecureStore, state: &mut DashboardState) {
    let Some(token) = state.session.token().map(|t| Zeroizing::new(t.to_string())) else {
        return;
    };
    for kind in SectionKind::ALL {
        state.reduce(DashboardAction::Started(kind));
    }

    let token = token.as_str();
    let (stats, users, vendors, transactions, qrs, withdrawals, orders) = tokio::join!(
        endpoints::dashboard(client, token),
        endpoints::users(client, token),
        endpoints::vendors(client, token, &[]),
        endpoints::transactions(client, token, &[]),
        endpoints::qrs(client, token, &[]),
        endpoints::withdrawals(client, token),
        endpoints::orders(client, token, &[]),
    );

    let actions = [
        outcome(SectionKind::Stats, stats, DashboardAction::StatsLoaded),
        outcome(SectionKind::Users, users, DashboardAction::UsersLoaded),
        outcome(SectionKind::Vendors, vendors, DashboardAction::VendorsLoaded),
        outcome(
            SectionKind::Transactions,
            transactions,
            DashboardAction::TransactionsLoaded,
        ),
        outcome(SectionKind::Qrs, qrs, DashboardAction::QrsLoaded),
        outcome(
            SectionKind::Withdrawals,
            withdrawals,
            DashboardAction::WithdrawalsLoaded,
        ),
        outcome(SectionKind::Orders, orders, DashboardAction::OrdersLoaded),
    ];

    let mut expired = false;
    for action in actions {
        if let DashboardAction::Failed { section, message } = &action {
            warn!(section = ?section, error = %message, "dashboard section failed");
        }
        match action {
            DashboardAction::SessionExpired => expired = true,
            other => state.reduce(other),
        }
    }

    if expired {
        storage::clear_token(store);
        state.reduce(DashboardAction::SessionExpired);
    } else {
        debug!(
            users = state.users.items.len(),
            vendors = state.vendors.items.len(),
            transactions = state.transactions.items.len(),
            qrs = state.qrs.items.len(),
            "dashboard loaded"
        );
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn matches_any(fields: &[Option<&str>], needle: &str) -> bool {
    fields
        .iter()
        .flatten()
        .any(|f| f.to_lowercase().contains(needle))
}

/// Case-insensitive match on name, email or phone. Blank query keeps all.
pub fn search_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let needle = query.trim().to_lowercase();
    users
        .iter()
        .filter(|u| {
            needle.is_empty()
                || matches_any(
                    &[
                        u.name.as_deref(),
                        u.email.as_deref(),
                        u.phone_number.as_deref(),
                    ],
                    &needle,
                )
        })
        .collect()
}

/// Case-insensitive match on business name, owner email, phone or GSTIN.
pub fn search_vendors<'a>(vendors: &'a [Vendor], query: &str) -> Vec<&'a Vendor> {
    let needle = query.trim().to_lowercase();
    vendors
        .iter()
        .filter(|v| {
            needle.is_empty()
                || matches_any(
                    &[
                        v.business_name.as_deref(),
                        v.user.as_ref().and_then(|u| u.email.as_deref()),
                        v.contact_phone.as_deref(),
                        v.gstin.as_deref(),
                    ],
                    &needle,
                )
        })
        .collect()
}
