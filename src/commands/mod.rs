//! Command-line surface.
//!
//! Every subcommand returns a JSON value that `run` pretty-prints on stdout.
//! Backend failures are funnelled through [`Context::api_failure`], which
//! ends the session on 401 so the next invocation starts signed out.

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;
use zeroize::Zeroizing;

use crate::api::{ApiClient, ApiError};
use crate::auth::{classify_failure, Failure, NOTICE_EXPIRED};
use crate::config::AppConfig;
use crate::storage::{self, KeyringStore, MemoryStore, SecureStore};

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod batches;
pub mod export;
pub mod orders;
pub mod redeem;
pub mod vendor;

#[derive(Parser, Debug)]
#[command(name = "cashback-console", version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides CASHBACK_API_BASE_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Base URL encoded into printed QRs (overrides CASHBACK_QR_BASE_URL).
    #[arg(long, global = true)]
    pub qr_base_url: Option<String>,

    /// Keep the session in memory only.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password (admin unless --vendor).
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CASHBACK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        vendor: bool,
    },
    /// Phone sign-in for customers.
    Otp {
        #[command(subcommand)]
        action: auth::OtpCommand,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in profile.
    Whoami {
        #[arg(long)]
        vendor: bool,
    },
    /// Load every dashboard section.
    Dashboard {
        /// Filter users by name, email or phone.
        #[arg(long)]
        users: Option<String>,
        /// Filter vendors by business name, email, phone or GSTIN.
        #[arg(long)]
        vendors: Option<String>,
    },
    /// Day-bucketed transaction, user and QR series.
    Analytics {
        /// 7, 30 or 90 days.
        #[arg(long, default_value_t = 30)]
        range: u32,
        #[arg(long, default_value = "net-flow")]
        metric: String,
    },
    /// QR batches grouped by campaign and cashback amount.
    Batches {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "recent")]
        sort: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        per_page: usize,
    },
    /// Printed-QR orders.
    Orders {
        #[command(subcommand)]
        action: orders::OrdersCommand,
    },
    /// Write a printable QR PDF.
    Export {
        #[command(subcommand)]
        target: export::ExportCommand,
    },
    /// Single QR images.
    Qr {
        #[command(subcommand)]
        action: export::QrCommand,
    },
    /// Admin moderation actions.
    Admin {
        #[command(subcommand)]
        action: admin::AdminCommand,
    },
    /// Vendor wallet, QRs and orders.
    Vendor {
        #[command(subcommand)]
        action: vendor::VendorCommand,
    },
    /// Consumer wallet balance and recent activity.
    Wallet,
    /// Look up or claim a QR.
    Redeem {
        #[command(subcommand)]
        action: redeem::RedeemCommand,
    },
    /// Persisted sidebar preference.
    Sidebar {
        #[command(subcommand)]
        action: auth::SidebarCommand,
    },
}

/// Shared state for one invocation.
pub struct Context {
    pub config: AppConfig,
    pub client: ApiClient,
    pub store: Box<dyn SecureStore>,
}

impl Context {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = AppConfig::resolve(cli.api_url.as_deref(), cli.qr_base_url.as_deref());
        let client = ApiClient::new(&config.api_base_url)?;
        let store: Box<dyn SecureStore> = if cli.ephemeral {
            Box::new(MemoryStore::default())
        } else {
            Box::new(KeyringStore::default())
        };
        Ok(Self {
            config,
            client,
            store,
        })
    }

    /// Stored bearer token, or an error telling the user to sign in.
    pub fn token(&self) -> anyhow::Result<Zeroizing<String>> {
        match storage::load_token(self.store.as_ref()) {
            Some(token) => Ok(Zeroizing::new(token)),
            None => bail!("Not signed in. Run `cashback-console login` first."),
        }
    }

    /// Turn a backend error into the user-facing one, expiring the session
    /// on 401.
    pub fn api_failure(&self, err: ApiError, fallback: &str) -> anyhow::Error {
        if let Some(status) = err.status() {
            debug!(status, body = %err.data(), "backend rejected request");
        }
        match classify_failure(&err, fallback) {
            Failure::SessionExpired => self.session_expired(),
            Failure::Message(message) => anyhow!(message),
        }
    }

    /// Clear the stored session; the returned error carries the notice.
    pub fn session_expired(&self) -> anyhow::Error {
        let state = crate::auth::expire(self.store.as_ref());
        anyhow!(state.notice().unwrap_or(NOTICE_EXPIRED).to_string())
    }

    pub fn export_dir(&self, out: Option<PathBuf>) -> PathBuf {
        out.unwrap_or_else(|| self.config.export_dir())
    }
}

pub async fn dispatch(ctx: &Context, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Login {
            email,
            password,
            vendor,
        } => {
            let password = Zeroizing::new(password);
            auth::login(ctx, &email, &password, auth::role(vendor)).await
        }
        Command::Otp { action } => auth::otp(ctx, action).await,
        Command::Logout => Ok(auth::logout(ctx)),
        Command::Whoami { vendor } => auth::whoami(ctx, auth::role(vendor)).await,
        Command::Dashboard { users, vendors } => {
            auth::dashboard(ctx, users.as_deref(), vendors.as_deref()).await
        }
        Command::Analytics { range, metric } => analytics::run(ctx, range, &metric).await,
        Command::Batches {
            search,
            sort,
            page,
            per_page,
        } => batches::run(ctx, search, &sort, page, per_page).await,
        Command::Orders { action } => orders::run(ctx, action).await,
        Command::Export { target } => export::run(ctx, target).await,
        Command::Qr { action } => export::run_qr(ctx, action),
        Command::Admin { action } => admin::run(ctx, action).await,
        Command::Vendor { action } => vendor::run(ctx, action).await,
        Command::Wallet => redeem::wallet(ctx).await,
        Command::Redeem { action } => redeem::run(ctx, action).await,
        Command::Sidebar { action } => auth::sidebar(ctx, action),
    }
}

/// Signed-out context against a test backend with an in-memory store.
#[cfg(test)]
pub(crate) fn test_context(api_base_url: &str, data_dir: &std::path::Path) -> Context {
    let config = AppConfig {
        api_base_url: api_base_url.to_string(),
        qr_base_url: "https://qr.test".into(),
        data_dir: data_dir.to_path_buf(),
    };
    Context {
        client: ApiClient::new(&config.api_base_url).expect("test client"),
        config,
        store: Box::new(MemoryStore::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "cashback-console",
            "--ephemeral",
            "export",
            "order",
            "ord-1",
            "--preset",
            "detail-card",
        ])
        .expect("export order should parse");
        assert!(cli.ephemeral);
        assert!(matches!(cli.command, Command::Export { .. }));

        let cli = Cli::try_parse_from(["cashback-console", "analytics", "--range", "7"])
            .expect("analytics should parse");
        match cli.command {
            Command::Analytics { range, metric } => {
                assert_eq!(range, 7);
                assert_eq!(metric, "net-flow");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unauthorized_failure_clears_token() {
        let cli = Cli::try_parse_from(["cashback-console", "--ephemeral", "whoami"]).unwrap();
        assert!(matches!(cli.command, Command::Whoami { vendor: false }));
        let ctx = Context::new(&cli).unwrap();
        storage::save_token(ctx.store.as_ref(), "tok").unwrap();

        let err = ctx.api_failure(
            ApiError::Status {
                status: 401,
                message: "jwt expired".into(),
                data: Value::Null,
            },
            "fallback",
        );
        assert_eq!(err.to_string(), "Session expired.");
        assert!(ctx.token().is_err());
    }
}
