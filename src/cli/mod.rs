use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use kamehouse_storefront::config::StorefrontConfig;
use kamehouse_storefront::domain::aggregates::UserId;
use kamehouse_storefront::gateway::HttpGateway;
use kamehouse_storefront::services::{CartStore, RenewalOutcome, SessionStore};
use kamehouse_storefront::storage::FileStorage;
use kamehouse_storefront::Result;

mod admin;
mod shop;

#[derive(Debug, Parser)]
#[command(name = "kamehouse", about = "KameHouse storefront client", long_about = None)]
pub(crate) struct Cli {
    /// File holding the session and cart between runs
    #[arg(long, global = true, env = "KAMEHOUSE_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Base URL of the store API (products, orders, uploads, blog)
    #[arg(long, global = true, env = "KAMEHOUSE_STORE_API")]
    store_api: Option<String>,

    /// Base URL of the auth API (auth and users)
    #[arg(long, global = true, env = "KAMEHOUSE_AUTH_API")]
    auth_api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(flatten)]
    Shop(shop::ShopCommand),
    /// Store administration
    Admin(admin::AdminCommand),
}

impl Cli {
    pub(crate) fn apply_overrides(&self, config: &mut StorefrontConfig) {
        if let Some(path) = &self.state_file { config.state_file.clone_from(path); }
        if let Some(url) = self.store_api.as_ref().filter(|u| u.starts_with("http")) { config.store_api.clone_from(url); }
        if let Some(url) = self.auth_api.as_ref().filter(|u| u.starts_with("http")) { config.auth_api.clone_from(url); }
    }

    pub(crate) async fn run(self, config: StorefrontConfig) -> Result<()> {
        let mut ctx = Context::open(config)?;
        ctx.check_renewal().await?;
        match self.command {
            Commands::Shop(command) => shop::run(command, &mut ctx).await,
            Commands::Admin(command) => admin::run(command, &mut ctx).await,
        }
    }
}

/// Everything a command needs, opened once per invocation.
pub(crate) struct Context {
    pub(crate) config: StorefrontConfig,
    pub(crate) gateway: Arc<HttpGateway>,
    pub(crate) storage: Arc<FileStorage>,
    pub(crate) sessions: SessionStore,
}

impl Context {
    fn open(config: StorefrontConfig) -> Result<Self> {
        let gateway = Arc::new(HttpGateway::new(config.gateway()));
        let storage = Arc::new(FileStorage::open(&config.state_file)?);
        let mut sessions = SessionStore::new(gateway.clone(), storage.clone(), config.token_ttl, config.renewal_margin);
        sessions.restore()?;
        Ok(Self { config, gateway, storage, sessions })
    }

    pub(crate) fn cart(&self) -> CartStore { CartStore::load(self.storage.clone()) }

    /// Token for optional-auth calls; empty when signed out.
    pub(crate) fn token(&self) -> String { self.sessions.token().unwrap_or_default().to_string() }

    pub(crate) fn admin(&self) -> Result<(UserId, String)> {
        let session = self.sessions.require_admin()?;
        Ok((session.user.id, session.token.clone()))
    }

    async fn check_renewal(&mut self) -> Result<()> {
        match self.sessions.check_renewal(Utc::now(), ask_to_renew).await? {
            RenewalOutcome::Renewed => println!("Session renewed."),
            RenewalOutcome::LoggedOut => println!("Your session ended. Please log in again."),
            RenewalOutcome::NotSignedIn | RenewalOutcome::NotDue => {}
        }
        Ok(())
    }
}

fn ask_to_renew(expires_at: DateTime<Utc>) -> bool {
    print!("Your session expires at {}. Renew it? [y/N] ", expires_at.format("%H:%M"));
    if io::stdout().flush().is_err() { return false; }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() { return false; }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
