use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use config::{Config, ConfigError, Environment, File};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::args::Args;

pub const DEFAULT_TABLE_SELECTOR: &str = "#ctl00_PlaceHolderMainContent_GridViewDolar";
pub const DEFAULT_RETENTION_CAP: usize = 200;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Which data-acquisition strategy feeds the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStrategy {
    /// Plain HTTP GET and HTML parse, no page scripts.
    #[default]
    Static,
    /// Headless Chromium navigation with in-page extraction.
    Rendered,
}

/// How the retention enforcer decides which sheet is the oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionOrder {
    /// The last sheet in the backend listing is the oldest.
    #[default]
    Listing,
    /// The sheet whose title is the earliest ISO date is the oldest.
    TitleDate,
}

#[derive(Clone)]
pub enum Credentials {
    ServiceAccount { email: String, private_key: String },
    OAuth2(OAuth2Token),
}

/// A pre-obtained OAuth2 token set. There is no refresh flow: once `expiry`
/// passes the run fails. The client secret, redirect URI and refresh token are
/// accepted so a complete token set loads, but only the access token is sent.
#[derive(Clone)]
pub struct OAuth2Token {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: Option<DateTime<Utc>>,
    pub token_type: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount { email, private_key } => f
                .debug_struct("ServiceAccount")
                .field("email", email)
                .field("private_key", &redact(private_key))
                .finish(),
            Credentials::OAuth2(token) => token.fmt(f),
        }
    }
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone)]
pub struct Cfg {
    pub spreadsheet_id: String,
    pub crawl_url: String,
    pub credentials: Option<Credentials>,
    pub strategy: FetchStrategy,
    pub table_selector: String,
    pub retention_cap: usize,
    pub retention_order: RetentionOrder,
    pub chrome_executable: Option<String>,
    pub http_timeout_secs: u64,
    pub once: bool,
    pub interval_secs: u64,
    pub dry_run: bool,
    pub csv_path: Option<String>,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            crawl_url: String::new(),
            credentials: None,
            strategy: FetchStrategy::default(),
            table_selector: DEFAULT_TABLE_SELECTOR.to_string(),
            retention_cap: DEFAULT_RETENTION_CAP,
            retention_order: RetentionOrder::default(),
            chrome_executable: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            once: true,
            interval_secs: 86_400,
            dry_run: false,
            csv_path: None,
        }
    }
}

impl Cfg {
    pub fn load(args: Args) -> Result<Self> {
        if args.dev || std::env::var("RUN_MODE").map(|m| m == "dev").unwrap_or(false) {
            match dotenvy::dotenv() {
                Ok(path) => info!("Loaded developer environment from {}", path.display()),
                Err(e) => warn!("Dev mode requested but no .env file was loaded: {}", e),
            }
        }

        info!("Loading configuration from: {}", args.config);

        // The file is optional; environment variables take precedence over it.
        let config = Config::builder()
            .add_source(File::with_name(&args.config).required(false))
            .add_source(Environment::default())
            .build()
            .context("Failed to assemble configuration sources")?;

        let mut cfg = Cfg::from_config(&config)?;

        // Override with command line arguments if provided
        if let Some(spreadsheet_id) = args.spreadsheet_id {
            debug!("Overriding spreadsheet_id from command line");
            cfg.spreadsheet_id = spreadsheet_id;
        }
        if let Some(url) = args.url {
            debug!("Overriding crawl_url from command line");
            cfg.crawl_url = url;
        }
        if let Some(strategy) = args.strategy {
            debug!("Overriding fetch strategy from command line");
            cfg.strategy = strategy;
        }

        cfg.once = args.once;
        cfg.interval_secs = args.interval_secs;
        cfg.dry_run = args.dry_run;
        cfg.csv_path = args.csv_path;

        debug!("Final configuration: {:?}", cfg);
        Ok(cfg)
    }

    /// Reads every known key out of an assembled `Config`. Keys are the
    /// lower-cased environment variable names.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut cfg = Cfg::default();

        if let Some(id) = string_key(config, "google_spreadsheet_id") {
            cfg.spreadsheet_id = id;
        }
        if let Some(url) = string_key(config, "crawl_url") {
            cfg.crawl_url = url;
        }
        if let Some(selector) = string_key(config, "table_selector") {
            cfg.table_selector = selector;
        }
        cfg.chrome_executable = string_key(config, "chrome_executable");

        if let Some(strategy) = typed_key::<FetchStrategy>(config, "fetch_strategy")? {
            cfg.strategy = strategy;
        }
        if let Some(order) = typed_key::<RetentionOrder>(config, "retention_order")? {
            cfg.retention_order = order;
        }
        if let Some(cap) = int_key(config, "retention_cap")? {
            cfg.retention_cap = usize::try_from(cap)
                .with_context(|| format!("retention_cap must not be negative, got {}", cap))?;
        }
        if let Some(secs) = int_key(config, "http_timeout_secs")? {
            cfg.http_timeout_secs = u64::try_from(secs)
                .with_context(|| format!("http_timeout_secs must not be negative, got {}", secs))?;
        }

        cfg.credentials = credentials_from(config)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.crawl_url.is_empty() {
            anyhow::bail!("crawl_url must be set (CRAWL_URL)");
        }
        reqwest::Url::parse(&self.crawl_url)
            .with_context(|| format!("crawl_url is not a valid URL: {}", self.crawl_url))?;

        if scraper::Selector::parse(&self.table_selector).is_err() {
            anyhow::bail!("table_selector is not a valid CSS selector: {}", self.table_selector);
        }

        if !self.dry_run {
            if self.spreadsheet_id.is_empty() {
                anyhow::bail!("spreadsheet id must be set (GOOGLE_SPREADSHEET_ID)");
            }
            if self.credentials.is_none() {
                anyhow::bail!(
                    "no credentials configured: set GOOGLE_SERVICE_ACCOUNT_EMAIL/GOOGLE_PRIVATE_KEY \
                     or the GOOGLE_CLIENT_ID/GOOGLE_ACCESS_TOKEN family"
                );
            }
        }

        if self.retention_cap == 0 {
            anyhow::bail!("retention_cap must be at least 1");
        }
        if !self.once && self.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than zero in scheduler mode");
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

fn string_key(config: &Config, key: &str) -> Option<String> {
    config
        .get_string(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn int_key(config: &Config, key: &str) -> Result<Option<i64>> {
    match config.get_int(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Invalid integer for {}", key)),
    }
}

fn typed_key<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>> {
    match config.get::<T>(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Invalid value for {}", key)),
    }
}

/// Picks the single active credential scheme. Configuring both is an error.
fn credentials_from(config: &Config) -> Result<Option<Credentials>> {
    let service_account = match (
        string_key(config, "google_service_account_email"),
        string_key(config, "google_private_key"),
    ) {
        (Some(email), Some(key)) => Some(Credentials::ServiceAccount {
            email,
            // Keys stored in env vars carry escaped newlines.
            private_key: key.replace("\\n", "\n"),
        }),
        (None, None) => None,
        _ => anyhow::bail!(
            "GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY must be set together"
        ),
    };

    let oauth = match string_key(config, "google_access_token") {
        Some(access_token) => {
            let expiry = match int_key(config, "google_expiry_date")? {
                Some(ms) => Some(
                    DateTime::<Utc>::from_timestamp_millis(ms)
                        .with_context(|| format!("google_expiry_date out of range: {}", ms))?,
                ),
                None => None,
            };
            Some(Credentials::OAuth2(OAuth2Token {
                client_id: string_key(config, "google_client_id").unwrap_or_default(),
                client_secret: string_key(config, "google_client_secret").unwrap_or_default(),
                redirect_uri: string_key(config, "google_redirect_uri").unwrap_or_default(),
                access_token,
                refresh_token: string_key(config, "google_refresh_token").unwrap_or_default(),
                expiry,
                token_type: string_key(config, "google_token_type")
                    .unwrap_or_else(|| "Bearer".to_string()),
            }))
        }
        None => None,
    };

    match (service_account, oauth) {
        (Some(_), Some(_)) => anyhow::bail!(
            "both service-account and OAuth2 credentials are configured; exactly one is allowed"
        ),
        (Some(creds), None) | (None, Some(creds)) => Ok(Some(creds)),
        (None, None) => Ok(None),
    }
}
