use clap::Parser;

use crate::cfg::FetchStrategy;

#[derive(Parser, Debug)]
#[command(name = "rate_sheet")]
#[command(about = "Scrape an exchange-rate table and append it as a dated sheet in Google Sheets")]
#[command(version)]
pub struct Args {
    /// Google Sheets spreadsheet ID
    #[arg(long, value_name = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Page holding the rate table
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// How to fetch the table
    #[arg(long, value_enum)]
    pub strategy: Option<FetchStrategy>,

    /// Run once then exit (don't run as scheduler)
    #[arg(long)]
    pub once: bool,

    /// Seconds between runs in scheduler mode
    #[arg(long, default_value_t = 86_400)]
    pub interval_secs: u64,

    /// Fetch and sort only; print rows as CSV instead of touching the spreadsheet
    #[arg(long)]
    pub dry_run: bool,

    /// Where --dry-run writes its CSV (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub csv_path: Option<String>,

    /// Load a local .env file before reading the environment
    #[arg(long)]
    pub dev: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Path to config file
    #[arg(long, default_value = "config/config.toml")]
    pub config: String,
}
