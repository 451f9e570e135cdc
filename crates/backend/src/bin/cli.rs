use anyhow::Context;
use clap::{Parser, Subcommand};
use mcc_client::{CampaignCreation, CampaignData, StepState};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared_types::{
    BalanceResponse, BatchRefreshResponse, ClientRequestResponse, CreateSubAccountRequest,
    LinkAccountRequest,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "furriyadh-cli")]
#[command(about = "CLI for Furriyadh Google Ads accounts, campaigns and balances")]
#[command(
    long_about = "A command-line interface for the Furriyadh backend.\n\n\
    Creates campaigns from JSON files, manages linked Google Ads accounts,\n\
    refreshes link statuses and shows the account balance."
)]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "FURRIYADH_API_URL"
    )]
    base_url: String,

    /// Session token (the `auth_token` cookie value), sent as a bearer token.
    #[arg(short, long, env = "FURRIYADH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build search campaigns
    Campaigns {
        #[command(subcommand)]
        action: CampaignAction,
    },
    /// Manage linked Google Ads accounts
    Accounts {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Account link statuses
    Statuses {
        #[command(subcommand)]
        action: StatusAction,
    },
    /// Furriyadh balance
    Balance {
        #[command(subcommand)]
        action: BalanceAction,
    },
}

#[derive(Subcommand)]
enum CampaignAction {
    /// Create a campaign from a JSON file
    ///
    /// The file holds the campaign fields (name, objective, budget,
    /// locations, languages, keywords, headlines, descriptions, finalUrl).
    /// It is validated locally before anything is sent.
    Create {
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Customer ID the campaign is created in (e.g. 123-456-7890).
        #[arg(short, long, value_name = "ID")]
        customer: String,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// List linked accounts with their status
    List,

    /// Create a new sub-account under the manager account
    Create {
        /// Descriptive name shown in Google Ads.
        name: String,

        /// ISO 4217 currency code.
        #[arg(short, long, default_value = "SAR")]
        currency: String,

        /// IANA time zone.
        #[arg(short = 'z', long, default_value = "Asia/Riyadh")]
        time_zone: String,
    },

    /// Invite an existing Google Ads account to be managed
    Link {
        /// Customer ID to invite (e.g. 123-456-7890).
        customer: String,
    },
}

#[derive(Subcommand)]
enum StatusAction {
    /// Show link statuses, optionally refreshing them from Google first
    Refresh {
        /// Ask the batch sync service for fresh statuses. Uses the Google
        /// Ads refresh token saved when the account was connected.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum BalanceAction {
    /// Show the current balance
    Show,
}

struct Api {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url.trim_end_matches('/'), path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Send a request and decode the JSON body, surfacing the server's error
/// message on failure.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> anyhow::Result<T> {
    let response = request.send().await.context("Request failed")?;
    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body["error"].as_str().unwrap_or("request failed");
        if let Some(details) = body.get("details") {
            if let Ok(pretty) = serde_json::to_string_pretty(details) {
                eprintln!("{}", pretty);
            }
        }
        anyhow::bail!("{} ({})", message, status);
    }
    Ok(response.json().await?)
}

fn print_links(links: &[ClientRequestResponse]) {
    if links.is_empty() {
        println!("No linked accounts found.");
        return;
    }
    for link in links {
        let name = link.link_details["descriptive_name"].as_str().unwrap_or("");
        println!(
            "{} {:<15} ({}) {}",
            link.customer_id, link.status, link.status_source, name
        );
    }
}

fn print_micros(label: &str, micros: i64, currency: &str) {
    println!("{:<12} {:>14.2} {}", label, micros as f64 / 1_000_000.0, currency);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base_url: cli.base_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Campaigns { action } => handle_campaigns(&api, action).await?,
        Commands::Accounts { action } => handle_accounts(&api, action).await?,
        Commands::Statuses { action } => handle_statuses(&api, action).await?,
        Commands::Balance { action } => handle_balance(&api, action).await?,
    }

    Ok(())
}

async fn handle_campaigns(api: &Api, action: CampaignAction) -> anyhow::Result<()> {
    match action {
        CampaignAction::Create { file, customer } => {
            let content =
                std::fs::read_to_string(&file).context("Failed to read campaign file")?;
            let campaign: CampaignData =
                serde_json::from_str(&content).context("Failed to parse campaign JSON")?;
            campaign.validate()?;

            let mut body = serde_json::to_value(&campaign)?;
            body["customer_id"] = serde_json::Value::String(customer);

            let report: CampaignCreation =
                send_json(api.request(reqwest::Method::POST, "/api/campaigns").json(&body))
                    .await?;

            println!(
                "Created campaign {} in {}",
                report.campaign_id.as_deref().unwrap_or("?"),
                report.customer_id
            );
            for record in &report.steps {
                let state = match &record.state {
                    StepState::Completed { .. } => "completed".to_string(),
                    StepState::Skipped { reason } => format!("skipped: {}", reason),
                    StepState::Degraded { warning } => format!("degraded: {}", warning),
                    other => format!("{:?}", other),
                };
                println!("  {:<18} {}", record.step.as_str(), state);
            }
            for warning in &report.warnings {
                println!("  warning: {}", warning);
            }
        }
    }

    Ok(())
}

async fn handle_accounts(api: &Api, action: AccountAction) -> anyhow::Result<()> {
    match action {
        AccountAction::List => {
            let links: Vec<ClientRequestResponse> =
                send_json(api.request(reqwest::Method::GET, "/api/accounts")).await?;
            print_links(&links);
        }
        AccountAction::Create {
            name,
            currency,
            time_zone,
        } => {
            let req = CreateSubAccountRequest {
                descriptive_name: name,
                currency_code: currency,
                time_zone,
            };
            let link: ClientRequestResponse =
                send_json(api.request(reqwest::Method::POST, "/api/accounts").json(&req)).await?;
            println!("Created account {} ({})", link.customer_id, link.status);
        }
        AccountAction::Link { customer } => {
            let req = LinkAccountRequest {
                customer_id: customer,
            };
            let link: ClientRequestResponse = send_json(
                api.request(reqwest::Method::POST, "/api/accounts/link")
                    .json(&req),
            )
            .await?;
            println!(
                "Invitation sent to {}; status {}",
                link.customer_id, link.status
            );
        }
    }

    Ok(())
}

async fn handle_statuses(api: &Api, action: StatusAction) -> anyhow::Result<()> {
    match action {
        StatusAction::Refresh { force } => {
            let path = format!("/api/google-ads/batch-refresh-statuses?forceRefresh={}", force);
            let response: BatchRefreshResponse =
                send_json(api.request(reqwest::Method::GET, &path)).await?;
            if response.refreshed {
                println!("Statuses refreshed from Google Ads.");
            }
            print_links(&response.accounts);
        }
    }

    Ok(())
}

async fn handle_balance(api: &Api, action: BalanceAction) -> anyhow::Result<()> {
    match action {
        BalanceAction::Show => {
            let balance: BalanceResponse =
                send_json(api.request(reqwest::Method::GET, "/api/balance")).await?;
            let currency = balance.currency_code.as_str();
            print_micros("Deposited", balance.deposited_micros, currency);
            print_micros("Spent", balance.spent_micros, currency);
            print_micros("Commission", balance.commission_micros, currency);
            print_micros("Remaining", balance.remaining_micros, currency);
            println!("Status       {}", balance.status);
        }
    }

    Ok(())
}
