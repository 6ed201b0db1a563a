use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use admission_gate::auth::{issue_session, AdminSessionClaims};
use admission_gate::config::load_geo_config;
use admission_gate::geo::GeoFence;

#[derive(Parser)]
#[command(name = "gatectl")]
#[command(about = "Operator CLI for the admission gate", long_about = None)]
struct Cli {
    /// Gate configuration used by the offline checks.
    #[arg(short, long, global = true, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an IP address against the territory ranges and whitelist
    CheckIp { ip: String },
    /// Evaluate a country code as the edge platform would send it
    CheckCountry { code: Option<String> },
    /// Mint an admin session token
    IssueAdminToken {
        #[arg(long)]
        admin_id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "admin")]
        role: String,
        /// Signing secret; the token is unsigned without one
        #[arg(long, env = "ADMIN_SESSION_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },
    /// Query a running gate's status endpoint
    Status {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
        /// Admin bearer token
        #[arg(short, long, env = "GATE_ADMIN_TOKEN", hide_env_values = true)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckIp { ip } => {
            let fence = GeoFence::new(&load_geo_config(cli.config.as_deref())?);
            Ok(verdict(fence.is_ip_allowed(&ip), &ip))
        }
        Commands::CheckCountry { code } => {
            let fence = GeoFence::new(&load_geo_config(cli.config.as_deref())?);
            let label = code.as_deref().unwrap_or("<none>");
            Ok(verdict(fence.is_country_allowed(code.as_deref()), label))
        }
        Commands::IssueAdminToken {
            admin_id,
            email,
            role,
            secret,
        } => {
            let secret = secret.filter(|s| !s.is_empty());
            let claims = AdminSessionClaims {
                admin_id,
                email,
                role: Some(role),
                timestamp: Utc::now().timestamp_millis(),
            };
            let token = issue_session(&claims, secret.as_deref().map(str::as_bytes))?;
            if secret.is_none() {
                eprintln!("warning: token is unsigned; gates with a session secret will reject it");
            }
            println!("{token}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { url, token } => {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            let res = reqwest::Client::new()
                .get(format!("{}/_gate/status", url.trim_end_matches('/')))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await
        }
    }
}

fn verdict(allowed: bool, subject: &str) -> ExitCode {
    if allowed {
        println!("ALLOWED {subject}");
        ExitCode::SUCCESS
    } else {
        println!("BLOCKED {subject}");
        ExitCode::FAILURE
    }
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    if status.is_success() {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error: {} - {}", status, res.text().await?);
        Ok(ExitCode::FAILURE)
    }
}
