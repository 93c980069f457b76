use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Management CLI for the resource breaker", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "BREAKER_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// List every known circuit
    Circuits,
    /// Show one circuit and its failure window
    Circuit { key: String },
    /// Report a failure for a resource
    Report {
        key: String,
        #[arg(long)]
        instance_id: String,
        #[arg(long)]
        request_id: Option<String>,
        /// RFC 3339 event time; defaults to now on the daemon
        #[arg(long)]
        failure_time: Option<String>,
    },
    /// Force a circuit closed
    Close { key: String },
    /// Force a circuit open without starting remediation
    Open { key: String },
    /// List breaker workflow instances
    Breakers,
    /// Show one breaker workflow instance
    Breaker { resource: String },
    /// End the cooldown of a running breaker early
    ForceClose { resource: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(endpoint(&base, &["status"])?),
        Commands::Circuits => client.get(endpoint(&base, &["circuits"])?),
        Commands::Circuit { key } => client.get(endpoint(&base, &["circuits", &key])?),
        Commands::Report {
            key,
            instance_id,
            request_id,
            failure_time,
        } => client
            .post(endpoint(&base, &["circuits", &key, "failures"])?)
            .json(&json!({
                "instanceId": instance_id,
                "requestId": request_id,
                "failureTime": failure_time,
            })),
        Commands::Close { key } => client.post(endpoint(&base, &["circuits", &key, "close"])?),
        Commands::Open { key } => client.post(endpoint(&base, &["circuits", &key, "open"])?),
        Commands::Breakers => client.get(endpoint(&base, &["breakers"])?),
        Commands::Breaker { resource } => client.get(endpoint(&base, &["breakers", &resource])?),
        Commands::ForceClose { resource } => {
            client.post(endpoint(&base, &["breakers", &resource, "force-close"])?)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

/// Append path segments, percent-encoding `/` inside resource keys.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| "admin URL cannot be a base")?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
