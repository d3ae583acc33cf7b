//! Query the Listen API once and report the outcome.
//!
//! Reads `LISTEN_API_KEY` (optionally from `.env`). Without a key the request
//! goes to the mock-data test server.
//!
//! ```text
//! RUST_LOG=podcast_api=debug cargo run -p podcast-api --example sample -- star
//! ```

use podcast_api::{ApiError, ClientBuilder, Params};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let query = std::env::args().nth(1).unwrap_or_else(|| "star".to_string());
    let client = ClientBuilder::from_env()?.build()?;
    println!("Using {}", client.base_url());

    let result = client.typeahead(Params::new().with("q", &query).with("show_podcasts", 1));
    match result {
        Ok(response) => {
            let body: serde_json::Value = response.json()?;
            println!("{}", serde_json::to_string_pretty(&body)?);

            let usage = response.usage();
            println!();
            println!("Free quota this month: {:?} requests", usage.free_quota);
            println!("Usage this month: {:?} requests", usage.usage);
            println!("Next billing date: {:?}", usage.next_billing_date);
        }
        Err(ApiError::Authentication { .. }) => eprintln!("Wrong api key, or your account is suspended"),
        Err(ApiError::InvalidRequest { message, .. }) => eprintln!("Invalid request: {message}"),
        Err(ApiError::RateLimit { .. }) => eprintln!("You have reached your quota limit"),
        Err(ApiError::NotFound { .. }) => eprintln!("Endpoint not exist or podcast / episode not exist"),
        Err(ApiError::Server { response }) => eprintln!("Server error {}", response.status),
        Err(ApiError::Connection { attempts, source }) => {
            eprintln!("Failed to connect to Listen API servers after {attempts} attempts: {source}")
        }
        Err(err) => eprintln!("Something wrong: {err}"),
    }
    Ok(())
}
