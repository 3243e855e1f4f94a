use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "warden-cli")]
#[command(about = "Status CLI for the pool warden", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection state and health report
    Status,
    /// Check that the warden process is serving
    Live,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let healthy = match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_report(res).await?
        }
        Commands::Live => {
            let res = client.get(format!("{}/health/live", cli.url)).send().await?;
            let status = res.status();
            println!("{}", if status.is_success() { "live" } else { "not live" });
            status.is_success()
        }
    };

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the report body. Unhealthy reports arrive as 503 with JSON.
async fn print_report(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => {
            eprintln!("Error: health endpoint returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(status.is_success())
}
