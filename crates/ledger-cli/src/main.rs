use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain
    Blocks,
    /// Mine arbitrary JSON data into a block
    Mine {
        /// Block payload as JSON; bare text is sent as a JSON string
        #[arg(long)]
        data: String,
    },
    /// Send value from the node's wallet
    Transact {
        /// Recipient address
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Show the node wallet's address and balance
    Wallet,
}

#[derive(Serialize)]
struct MineIn {
    data: serde_json::Value,
}

#[derive(Serialize)]
struct TransactIn {
    recipient: String,
    amount: u64,
}

fn parse_data(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node.trim_end_matches('/');

    let res = match cli.cmd {
        Command::Blocks => client.get(format!("{node}/api/blocks")).send().await,
        Command::Mine { data } => {
            let body = MineIn {
                data: parse_data(&data),
            };
            client.post(format!("{node}/api/mine")).json(&body).send().await
        }
        Command::Transact { recipient, amount } => {
            let body = TransactIn { recipient, amount };
            client.post(format!("{node}/api/transact")).json(&body).send().await
        }
        Command::Wallet => client.get(format!("{node}/api/wallet-info")).send().await,
    }
    .with_context(|| format!("request to {node} failed"))?;

    let status = res.status();
    let body = res.text().await?;
    debug!("{} bytes from {node}", body.len());
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
