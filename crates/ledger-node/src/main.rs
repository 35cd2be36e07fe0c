mod api;
mod constants;

use api::AppState;
use clap::{Parser, ValueEnum};
use constants::DEFAULT_LISTEN;
use ledger_core::{Blockchain, LedgerConfig, RetargetPolicy, Wallet};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Retarget {
    Inherit,
    PerAttempt,
}

impl From<Retarget> for RetargetPolicy {
    fn from(r: Retarget) -> Self {
        match r {
            Retarget::Inherit => RetargetPolicy::Inherit,
            Retarget::PerAttempt => RetargetPolicy::PerAttempt,
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Leading zero hex characters required of the first mined block
    #[arg(long, default_value_t = ledger_core::constants::INITIAL_DIFFICULTY)]
    initial_difficulty: u32,

    /// Target milliseconds between blocks
    #[arg(long, default_value_t = ledger_core::constants::MINE_RATE_MS)]
    mine_rate_ms: u64,

    /// Balance of a wallet that has never spent
    #[arg(long, default_value_t = ledger_core::constants::STARTING_BALANCE)]
    starting_balance: u64,

    /// How mined blocks pick their difficulty
    #[arg(long, value_enum, default_value_t = Retarget::Inherit)]
    retarget: Retarget,

    /// Give up on a nonce search after this many milliseconds
    #[arg(long)]
    mine_timeout_ms: Option<u64>,

    /// Hex secret key for the node wallet; a fresh one is generated if absent
    #[arg(long)]
    wallet_secret: Option<String>,
}

impl Args {
    fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig::default()
            .with_initial_difficulty(self.initial_difficulty)
            .with_mine_rate_ms(self.mine_rate_ms)
            .with_starting_balance(self.starting_balance)
            .with_retarget(self.retarget.into())
            .with_mine_timeout_ms(self.mine_timeout_ms)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.ledger_config();
    let wallet = match &args.wallet_secret {
        Some(secret) => Wallet::from_secret_hex(secret, &config)?,
        None => Wallet::new(&config),
    };
    info!("node wallet address {}", wallet.address());

    let state = AppState::new(Blockchain::new(config), wallet);
    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
