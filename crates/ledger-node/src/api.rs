use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{
    embedded_transactions, Block, Blockchain, LedgerError, Transaction, TransactionViolation,
    TransferRequest, Wallet,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Shared node state. Every mutation of the chain holds the write lock, so
/// readers never observe a half-replaced chain.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<RwLock<Blockchain>>,
    pub wallet: Arc<Wallet>,
}

impl AppState {
    pub fn new(chain: Blockchain, wallet: Wallet) -> Self {
        Self {
            chain: Arc::new(RwLock::new(chain)),
            wallet: Arc::new(wallet),
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub data: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
pub struct TransactResponse {
    pub transaction: Transaction,
    pub block: Block,
}

#[derive(Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    InvalidTransaction { id: String, reason: TransactionViolation },
    Poisoned,
    Join(tokio::task::JoinError),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Ledger(err @ LedgerError::InsufficientFunds { .. }) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Ledger(err @ LedgerError::MiningInterrupted { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            ApiError::Ledger(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::InvalidTransaction { id, reason } => (
                StatusCode::BAD_REQUEST,
                format!("transaction {id} is invalid: {reason}"),
            ),
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "chain lock poisoned".to_string(),
            ),
            ApiError::Join(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        warn!("request failed with {status}: {message}");
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/blocks", get(blocks))
        .route("/api/mine", post(mine))
        .route("/api/transact", post(transact))
        .route("/api/wallet-info", get(wallet_info))
        .with_state(state)
}

async fn blocks(State(state): State<AppState>) -> Result<Json<Vec<Block>>, ApiError> {
    let chain = state.chain.read().map_err(|_| ApiError::Poisoned)?;
    Ok(Json(chain.blocks().to_vec()))
}

// Mining is CPU-bound, so it runs on the blocking pool. Transactions carried
// in the payload must validate before any work is spent on them.
async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<Block>, ApiError> {
    for tx in embedded_transactions(&req.data) {
        if let Err(reason) = tx.validate() {
            return Err(ApiError::InvalidTransaction { id: tx.id, reason });
        }
    }
    let block = tokio::task::spawn_blocking(move || -> Result<Block, ApiError> {
        let mut chain = state.chain.write().map_err(|_| ApiError::Poisoned)?;
        let block = chain.add_block(req.data)?.clone();
        Ok(block)
    })
    .await
    .map_err(ApiError::Join)??;
    info!("mined block {} with nonce {}", block.hash, block.nonce);
    Ok(Json(block))
}

/// Sign a transfer from the node's wallet and mine it as its own block.
async fn transact(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransactResponse>, ApiError> {
    let response = tokio::task::spawn_blocking(move || -> Result<TransactResponse, ApiError> {
        let mut chain = state.chain.write().map_err(|_| ApiError::Poisoned)?;
        let transaction = state.wallet.create_transaction(req, chain.blocks())?;
        let data = serde_json::to_value([&transaction]).map_err(LedgerError::from)?;
        let block = chain.add_block(data)?.clone();
        Ok(TransactResponse { transaction, block })
    })
    .await
    .map_err(ApiError::Join)??;
    info!(
        "transaction {} mined in block {}",
        response.transaction.id, response.block.hash
    );
    Ok(Json(response))
}

async fn wallet_info(State(state): State<AppState>) -> Result<Json<WalletInfo>, ApiError> {
    let chain = state.chain.read().map_err(|_| ApiError::Poisoned)?;
    Ok(Json(WalletInfo {
        address: state.wallet.address().to_string(),
        balance: state.wallet.balance(chain.blocks()),
    }))
}
