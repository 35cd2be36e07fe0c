use thiserror::Error;

/// Errors surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount {amount} exceeds balance {balance}")]
    InsufficientFunds { amount: u64, balance: u64 },

    #[error("mining interrupted after {attempts} attempts")]
    MiningInterrupted { attempts: u64 },

    #[error("transaction {id} was not authored by {address}")]
    ForeignTransaction { id: String, address: String },

    #[error("output to {recipient} would overflow")]
    OutputOverflow { recipient: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// First structural problem found while validating a candidate chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("chain is empty")]
    Empty,

    #[error("first block is not the genesis block")]
    GenesisMismatch,

    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: usize },

    #[error("block {index} hash does not match its contents")]
    HashMismatch { index: usize },

    #[error("block {index} hash does not meet its difficulty")]
    InsufficientWork { index: usize },

    #[error("block {index} difficulty jumped from {from} to {to}")]
    DifficultyJump { index: usize, from: u32, to: u32 },

    #[error("block {index} carries invalid transaction {id}: {reason}")]
    InvalidTransaction {
        index: usize,
        id: String,
        reason: TransactionViolation,
    },

    #[error("block {index} repeats transaction {id}")]
    DuplicateTransaction { index: usize, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionViolation {
    #[error("outputs total {actual:?}, input amount is {expected}")]
    OutputTotalMismatch { expected: u64, actual: Option<u64> },

    #[error("signature does not verify")]
    BadSignature,
}
