//! Proof-of-work ledger core: digest, blocks, chain validation and
//! replacement, and secp256k1 wallets that sign transfers.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod digest;
pub mod error;
pub mod transaction;
pub mod wallet;

pub use block::{embedded_transactions, Block};
pub use chain::{Blockchain, ReplaceOptions, ReplaceOutcome};
pub use config::{GenesisConfig, LedgerConfig, RetargetPolicy};
pub use digest::Hash;
pub use error::{ChainViolation, LedgerError, TransactionViolation};
pub use transaction::{OutputMap, Transaction, TransactionInput};
pub use wallet::{verify_signature, TransferRequest, Wallet};
