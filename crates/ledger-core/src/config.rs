use crate::constants::{
    GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, INITIAL_DIFFICULTY, MINE_RATE_MS,
    STARTING_BALANCE,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a new block picks its difficulty while the nonce search runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetargetPolicy {
    /// Every attempt uses the predecessor's difficulty.
    #[default]
    Inherit,
    /// Every attempt re-evaluates `Block::adjust_difficulty` against its own timestamp.
    PerAttempt,
}

/// Field values of the fixed first block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: serde_json::Value,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: serde_json::Value::Array(vec![]),
        }
    }
}

/// Everything the ledger algorithms read from configuration.
///
/// Passed explicitly to `Blockchain::new`, `Block::mine` and `Wallet::new`
/// so independent ledgers (and tests) never share state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub genesis: GenesisConfig,
    pub initial_difficulty: u32,
    pub mine_rate_ms: u64,
    pub starting_balance: u64,
    pub retarget: RetargetPolicy,
    /// Upper bound on a single nonce search; `None` searches until a hash qualifies.
    pub mine_timeout_ms: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            genesis: GenesisConfig::default(),
            initial_difficulty: INITIAL_DIFFICULTY,
            mine_rate_ms: MINE_RATE_MS,
            starting_balance: STARTING_BALANCE,
            retarget: RetargetPolicy::default(),
            mine_timeout_ms: None,
        }
    }
}

impl LedgerConfig {
    pub fn mine_rate(&self) -> Duration {
        Duration::from_millis(self.mine_rate_ms)
    }

    pub fn mine_timeout(&self) -> Option<Duration> {
        self.mine_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_initial_difficulty(mut self, difficulty: u32) -> Self {
        self.initial_difficulty = difficulty;
        self
    }

    pub fn with_mine_rate_ms(mut self, mine_rate_ms: u64) -> Self {
        self.mine_rate_ms = mine_rate_ms;
        self
    }

    pub fn with_starting_balance(mut self, balance: u64) -> Self {
        self.starting_balance = balance;
        self
    }

    pub fn with_retarget(mut self, retarget: RetargetPolicy) -> Self {
        self.retarget = retarget;
        self
    }

    pub fn with_mine_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.mine_timeout_ms = timeout_ms;
        self
    }
}
