use crate::{
    config::{LedgerConfig, RetargetPolicy},
    constants::MIN_DIFFICULTY,
    digest::{canonical, crypto_hash},
    LedgerError, Transaction,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: serde_json::Value,
    pub nonce: u64,
    pub difficulty: u32,
}

impl Block {
    /// The fixed first block. Never mined.
    pub fn genesis(config: &LedgerConfig) -> Self {
        Self {
            timestamp: config.genesis.timestamp,
            last_hash: config.genesis.last_hash.clone(),
            hash: config.genesis.hash.clone(),
            data: config.genesis.data.clone(),
            nonce: 0,
            difficulty: config.initial_difficulty,
        }
    }

    /// Search nonces on top of `last` until the hash has enough leading zeros.
    ///
    /// Runs until a hash qualifies unless `config.mine_timeout_ms` is set.
    pub fn mine(
        last: &Block,
        data: serde_json::Value,
        config: &LedgerConfig,
    ) -> Result<Self, LedgerError> {
        match config.mine_timeout() {
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                Self::mine_with(last, data, config, |_| Instant::now() >= deadline)
            }
            None => Self::mine_with(last, data, config, |_| false),
        }
    }

    /// Same search as [`Block::mine`], polling `interrupt` with the attempt
    /// count before every attempt.
    pub fn mine_with<F>(
        last: &Block,
        data: serde_json::Value,
        config: &LedgerConfig,
        mut interrupt: F,
    ) -> Result<Self, LedgerError>
    where
        F: FnMut(u64) -> bool,
    {
        let last_hash = canonical(&last.hash)?;
        let data_repr = canonical(&data)?;
        let mine_rate = config.mine_rate();

        let mut nonce = 0u64;
        loop {
            if interrupt(nonce) {
                return Err(LedgerError::MiningInterrupted { attempts: nonce });
            }
            nonce = nonce.wrapping_add(1);
            let timestamp = now_millis();
            let difficulty = match config.retarget {
                RetargetPolicy::Inherit => last.difficulty,
                RetargetPolicy::PerAttempt => Self::adjust_difficulty(last, timestamp, mine_rate),
            };
            let hash = hash_fields(timestamp, &last_hash, &data_repr, nonce, difficulty);
            if has_leading_zeros(&hash, difficulty) {
                info!(
                    "Mined block on {} with nonce {} difficulty {} hash {}",
                    last.hash, nonce, difficulty, hash
                );
                return Ok(Self {
                    timestamp,
                    last_hash: last.hash.clone(),
                    hash,
                    data,
                    nonce,
                    difficulty,
                });
            }
        }
    }

    /// Ease the difficulty by one when `original` was followed too slowly,
    /// tighten it by one otherwise. Never drops below 1.
    pub fn adjust_difficulty(original: &Block, timestamp: u64, mine_rate: Duration) -> u32 {
        let elapsed = timestamp.saturating_sub(original.timestamp);
        let adjusted = if u128::from(elapsed) > mine_rate.as_millis() {
            original.difficulty.saturating_sub(1)
        } else {
            original.difficulty.saturating_add(1)
        };
        let adjusted = adjusted.max(MIN_DIFFICULTY);
        debug!(
            "difficulty {} -> {} after {}ms",
            original.difficulty, adjusted, elapsed
        );
        adjusted
    }

    /// Recompute the hash from the block's own fields.
    pub fn computed_hash(&self) -> Result<String, LedgerError> {
        Ok(hash_fields(
            self.timestamp,
            &canonical(&self.last_hash)?,
            &canonical(&self.data)?,
            self.nonce,
            self.difficulty,
        ))
    }

    pub fn meets_difficulty(&self) -> bool {
        has_leading_zeros(&self.hash, self.difficulty)
    }

    /// Entries of `data` that decode as transactions; anything else is skipped.
    pub fn transactions(&self) -> Vec<Transaction> {
        embedded_transactions(&self.data)
    }
}

/// Entries of a block payload that decode as transactions.
pub fn embedded_transactions(data: &serde_json::Value) -> Vec<Transaction> {
    match data.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        None => Vec::new(),
    }
}

// Numbers canonicalise to their decimal form, so only the string-ish parts
// need pre-encoding.
fn hash_fields(
    timestamp: u64,
    last_hash: &str,
    data: &str,
    nonce: u64,
    difficulty: u32,
) -> String {
    crypto_hash([
        timestamp.to_string().as_str(),
        last_hash,
        data,
        nonce.to_string().as_str(),
        difficulty.to_string().as_str(),
    ])
}

fn has_leading_zeros(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fast_config() -> LedgerConfig {
        LedgerConfig::default().with_initial_difficulty(1)
    }

    fn fixed_block(difficulty: u32) -> Block {
        Block {
            timestamp: 2_000,
            last_hash: "foo-hash".into(),
            hash: "bar-hash".into(),
            data: json!(["blockchain", "data"]),
            nonce: 1,
            difficulty,
        }
    }

    #[test]
    fn genesis_uses_configured_fields() {
        let config = LedgerConfig::default();
        let genesis = Block::genesis(&config);
        assert_eq!(genesis.timestamp, 1);
        assert_eq!(genesis.last_hash, "-----");
        assert_eq!(genesis.hash, "hash-one");
        assert_eq!(genesis.data, json!([]));
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.difficulty, 3);
        assert_eq!(genesis, Block::genesis(&LedgerConfig::default()));
    }

    #[test]
    fn mined_block_links_and_hashes() {
        let config = fast_config();
        let last = Block::genesis(&config);
        let data = json!("mined data");
        let mined = Block::mine(&last, data.clone(), &config).unwrap();

        assert_eq!(mined.last_hash, last.hash);
        assert_eq!(mined.data, data);
        assert_eq!(mined.difficulty, last.difficulty);
        assert!(mined.timestamp > 0);
        assert!(mined.nonce >= 1);
        assert_eq!(mined.hash, mined.computed_hash().unwrap());
        assert_eq!(
            mined.hash,
            crate::crypto_hash!(
                mined.timestamp,
                mined.last_hash,
                mined.data,
                mined.nonce,
                mined.difficulty
            )
            .unwrap()
        );
        assert!(mined.meets_difficulty());
    }

    #[test]
    fn mined_hash_has_leading_zeros() {
        let config = LedgerConfig::default().with_initial_difficulty(2);
        let mined = Block::mine(&Block::genesis(&config), json!([]), &config).unwrap();
        assert!(mined.hash.starts_with("00"));
    }

    #[test]
    fn interrupt_stops_the_search() {
        // 64 leading zeros cannot realistically be found.
        let config = LedgerConfig::default().with_initial_difficulty(64);
        let last = Block::genesis(&config);
        let err = Block::mine_with(&last, json!("x"), &config, |attempts| attempts >= 10)
            .unwrap_err();
        assert!(matches!(err, LedgerError::MiningInterrupted { attempts: 10 }));
    }

    #[test]
    fn timeout_bounds_the_search() {
        let config = LedgerConfig::default()
            .with_initial_difficulty(64)
            .with_mine_timeout_ms(Some(20));
        let err = Block::mine(&Block::genesis(&config), json!("x"), &config).unwrap_err();
        assert!(matches!(err, LedgerError::MiningInterrupted { .. }));
    }

    #[test]
    fn adjust_difficulty_eases_when_slow() {
        let original = fixed_block(5);
        let rate = Duration::from_millis(3_000);
        assert_eq!(Block::adjust_difficulty(&original, original.timestamp + 5_000, rate), 4);
    }

    #[test]
    fn adjust_difficulty_tightens_when_fast() {
        let original = fixed_block(5);
        let rate = Duration::from_millis(3_000);
        assert_eq!(Block::adjust_difficulty(&original, original.timestamp + 1_000, rate), 6);
    }

    #[test]
    fn adjust_difficulty_never_drops_below_one() {
        let rate = Duration::from_millis(3_000);
        let original = fixed_block(1);
        assert_eq!(Block::adjust_difficulty(&original, original.timestamp + 10_000, rate), 1);
        let zero = fixed_block(0);
        assert_eq!(Block::adjust_difficulty(&zero, zero.timestamp + 10_000, rate), 1);
    }

    #[test]
    fn per_attempt_retarget_eases_after_old_tail() {
        // Genesis is stamped at 1ms, far longer ago than any mine rate.
        let config = LedgerConfig::default()
            .with_initial_difficulty(2)
            .with_retarget(RetargetPolicy::PerAttempt);
        let mined = Block::mine(&Block::genesis(&config), json!("x"), &config).unwrap();
        assert_eq!(mined.difficulty, 1);
        assert!(mined.meets_difficulty());
    }

    #[test]
    fn per_attempt_retarget_tightens_under_rate() {
        let config = LedgerConfig::default()
            .with_initial_difficulty(1)
            .with_mine_rate_ms(u64::MAX)
            .with_retarget(RetargetPolicy::PerAttempt);
        let mined = Block::mine(&Block::genesis(&config), json!("x"), &config).unwrap();
        assert_eq!(mined.difficulty, 2);
        assert!(mined.hash.starts_with("00"));
    }

    #[test]
    fn json_uses_ledger_field_names() {
        let json = serde_json::to_value(fixed_block(3)).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["data", "difficulty", "hash", "lastHash", "nonce", "timestamp"]
        );
    }

    #[test]
    fn transactions_skip_foreign_entries() {
        let block = fixed_block(1);
        assert!(block.transactions().is_empty());
    }

    #[test]
    fn leading_zero_examples() {
        assert!(has_leading_zeros("000abc", 3));
        assert!(!has_leading_zeros("00a0bc", 3));
        assert!(has_leading_zeros("abc", 0));
        assert!(!has_leading_zeros("00", 3));
    }
}
