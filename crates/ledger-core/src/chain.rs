use crate::{Block, ChainViolation, LedgerConfig, LedgerError};
use std::collections::HashSet;
use tracing::{info, warn};

/// Result of offering a candidate chain to [`Blockchain::replace_chain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced { length: usize },
    RejectedNotLonger { current: usize, candidate: usize },
    RejectedInvalid(ChainViolation),
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReplaceOutcome::Replaced { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceOptions {
    /// Also require every embedded transaction to validate.
    pub validate_transactions: bool,
}

/// In-memory chain; always starts at the configured genesis block.
#[derive(Clone, Debug)]
pub struct Blockchain {
    chain: Vec<Block>,
    config: LedgerConfig,
}

impl Blockchain {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            chain: vec![Block::genesis(&config)],
            config,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Never true: genesis is always present.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // Construction seeds genesis and replacement only accepts longer chains.
        &self.chain[self.chain.len() - 1]
    }

    /// Mine `data` on top of the tail and append it.
    pub fn add_block(&mut self, data: serde_json::Value) -> Result<&Block, LedgerError> {
        let block = Block::mine(self.last_block(), data, &self.config)?;
        self.chain.push(block);
        Ok(self.last_block())
    }

    pub fn is_valid_chain(candidate: &[Block], config: &LedgerConfig) -> bool {
        Self::validate_chain(candidate, config).is_ok()
    }

    /// Check genesis, hash linkage, recomputed hashes, proof-of-work and
    /// difficulty steps. Reports the first violation found.
    pub fn validate_chain(candidate: &[Block], config: &LedgerConfig) -> Result<(), ChainViolation> {
        let Some(first) = candidate.first() else {
            return Err(ChainViolation::Empty);
        };
        if *first != Block::genesis(config) {
            return Err(ChainViolation::GenesisMismatch);
        }

        for (index, pair) in candidate.windows(2).enumerate() {
            let (prev, block) = (&pair[0], &pair[1]);
            let index = index + 1;

            if block.last_hash != prev.hash {
                return Err(ChainViolation::BrokenLink { index });
            }
            match block.computed_hash() {
                Ok(hash) if hash == block.hash => {}
                _ => return Err(ChainViolation::HashMismatch { index }),
            }
            if !block.meets_difficulty() {
                return Err(ChainViolation::InsufficientWork { index });
            }
            if prev.difficulty.abs_diff(block.difficulty) > 1 {
                return Err(ChainViolation::DifficultyJump {
                    index,
                    from: prev.difficulty,
                    to: block.difficulty,
                });
            }
        }
        Ok(())
    }

    /// Every transaction carried by a non-genesis block must validate, and
    /// no block may carry the same transaction twice.
    pub fn validate_transaction_data(candidate: &[Block]) -> Result<(), ChainViolation> {
        for (index, block) in candidate.iter().enumerate().skip(1) {
            let mut seen = HashSet::new();
            for tx in block.transactions() {
                if let Err(reason) = tx.validate() {
                    return Err(ChainViolation::InvalidTransaction {
                        index,
                        id: tx.id,
                        reason,
                    });
                }
                if !seen.insert(tx.id.clone()) {
                    return Err(ChainViolation::DuplicateTransaction { index, id: tx.id });
                }
            }
        }
        Ok(())
    }

    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> ReplaceOutcome {
        self.replace_chain_with(candidate, ReplaceOptions::default())
    }

    /// Adopt `candidate` wholesale only when it is strictly longer and valid.
    pub fn replace_chain_with(
        &mut self,
        candidate: Vec<Block>,
        options: ReplaceOptions,
    ) -> ReplaceOutcome {
        if candidate.len() <= self.chain.len() {
            warn!(
                "rejected replacement: candidate length {} is not longer than {}",
                candidate.len(),
                self.chain.len()
            );
            return ReplaceOutcome::RejectedNotLonger {
                current: self.chain.len(),
                candidate: candidate.len(),
            };
        }

        let verdict = Self::validate_chain(&candidate, &self.config).and_then(|()| {
            if options.validate_transactions {
                Self::validate_transaction_data(&candidate)
            } else {
                Ok(())
            }
        });
        if let Err(violation) = verdict {
            warn!("rejected replacement: {violation}");
            return ReplaceOutcome::RejectedInvalid(violation);
        }

        info!("replacing chain with {} blocks", candidate.len());
        self.chain = candidate;
        ReplaceOutcome::Replaced {
            length: self.chain.len(),
        }
    }
}
