use crate::{
    digest::{canonical, digest_bytes},
    Block, LedgerConfig, LedgerError, Transaction,
};
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A request to move `amount` to `recipient`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient: String,
    pub amount: u64,
}

/// A secp256k1 keypair plus the balance rules it is accounted under.
///
/// The address is the hex of the compressed public key. The balance is never
/// stored: it is derived from a chain on demand.
#[derive(Clone, Debug)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: String,
    starting_balance: u64,
}

impl Wallet {
    pub fn new(config: &LedgerConfig) -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key: hex::encode(public_key.serialize()),
            starting_balance: config.starting_balance,
        }
    }

    /// Restore a wallet from a hex-encoded 32-byte secret key.
    pub fn from_secret_hex(secret_hex: &str, config: &LedgerConfig) -> Result<Self, LedgerError> {
        let bytes =
            hex::decode(secret_hex).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let public_key = secret_key.public_key(&Secp256k1::signing_only());
        Ok(Self {
            secret_key,
            public_key: hex::encode(public_key.serialize()),
            starting_balance: config.starting_balance,
        })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn address(&self) -> &str {
        &self.public_key
    }

    pub fn starting_balance(&self) -> u64 {
        self.starting_balance
    }

    pub fn balance(&self, chain: &[Block]) -> u64 {
        Self::calculate_balance(chain, self.address(), self.starting_balance)
    }

    /// Walk back from the tail summing outputs paid to `address`, stopping
    /// after the latest block in which `address` spent. Spending resets the
    /// balance to its change output, so the starting balance only counts
    /// when the address never spent. Transactions that fail validation are
    /// ignored.
    pub fn calculate_balance(chain: &[Block], address: &str, starting_balance: u64) -> u64 {
        let mut has_spent = false;
        let mut outputs_total = 0u64;

        for block in chain.iter().skip(1).rev() {
            for tx in block.transactions().into_iter().filter(Transaction::is_valid) {
                if tx.input.address == address {
                    has_spent = true;
                }
                if let Some(amount) = tx.output_map.get(address) {
                    outputs_total = outputs_total.saturating_add(*amount);
                }
            }
            if has_spent {
                break;
            }
        }

        if has_spent {
            outputs_total
        } else {
            starting_balance.saturating_add(outputs_total)
        }
    }

    /// ECDSA signature over the digest of `data`'s canonical form, as hex DER.
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, LedgerError> {
        let message = signing_message(data)?;
        let signature = Secp256k1::signing_only().sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(signature.serialize_der()))
    }

    pub fn create_transaction(
        &self,
        request: TransferRequest,
        chain: &[Block],
    ) -> Result<Transaction, LedgerError> {
        let balance = self.balance(chain);
        debug!(
            "{} sends {} to {} from balance {}",
            self.address(),
            request.amount,
            request.recipient,
            balance
        );
        Transaction::new(self, &request.recipient, request.amount, balance)
    }
}

/// True exactly when `signature` was made by the key behind `public_key`
/// over the canonical form of `data`.
pub fn verify_signature<T: Serialize + ?Sized>(public_key: &str, data: &T, signature: &str) -> bool {
    let Ok(key_bytes) = hex::decode(public_key) else {
        return false;
    };
    let Ok(key) = PublicKey::from_slice(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let Ok(message) = signing_message(data) else {
        return false;
    };
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &key)
        .is_ok()
}

fn signing_message<T: Serialize + ?Sized>(data: &T) -> Result<Message, LedgerError> {
    Ok(Message::from_digest(digest_bytes([canonical(data)?])))
}
