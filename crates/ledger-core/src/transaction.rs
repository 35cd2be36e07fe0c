use crate::{
    block::now_millis,
    wallet::{verify_signature, Wallet},
    LedgerError, TransactionViolation,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Recipient address to allocated amount. Sorted so its canonical form is stable.
pub type OutputMap = BTreeMap<String, u64>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub timestamp: u64,
    /// Sender's balance when the transaction was created.
    pub amount: u64,
    pub address: String,
    /// Hex DER signature over the output map.
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub output_map: OutputMap,
    pub input: TransactionInput,
}

impl Transaction {
    /// Pay `amount` to `recipient` out of `balance`, returning the rest to the sender.
    pub fn new(
        sender: &Wallet,
        recipient: &str,
        amount: u64,
        balance: u64,
    ) -> Result<Self, LedgerError> {
        if amount > balance {
            return Err(LedgerError::InsufficientFunds { amount, balance });
        }
        let mut output_map = OutputMap::new();
        output_map.insert(sender.address().to_string(), balance - amount);
        *output_map.entry(recipient.to_string()).or_insert(0) += amount;

        let input = signed_input(sender, &output_map, balance)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            output_map,
            input,
        })
    }

    /// A copy of this transaction that also sends `amount` to `recipient`
    /// out of the sender's remaining change, signed afresh.
    pub fn with_transfer(
        &self,
        sender: &Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<Self, LedgerError> {
        if sender.address() != self.input.address {
            return Err(LedgerError::ForeignTransaction {
                id: self.id.clone(),
                address: sender.address().to_string(),
            });
        }
        let change = self.output_map.get(sender.address()).copied().unwrap_or(0);
        if amount > change {
            return Err(LedgerError::InsufficientFunds {
                amount,
                balance: change,
            });
        }

        let mut output_map = self.output_map.clone();
        output_map.insert(sender.address().to_string(), change - amount);
        let credited = output_map.entry(recipient.to_string()).or_insert(0);
        *credited = credited
            .checked_add(amount)
            .ok_or_else(|| LedgerError::OutputOverflow {
                recipient: recipient.to_string(),
            })?;

        let input = signed_input(sender, &output_map, self.input.amount)?;
        Ok(Self {
            id: self.id.clone(),
            output_map,
            input,
        })
    }

    pub fn validate(&self) -> Result<(), TransactionViolation> {
        let actual = self
            .output_map
            .values()
            .try_fold(0u64, |acc, v| acc.checked_add(*v));
        if actual != Some(self.input.amount) {
            return Err(TransactionViolation::OutputTotalMismatch {
                expected: self.input.amount,
                actual,
            });
        }
        if !verify_signature(&self.input.address, &self.output_map, &self.input.signature) {
            return Err(TransactionViolation::BadSignature);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn signed_input(
    sender: &Wallet,
    output_map: &OutputMap,
    amount: u64,
) -> Result<TransactionInput, LedgerError> {
    Ok(TransactionInput {
        timestamp: now_millis(),
        amount,
        address: sender.address().to_string(),
        signature: sender.sign(output_map)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedgerConfig;

    fn sender() -> Wallet {
        Wallet::new(&LedgerConfig::default())
    }

    #[test]
    fn new_splits_balance_between_recipient_and_change() {
        let wallet = sender();
        let tx = Transaction::new(&wallet, "recipient-public-key", 50, 1_000).unwrap();

        assert_eq!(tx.output_map["recipient-public-key"], 50);
        assert_eq!(tx.output_map[wallet.address()], 950);
        assert_eq!(tx.output_map.len(), 2);
        assert_eq!(tx.input.amount, 1_000);
        assert_eq!(tx.input.address, wallet.public_key());
        assert!(tx.input.timestamp > 0);
        assert!(Uuid::parse_str(&tx.id).is_ok());
        assert!(verify_signature(
            wallet.public_key(),
            &tx.output_map,
            &tx.input.signature
        ));
    }

    #[test]
    fn new_rejects_amount_over_balance() {
        let err = Transaction::new(&sender(), "foo", 1_001, 1_000).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                amount: 1_001,
                balance: 1_000
            }
        ));
    }

    #[test]
    fn self_transfer_keeps_outputs_balanced() {
        let wallet = sender();
        let tx = Transaction::new(&wallet, wallet.address(), 40, 100).unwrap();
        assert_eq!(tx.output_map.len(), 1);
        assert_eq!(tx.output_map[wallet.address()], 100);
        assert!(tx.is_valid());
    }

    #[test]
    fn valid_transaction_passes() {
        let tx = Transaction::new(&sender(), "foo", 50, 1_000).unwrap();
        assert_eq!(tx.validate(), Ok(()));
    }

    #[test]
    fn inflated_output_is_rejected() {
        let wallet = sender();
        let mut tx = Transaction::new(&wallet, "foo", 50, 1_000).unwrap();
        tx.output_map.insert(wallet.address().to_string(), 999_999);
        assert_eq!(
            tx.validate(),
            Err(TransactionViolation::OutputTotalMismatch {
                expected: 1_000,
                actual: Some(1_000_049),
            })
        );
    }

    #[test]
    fn overflowing_outputs_are_rejected() {
        let mut tx = Transaction::new(&sender(), "foo", 50, 1_000).unwrap();
        tx.output_map.insert("bar".into(), u64::MAX);
        assert!(matches!(
            tx.validate(),
            Err(TransactionViolation::OutputTotalMismatch { actual: None, .. })
        ));
    }

    #[test]
    fn forged_signature_is_rejected() {
        let mut tx = Transaction::new(&sender(), "foo", 50, 1_000).unwrap();
        tx.input.signature = sender().sign(&tx.output_map).unwrap();
        assert_eq!(tx.validate(), Err(TransactionViolation::BadSignature));
    }

    #[test]
    fn with_transfer_adds_recipient_and_resigns() {
        let wallet = sender();
        let original = Transaction::new(&wallet, "foo", 50, 1_000).unwrap();
        let updated = original.with_transfer(&wallet, "bar", 25).unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.output_map["foo"], 50);
        assert_eq!(updated.output_map["bar"], 25);
        assert_eq!(updated.output_map[wallet.address()], 925);
        assert_ne!(updated.input.signature, original.input.signature);
        assert!(updated.is_valid());

        // The original value is untouched.
        assert_eq!(original.output_map.len(), 2);
        assert_eq!(original.output_map[wallet.address()], 950);
        assert!(original.is_valid());
    }

    #[test]
    fn with_transfer_accumulates_same_recipient() {
        let wallet = sender();
        let tx = Transaction::new(&wallet, "foo", 50, 1_000)
            .and_then(|tx| tx.with_transfer(&wallet, "foo", 30))
            .unwrap();
        assert_eq!(tx.output_map["foo"], 80);
        assert_eq!(tx.output_map[wallet.address()], 920);
        assert!(tx.is_valid());
    }

    #[test]
    fn with_transfer_rejects_amount_over_change() {
        let wallet = sender();
        let tx = Transaction::new(&wallet, "foo", 50, 1_000).unwrap();
        let err = tx.with_transfer(&wallet, "bar", 951).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                amount: 951,
                balance: 950
            }
        ));
    }

    #[test]
    fn with_transfer_rejects_overflowing_output() {
        let wallet = sender();
        let mut tx = Transaction::new(&wallet, "foo", 50, 1_000).unwrap();
        tx.output_map.insert("bar".into(), u64::MAX);
        let err = tx.with_transfer(&wallet, "bar", 1).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OutputOverflow { ref recipient } if recipient == "bar"
        ));
        assert_eq!(tx.output_map["bar"], u64::MAX);
    }

    #[test]
    fn with_transfer_rejects_other_sender() {
        let tx = Transaction::new(&sender(), "foo", 50, 1_000).unwrap();
        let err = tx.with_transfer(&sender(), "bar", 1).unwrap_err();
        assert!(matches!(err, LedgerError::ForeignTransaction { .. }));
    }

    #[test]
    fn json_shape() {
        let tx = Transaction::new(&sender(), "foo", 50, 1_000).unwrap();
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("outputMap").is_some());
        let input = json.get("input").unwrap();
        for key in ["timestamp", "amount", "address", "signature"] {
            assert!(input.get(key).is_some(), "missing input.{key}");
        }
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
