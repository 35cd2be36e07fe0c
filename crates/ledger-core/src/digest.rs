use crate::{constants::HASH_SIZE, LedgerError};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub type Hash = [u8; HASH_SIZE];

/// Canonical string form of a value: its compact JSON encoding.
pub fn canonical<T: Serialize + ?Sized>(value: &T) -> Result<String, LedgerError> {
    Ok(serde_json::to_string(value)?)
}

/// SHA-256 over the sorted, space-joined canonical parts.
///
/// Sorting makes the result independent of argument order: any permutation
/// of the same parts hashes identically.
pub fn digest_bytes<I, S>(parts: I) -> Hash
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parts: Vec<S> = parts.into_iter().collect();
    parts.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(part.as_ref().as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Lowercase hex of [`digest_bytes`].
pub fn crypto_hash<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hex::encode(digest_bytes(parts))
}

/// Canonicalises each argument and hashes the lot.
///
/// ```
/// let hash = ledger_core::crypto_hash!(1u64, "two", vec![3]).unwrap();
/// assert_eq!(hash.len(), 64);
/// ```
#[macro_export]
macro_rules! crypto_hash {
    ($($value:expr),+ $(,)?) => {
        [$($crate::digest::canonical(&$value)),+]
            .into_iter()
            .collect::<::std::result::Result<::std::vec::Vec<::std::string::String>, $crate::LedgerError>>()
            .map($crate::digest::crypto_hash)
    };
}
