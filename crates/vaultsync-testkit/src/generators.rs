//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vaultsync_core::{Keypair, Nonce, SecretKey};
use vaultsync_sync::Record;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random master key.
pub fn secret_key() -> impl Strategy<Value = SecretKey> {
    any::<[u8; 32]>().prop_map(SecretKey::from_bytes)
}

/// Generate a random request nonce.
pub fn nonce() -> impl Strategy<Value = Nonce> {
    any::<[u8; 32]>().prop_map(Nonce::from_bytes)
}

/// Generate an HTTP method.
pub fn method() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("GET"),
        Just("POST"),
        Just("PUT"),
        Just("DELETE"),
        Just("HEAD"),
    ]
}

/// Generate query parameters, never `nonce` or `ts`.
pub fn query_params(max: usize) -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-m][a-z]{0,5}", "[a-zA-Z0-9]{0,8}"), 0..=max)
}

/// Generate a document path outside the sync collections.
pub fn doc_path() -> impl Strategy<Value = String> {
    ("(notes|docs|items)", "[a-z0-9]{1,8}").prop_map(|(col, key)| format!("/{}/{}", col, key))
}

/// Generate document bytes of at most `max_len`.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a set or delete record.
pub fn record() -> impl Strategy<Value = Record> {
    prop_oneof![
        3 => (doc_path(), payload(64)).prop_map(|(path, data)| Record::set(path, data)),
        1 => doc_path().prop_map(Record::delete),
    ]
}

/// A local vault write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set(String, Vec<u8>),
    Delete(String),
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Set(path, _) | WriteOp::Delete(path) => path,
        }
    }
}

impl Arbitrary for WriteOp {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            3 => (doc_path(), payload(32)).prop_map(|(p, d)| WriteOp::Set(p, d)),
            1 => doc_path().prop_map(WriteOp::Delete),
        ]
        .boxed()
    }
}

/// Generate a sequence of writes.
pub fn write_ops(max: usize) -> impl Strategy<Value = Vec<WriteOp>> {
    prop::collection::vec(any::<WriteOp>(), 0..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsync_store::path;
    use vaultsync_sync::log::is_reserved;

    proptest! {
        #[test]
        fn doc_paths_are_normalized_and_unreserved(p in doc_path()) {
            prop_assert_eq!(path::normalize(&p).unwrap(), p.clone());
            prop_assert!(!is_reserved(&p));
        }

        #[test]
        fn records_open_only_under_their_key(rec in record(), key in secret_key(), other in secret_key()) {
            prop_assume!(key != other);
            let sealed = rec.seal(&key).unwrap();
            prop_assert!(Record::open(&sealed, &other).is_err());
            prop_assert_eq!(Record::open(&sealed, &key).unwrap(), rec);
        }
    }
}
