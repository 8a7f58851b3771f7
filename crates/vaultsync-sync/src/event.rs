//! Records and remote events.
//!
//! A local write becomes a [`Record`], sealed under the vault master key.
//! The sealed bytes travel to the remote as a [`PushedEvent`] and come back
//! from it as an [`Event`] with a remote-assigned index. The remote never
//! sees record contents.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use vaultsync_core::{EventNonce, SecretKey};

use crate::error::{Result, SyncError};

/// A document write: `data` of `None` deletes the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub path: String,
    pub data: Option<Bytes>,
}

impl Record {
    pub fn set(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: Some(data.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }

    /// Encode and seal. The seal nonce becomes the event nonce.
    pub fn seal(&self, key: &SecretKey) -> Result<Vec<u8>> {
        let plaintext = to_cbor(self)?;
        Ok(key.seal(&plaintext)?)
    }

    /// Open sealed bytes.
    pub fn open(sealed: &[u8], key: &SecretKey) -> Result<Self> {
        let plaintext = key.open(sealed)?;
        from_cbor(&plaintext)
    }
}

/// An event as sent to the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedEvent {
    /// Sealed record.
    pub data: Bytes,
    pub nonce: EventNonce,
}

impl PushedEvent {
    /// Wrap sealed record bytes. Fails if they are too short to carry a nonce.
    pub fn from_sealed(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let nonce = EventNonce::from_sealed(&data)
            .ok_or_else(|| SyncError::Serialization("sealed record too short".into()))?;
        Ok(Self { data, nonce })
    }
}

/// An event as stored and served by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Sealed record.
    pub data: Bytes,
    pub nonce: EventNonce,
    /// Remote-assigned position, from 1, strictly increasing per vault.
    pub index: i64,
    /// Remote clock at acceptance (Unix ms).
    pub timestamp: i64,
}

/// One page of a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Events after the requested index, ascending.
    pub events: Vec<Event>,
    /// Index of the last event returned, or the requested index if none.
    pub index: i64,
    /// More events are available past `index`.
    pub truncated: bool,
}

/// Encode a value as CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| SyncError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR value.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| SyncError::Serialization(e.to_string()))
}
