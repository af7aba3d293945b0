//! Payloads exchanged between the authoritative and mirror devices
//!
//! Every payload on the link is a CBOR map tagged by `type`. The collection
//! itself is carried as JSON bytes, the same encoding the local store uses,
//! so optional fields can be added without breaking older mirrors.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::WorkoutGroup;

/// Errors encoding or decoding payloads
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Failed to encode payload: {0}")]
    Encode(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Invalid workout collection: {0}")]
    Collection(#[from] serde_json::Error),
}

/// A payload sent over the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncPayload {
    /// Full snapshot of the workout collection
    #[serde(rename = "workoutGroups")]
    Collection {
        /// Sending session; a restarted sender gets a new one
        origin: Uuid,
        /// Ordering key within one origin; higher is newer
        sequence: u64,
        /// JSON-encoded `Vec<WorkoutGroup>`
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },

    /// A single named image
    #[serde(rename = "asset")]
    Asset {
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
}

impl SyncPayload {
    /// Build a collection payload from groups
    pub fn collection(
        origin: Uuid,
        sequence: u64,
        groups: &[WorkoutGroup],
    ) -> Result<Self, PayloadError> {
        Ok(SyncPayload::Collection {
            origin,
            sequence,
            data: encode_collection(groups)?,
        })
    }

    /// Build an asset payload
    pub fn asset(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        SyncPayload::Asset {
            file_name: file_name.into(),
            data,
        }
    }

    /// Short name of the payload kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncPayload::Collection { .. } => "collection",
            SyncPayload::Asset { .. } => "asset",
        }
    }

    /// Encode payload to CBOR bytes
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| PayloadError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// Decode payload from CBOR bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        ciborium::from_reader(bytes).map_err(|e| PayloadError::Decode(e.to_string()))
    }
}

/// Encode the collection as JSON
pub fn encode_collection(groups: &[WorkoutGroup]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(groups)
}

/// Decode a JSON collection, rejecting duplicate group ids
pub fn decode_collection(bytes: &[u8]) -> Result<Vec<WorkoutGroup>, serde_json::Error> {
    let groups: Vec<WorkoutGroup> = serde_json::from_slice(bytes)?;

    for (i, group) in groups.iter().enumerate() {
        if groups[..i].iter().any(|g| g.id == group.id) {
            return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "duplicate group id {}",
                group.id
            )));
        }
    }

    Ok(groups)
}
