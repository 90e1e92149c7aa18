use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to encode progress snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persisted progression state.
///
/// Wire format is a JSON object
/// `{ "currentSceneIndex", "gameState", "timestamp", "tableFingerprint"? }`.
/// Missing or `null` index/state fields default to `0`/`{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_scene_index: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub game_state: Map<String, Value>,
    /// Milliseconds since the Unix epoch at write time.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_fingerprint: Option<String>,
}

impl ProgressSnapshot {
    pub fn to_json(&self) -> Result<String, ProgressError> {
        serde_json::to_string(self).map_err(ProgressError::Encode)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
