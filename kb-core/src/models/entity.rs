use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, embedded object. `embedding` is a little-endian f32 vector whose
/// byte length must equal `4 * dimension(project)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub embedding: Vec<u8>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Encode a float embedding into the little-endian byte layout stored on disk.
    pub fn encode_embedding(values: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Decode the stored byte layout back into floats. Panics only on malformed
    /// (non-multiple-of-4) input, which should never reach this point because
    /// writers always go through `encode_embedding`.
    pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_roundtrips_exactly() {
        let original: Vec<f32> = (0..16).map(|i| i as f32 * 0.25 + 0.01).collect();
        let bytes = Entity::encode_embedding(&original);
        assert_eq!(bytes.len(), original.len() * 4);
        let restored = Entity::decode_embedding(&bytes);
        assert_eq!(original, restored);
    }
}
