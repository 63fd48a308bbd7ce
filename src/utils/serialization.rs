// Thin layer over bincode 2.x so every caller shares one configuration
use crate::error::{BlockchainError, Result};

/// Upper bound on what a single decode may claim. Length prefixes come from peers,
/// so anything larger is rejected before bincode allocates for it.
pub const MAX_DECODE_LEN: usize = 32 * 1024 * 1024;

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration, capped at
/// [`MAX_DECODE_LEN`]. Trailing bytes after the value are rejected.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard().with_limit::<MAX_DECODE_LEN>();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(BlockchainError::Serialization(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
    struct Envelope {
        height: u32,
        payload: Vec<u8>,
        signature: Option<Vec<u8>>,
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = Envelope {
            height: 42,
            payload: b"opaque".to_vec(),
            signature: None,
        };

        let serialized = serialize(&original).expect("Serialization should work");
        let deserialized: Envelope = deserialize(&serialized).expect("Deserialization should work");

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<Envelope> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_oversized_length_prefix() {
        // varint marker for u64, then a length far beyond the decode limit
        let mut bytes = vec![42, 0xFD];
        bytes.extend_from_slice(&(1u64 << 62).to_le_bytes());
        let result: Result<Envelope> = deserialize(&bytes);
        assert!(matches!(result, Err(BlockchainError::Serialization(_))));
    }

    #[test]
    fn test_deserialize_rejects_trailing_bytes() {
        let mut bytes = serialize(&7u32).unwrap();
        bytes.push(0);
        let result: Result<u32> = deserialize(&bytes);
        assert!(matches!(result, Err(BlockchainError::Serialization(_))));
    }
}
