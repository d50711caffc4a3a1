//! Content hashing for asset cache keys and deterministic seeds.

use sha2::{Digest, Sha256};

/// A SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Hash a sequence of string fields, length-prefixed so that `["ab", "c"]`
/// and `["a", "bc"]` produce different digests.
pub fn hash_fields(fields: &[&str]) -> ContentHash {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    ContentHash {
        bytes: hasher.finalize().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = hash_fields(&["pexels", "sunrise"]);
        assert_eq!(a, hash_fields(&["pexels", "sunrise"]));
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_hash_fields_are_delimited() {
        assert_ne!(hash_fields(&["ab", "c"]), hash_fields(&["a", "bc"]));
    }
}
