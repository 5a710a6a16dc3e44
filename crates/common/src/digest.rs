//! Hash helpers for storage keys.

use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

/// Lowercase hex SHA-512, used to key tokens without storing them as keys.
pub fn sha512_hex(input: &str) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

/// Deterministic GUID for a string.
///
/// The first 16 bytes of SHA-256 are read in little-endian GUID layout, so
/// the text form matches what a GUID built from the same bytes prints as.
pub fn string_to_guid(input: &str) -> Uuid {
    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    Uuid::from_bytes_le(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha512_is_hex_encoded() {
        let h = sha512_hex("abc");
        assert_eq!(h.len(), 128);
        assert!(h.starts_with("ddaf35a193617aba"));
    }

    #[test]
    fn guid_is_deterministic() {
        let a = string_to_guid("judge-team-kind");
        assert_eq!(a, string_to_guid("judge-team-kind"));
        assert_ne!(a, string_to_guid("judge-team-kind2"));
        assert_eq!(a.to_string().len(), 36);
    }
}
