use rand::RngCore;

/// Bytes of entropy per nonce.
pub const NONCE_LEN: usize = 32;

/// Fresh random nonce, hex-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn nonce_is_hex_of_expected_length() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LEN * 2);
        assert!(hex::decode(&nonce).is_ok());
    }

    #[test]
    fn nonces_do_not_repeat() {
        let nonces: HashSet<_> = (0..64).map(|_| generate_nonce()).collect();
        assert_eq!(nonces.len(), 64);
    }
}
