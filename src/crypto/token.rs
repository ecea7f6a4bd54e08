use rand::rngs::OsRng;
use rand::RngCore;

/// Raw entropy per session token (128 bits).
pub const SESSION_TOKEN_BYTES: usize = 16;

/// Generate an opaque session token: 16 bytes from the OS CSPRNG, standard base64.
pub fn generate_session_token() -> String {
    let mut raw = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);
    base64_simd::STANDARD.encode_to_string(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 24);

        let decoded = base64_simd::STANDARD.decode_to_vec(&token).unwrap();
        assert_eq!(decoded.len(), SESSION_TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
    }
}
