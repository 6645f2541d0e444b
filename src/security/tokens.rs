//! One-time secrets: verification links, reset links, OTP codes, wallet
//! numbers and public ids.
//!
//! Secrets are handed to the user in clear and stored as SHA-256 hex, the
//! same way API keys are hashed before lookup.

use rand::Rng;
use sha2::{Digest, Sha256};

/// 32 random bytes, hex encoded.
pub fn generate_link_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Six digit numeric code for two-factor login.
pub fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Customer-facing wallet number, 10 to 12 digits with no leading zero.
pub fn generate_wallet_number() -> String {
    let mut rng = rand::rng();
    let len = rng.random_range(10..=12usize);
    let mut number = String::with_capacity(len);
    number.push(char::from(b'1' + rng.random_range(0..9u8)));
    for _ in 1..len {
        number.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    number
}

/// Short numeric identity shown to users and support staff.
pub fn generate_public_user_id() -> i64 {
    rand::rng().random_range(1_000_000..10_000_000i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn wallet_numbers_are_10_to_12_digits() {
        for _ in 0..200 {
            let number = generate_wallet_number();
            assert!((10..=12).contains(&number.len()), "{number}");
            assert!(number.chars().all(|c| c.is_ascii_digit()));
            assert!(!number.starts_with('0'));
        }
    }

    #[test]
    fn hash_is_stable_and_hides_token() {
        let token = generate_link_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert_eq!(hash_token(" abc "), hash_token("abc"));
    }

    #[test]
    fn public_id_has_seven_digits() {
        let id = generate_public_user_id();
        assert!((1_000_000..10_000_000).contains(&id));
    }
}
