use rand::Rng;
use sha2::{Digest, Sha256};

/// OTP validity window in seconds
pub const OTP_EXPIRY_SECONDS: i64 = 300;

/// Hard lockout threshold for wrong-code attempts
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Trim and lowercase an email before any comparison or storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generate a 6-digit OTP code over the full 000000-999999 space,
/// zero-padded to fixed width. ThreadRng is a CSPRNG.
pub fn generate_otp_code() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(0..1_000_000);
    format!("{:06}", code)
}

/// SHA-256 hex digest of an OTP code. Only the digest is ever persisted.
pub fn hash_otp(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Well-formed OTP submissions are exactly six ASCII digits
pub fn is_valid_otp_format(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
        assert_eq!(normalize_email("plain@host.io"), "plain@host.io");
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()), "code {}", code);
        }
    }

    #[test]
    fn hash_is_deterministic_hex_sha256() {
        let a = hash_otp("000042");
        let b = hash_otp("000042");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_otp("000043"));
    }

    #[test]
    fn otp_format_check() {
        assert!(is_valid_otp_format("000000"));
        assert!(is_valid_otp_format("999999"));
        assert!(!is_valid_otp_format("12345"));
        assert!(!is_valid_otp_format("1234567"));
        assert!(!is_valid_otp_format("12a456"));
        assert!(!is_valid_otp_format(""));
    }
}
