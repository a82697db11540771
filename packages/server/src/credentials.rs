//! Password hashing: PBKDF2-HMAC-SHA256 with a per-user random salt.
//!
//! Salt and digest are stored base64-encoded. The iteration count is not
//! stored alongside them, so it must stay fixed for a deployment or every
//! existing password stops verifying.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;

/// A salt + derived digest pair, both base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub salt: String,
    pub hash: String,
}

/// Derive the 256-bit PBKDF2-HMAC-SHA256 digest of `password`.
pub fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Hash a new password with a fresh salt.
pub fn hash_password(password: &str, iterations: u32) -> PasswordHash {
    let salt = generate_salt();
    let digest = derive(password, &salt, iterations);
    PasswordHash {
        salt: B64.encode(salt),
        hash: B64.encode(digest),
    }
}

/// Check `password` against a stored salt/hash pair.
///
/// The whole digest is compared in constant time. A stored value that is
/// not valid base64 simply fails verification.
pub fn verify(password: &str, stored: &PasswordHash, iterations: u32) -> bool {
    let (Ok(salt), Ok(expected)) = (B64.decode(&stored.salt), B64.decode(&stored.hash)) else {
        return false;
    };
    let got = derive(password, &salt, iterations);
    got.as_slice().ct_eq(expected.as_slice()).into()
}

/// A salt/hash pair no password derives to: the "hash" is random bytes.
pub fn unusable_password() -> PasswordHash {
    let mut hash = [0u8; HASH_LEN];
    rand::rngs::OsRng.fill_bytes(&mut hash);
    PasswordHash {
        salt: B64.encode(generate_salt()),
        hash: B64.encode(hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITER: u32 = 1_000;

    #[test]
    fn known_answer_vector() {
        // RFC 7914 §11 PBKDF2-HMAC-SHA256 test vector (c = 1, dkLen = 64), first 32 bytes.
        let out = derive("passwd", b"salt", 1);
        assert_eq!(
            hex::encode(out),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("secret1", ITER);
        assert!(verify("secret1", &stored, ITER));
    }

    #[test]
    fn hash_is_not_the_plaintext() {
        let stored = hash_password("secret1", ITER);
        assert_ne!(stored.hash, "secret1");
        assert_ne!(B64.decode(&stored.hash).unwrap(), b"secret1".to_vec());
    }

    #[test]
    fn any_single_byte_change_fails() {
        let password = "secret1";
        let stored = hash_password(password, ITER);
        for i in 0..password.len() {
            let mut bytes = password.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let altered = String::from_utf8(bytes).unwrap();
            assert!(!verify(&altered, &stored, ITER), "altered byte {i} verified");
        }
    }

    #[test]
    fn iteration_count_must_match() {
        let stored = hash_password("secret1", ITER);
        assert!(!verify("secret1", &stored, ITER + 1));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("secret1", ITER);
        let b = hash_password("secret1", ITER);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn malformed_stored_value_fails_closed() {
        let stored = PasswordHash {
            salt: "***".into(),
            hash: "***".into(),
        };
        assert!(!verify("anything", &stored, ITER));
    }

    #[test]
    fn unusable_password_rejects_empty_input() {
        let stored = unusable_password();
        assert!(!verify("", &stored, ITER));
    }
}
