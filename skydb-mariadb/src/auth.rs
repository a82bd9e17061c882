//! `mysql_native_password` challenge-response hashing.
//!
//! Ported from the original `generateMariaDbPasswordHash`/
//! `generateMariaDbPasswordHashFromSha`: hash the password, then XOR that
//! digest with `sha1(scramble || sha1(sha1(password)))`.

use sha1::{Digest, Sha1};
use skydb_core::HashKind;

fn sha1(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// `sha1(P) XOR sha1(S || sha1(sha1(P)))`.
fn hash_from_sha1(password_sha1: [u8; 20], scramble: &[u8]) -> Vec<u8> {
    let double_hashed = sha1(&password_sha1);

    let mut seeded = Vec::with_capacity(scramble.len() + double_hashed.len());
    seeded.extend_from_slice(scramble);
    seeded.extend_from_slice(&double_hashed);
    let tmp = sha1(&seeded);

    password_sha1
        .iter()
        .zip(tmp.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// Computes the auth-response bytes for a plaintext password and a given
/// hash kind. Returns an empty vec for an empty password, matching the
/// "no auth response if password empty" rule.
pub(crate) fn scramble_password(password: &str, hash_kind: HashKind, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let password_sha1 = match hash_kind {
        HashKind::Plaintext => sha1(password.as_bytes()),
        HashKind::Sha1Hex => match hex::decode(password) {
            Ok(bytes) if bytes.len() == 20 => {
                let mut decoded = [0u8; 20];
                decoded.copy_from_slice(&bytes);
                decoded
            }
            _ => sha1(password.as_bytes()),
        },
    };

    hash_from_sha1(password_sha1, scramble)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_documented_test_vector() {
        let scramble = [0u8; 20];
        let password_sha1 = sha1(b"x");

        let expected: Vec<u8> = {
            let double = sha1(&password_sha1);
            let mut seeded = Vec::new();
            seeded.extend_from_slice(&scramble);
            seeded.extend_from_slice(&double);
            let tmp = sha1(&seeded);
            password_sha1.iter().zip(tmp.iter()).map(|(a, b)| a ^ b).collect()
        };

        let actual = scramble_password("x", HashKind::Plaintext, &scramble);
        assert_eq!(actual, expected);
    }

    #[test]
    fn empty_password_produces_empty_response() {
        assert!(scramble_password("", HashKind::Plaintext, &[0u8; 20]).is_empty());
    }
}
