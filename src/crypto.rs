//! HMAC-SHA256 signing and timing-safe comparison.
//!
//! Every signature in the gate protocol (agent keys, payment memos, cookies,
//! nonces) goes through [`hmac_sign`], and every signature check goes through
//! [`constant_time_eq`]. No other module compares signature bytes directly.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `data` keyed with `secret`, as 64 lowercase hex chars.
///
/// Callers slice the result when a protocol field carries a truncated
/// signature; this function never truncates.
pub fn hmac_sign(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Timing-safe string equality.
///
/// Inputs of different length never match; equal-length inputs are compared
/// without short-circuiting on a shared prefix.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// 16 lowercase hex chars of cryptographically strong randomness.
pub fn random_hex16() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
