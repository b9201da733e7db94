//! Signed cookie and nonce formats.
//!
//! Both carry the issue time so expiry needs no server-side state:
//!
//! - cookie value: `<ms>.<HMAC(secret, ms)>`, valid 24 h
//! - nonce: `<ms>.<HMAC(secret, "nonce:" + ms)>`, valid 5 min
//!
//! The `nonce:` domain prefix keeps a captured nonce from being replayed as a
//! cookie value.

use chrono::Utc;

use crate::crypto::{constant_time_eq, hmac_sign};
use crate::{COOKIE_MAX_AGE_MS, COOKIE_MAX_AGE_SECS, COOKIE_NAME, NONCE_MAX_AGE_MS};

/// Current wall-clock time in milliseconds since the epoch.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Mint a cookie value proving the browser solved the challenge just now.
pub fn mint_cookie(secret: &str) -> String {
    let ts = now_ms().to_string();
    let sig = hmac_sign(secret, &ts);
    format!("{ts}.{sig}")
}

/// The full `Set-Cookie` header value for a freshly minted cookie.
pub fn set_cookie_header(secret: &str) -> String {
    format!(
        "{COOKIE_NAME}={}; Max-Age={COOKIE_MAX_AGE_SECS}; Path=/; HttpOnly; Secure; SameSite=Lax",
        mint_cookie(secret)
    )
}

/// Validate a cookie value: well-formed, at most 24 h old, not from the
/// future, signature intact.
pub fn validate_cookie_value(value: &str, secret: &str) -> bool {
    let Some((ts_str, sig)) = value.split_once('.') else {
        return false;
    };
    let Ok(ts) = ts_str.parse::<i64>() else {
        return false;
    };
    let age = now_ms() - ts;
    if age < 0 || age > COOKIE_MAX_AGE_MS {
        return false;
    }
    constant_time_eq(sig, &hmac_sign(secret, ts_str))
}

/// Mint a nonce for embedding in the challenge page.
pub fn mint_nonce(secret: &str) -> String {
    let ts = now_ms().to_string();
    let sig = hmac_sign(secret, &format!("nonce:{ts}"));
    format!("{ts}.{sig}")
}

/// Outcome of checking a submitted nonce. The challenge verify endpoint maps
/// each variant to a distinct 403 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    /// Nonce is current and correctly signed.
    Ok,
    /// Missing separator or non-numeric timestamp.
    Malformed,
    /// Timestamp older than the 5-minute window.
    Expired,
    /// Signature does not match.
    BadSignature,
}

/// Classify a submitted nonce.
pub fn check_nonce(nonce: &str, secret: &str) -> NonceCheck {
    let Some((ts_str, sig)) = nonce.split_once('.') else {
        return NonceCheck::Malformed;
    };
    let Ok(ts) = ts_str.parse::<i64>() else {
        return NonceCheck::Malformed;
    };
    if now_ms() - ts > NONCE_MAX_AGE_MS {
        return NonceCheck::Expired;
    }
    if !constant_time_eq(sig, &hmac_sign(secret, &format!("nonce:{ts_str}"))) {
        return NonceCheck::BadSignature;
    }
    NonceCheck::Ok
}

/// Convenience predicate over [`check_nonce`].
pub fn validate_nonce(nonce: &str, secret: &str) -> bool {
    check_nonce(nonce, secret) == NonceCheck::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_fresh_cookie_validates() {
        let cookie = mint_cookie(SECRET);
        assert!(validate_cookie_value(&cookie, SECRET));
    }

    #[test]
    fn test_cookie_wrong_secret_rejected() {
        let cookie = mint_cookie(SECRET);
        assert!(!validate_cookie_value(&cookie, "other-secret"));
    }

    #[test]
    fn test_expired_cookie_rejected() {
        let old_ts = (now_ms() - COOKIE_MAX_AGE_MS - 1).to_string();
        let stale = format!("{old_ts}.{}", hmac_sign(SECRET, &old_ts));
        assert!(!validate_cookie_value(&stale, SECRET));
    }

    #[test]
    fn test_future_cookie_rejected() {
        let future_ts = (now_ms() + 60_000).to_string();
        let forged = format!("{future_ts}.{}", hmac_sign(SECRET, &future_ts));
        assert!(!validate_cookie_value(&forged, SECRET));
    }

    #[test]
    fn test_garbage_cookie_rejected() {
        assert!(!validate_cookie_value("", SECRET));
        assert!(!validate_cookie_value("no-separator", SECRET));
        assert!(!validate_cookie_value("notanumber.abcdef", SECRET));
    }

    #[test]
    fn test_cookie_mutation_rejected() {
        let cookie = mint_cookie(SECRET);
        for i in 0..cookie.len() {
            let mut bytes = cookie.as_bytes().to_vec();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(bytes).unwrap();
            if mutated != cookie {
                assert!(!validate_cookie_value(&mutated, SECRET), "mutation at {i} accepted");
            }
        }
    }

    #[test]
    fn test_set_cookie_attributes() {
        let header = set_cookie_header(SECRET);
        assert!(header.starts_with("__agp_verified="));
        assert!(header.contains("Max-Age=86400"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
    }

    #[test]
    fn test_fresh_nonce_validates() {
        let nonce = mint_nonce(SECRET);
        assert_eq!(check_nonce(&nonce, SECRET), NonceCheck::Ok);
        assert!(validate_nonce(&nonce, SECRET));
    }

    #[test]
    fn test_nonce_is_not_a_cookie() {
        // Same wire shape, different HMAC domain.
        let nonce = mint_nonce(SECRET);
        assert!(!validate_cookie_value(&nonce, SECRET));
        let cookie = mint_cookie(SECRET);
        assert_eq!(check_nonce(&cookie, SECRET), NonceCheck::BadSignature);
    }

    #[test]
    fn test_expired_nonce() {
        let old_ts = (now_ms() - NONCE_MAX_AGE_MS - 1).to_string();
        let stale = format!("{old_ts}.{}", hmac_sign(SECRET, &format!("nonce:{old_ts}")));
        assert_eq!(check_nonce(&stale, SECRET), NonceCheck::Expired);
    }

    #[test]
    fn test_malformed_nonce() {
        assert_eq!(check_nonce("", SECRET), NonceCheck::Malformed);
        assert_eq!(check_nonce("12345", SECRET), NonceCheck::Malformed);
        assert_eq!(check_nonce("abc.def", SECRET), NonceCheck::Malformed);
    }

    #[test]
    fn test_tampered_nonce_signature() {
        let nonce = mint_nonce(SECRET);
        let flip = if nonce.ends_with('0') { '1' } else { '0' };
        let tampered = format!("{}{flip}", &nonce[..nonce.len() - 1]);
        assert_eq!(check_nonce(&tampered, SECRET), NonceCheck::BadSignature);
    }
}
