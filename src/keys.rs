//! Agent-key issuance and validation, and payment-memo derivation.
//!
//! An agent key is `ag_<R>_<S>` where `R` is 16 hex chars of randomness and
//! `S` is the first 16 hex chars of `HMAC(secret, R)`. The payment memo for a
//! key is `gm_` plus the first 16 hex chars of `HMAC(secret, key)`. Because
//! both are derived, the gate never stores keys or memos: any key it issued
//! validates under the current secret, and the memo a payer must quote is
//! recomputable on every request.

use crate::crypto::{constant_time_eq, hmac_sign, random_hex16};
use crate::{KEY_PREFIX, KEY_SIG_LENGTH, MAX_KEY_LENGTH, MEMO_PREFIX, MEMO_SIG_LENGTH};

/// Mint a fresh agent key under `secret`.
pub fn generate_agent_key(secret: &str) -> String {
    let random_part = random_hex16();
    let sig = hmac_sign(secret, &random_part);
    format!("{KEY_PREFIX}{random_part}_{}", &sig[..KEY_SIG_LENGTH])
}

/// Check that `key` was issued by this gate under `secret`.
///
/// Fails closed on empty input, oversized input, a missing `ag_` prefix, or a
/// missing separator. The signature tail is compared in constant time against
/// the recomputed HMAC prefix.
pub fn validate_agent_key(key: &str, secret: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH || !key.starts_with(KEY_PREFIX) {
        return false;
    }
    let rest = &key[KEY_PREFIX.len()..];
    let Some((random_part, sig)) = rest.split_once('_') else {
        return false;
    };
    let expected = hmac_sign(secret, random_part);
    constant_time_eq(sig, &expected[..KEY_SIG_LENGTH])
}

/// Derive the payment memo for an agent key. Deterministic: the same
/// `(key, secret)` pair always yields the same memo.
pub fn derive_payment_memo(key: &str, secret: &str) -> String {
    let sig = hmac_sign(secret, key);
    format!("{MEMO_PREFIX}{}", &sig[..MEMO_SIG_LENGTH])
}
