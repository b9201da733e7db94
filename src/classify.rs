//! Request classification.
//!
//! The classifier applies the gate's decision rules in strict order and
//! returns a [`Decision`] the gate routes on. It never consults the secret:
//! cookie and key validity are checked by the flows, so classification stays
//! a pure function of the request and the public-path allowlist.

use http::Method;

use crate::request::GateRequest;
use crate::{AGENT_KEY_HEADER, CHALLENGE_VERIFY_PATH, COOKIE_NAME, MAX_KEY_LENGTH};

/// Where a request goes next. First matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Public path: pass straight through to the application.
    PublicPath,
    /// POST to the challenge verification endpoint.
    ChallengeVerify,
    /// Non-browser request without an agent key.
    AgentNoKey,
    /// Non-browser request presenting this key (truncated to the limit).
    AgentWithKey(String),
    /// Browser request carrying this cookie value (validity unchecked).
    BrowserCookie(String),
    /// Browser request with no challenge cookie.
    BrowserNoCookie,
}

/// Classify a request against the rules in order:
///
/// 1. `/robots.txt`, `/.well-known/*`, or an allowlisted exact path.
/// 2. POST `/__challenge/verify`. Other methods on that path fall through.
/// 3. Browser iff `Sec-Fetch-Mode` or `Sec-Fetch-Dest` is present.
/// 4. Agents split on the presence of a non-empty `X-Agent-Key`.
/// 5. Browsers split on the presence of the challenge cookie.
pub fn classify(req: &GateRequest, public_paths: &[String]) -> Decision {
    if is_public_path(req.path(), public_paths) {
        return Decision::PublicPath;
    }

    if req.method() == Method::POST && req.path() == CHALLENGE_VERIFY_PATH {
        return Decision::ChallengeVerify;
    }

    if !is_browser(req) {
        return match req.header(AGENT_KEY_HEADER) {
            Some(key) if !key.is_empty() => {
                Decision::AgentWithKey(clip(key, MAX_KEY_LENGTH).to_string())
            }
            _ => Decision::AgentNoKey,
        };
    }

    match req.cookie(COOKIE_NAME) {
        Some(value) if !value.is_empty() => Decision::BrowserCookie(value),
        _ => Decision::BrowserNoCookie,
    }
}

/// Public paths bypass the gate for any method and any caller.
pub fn is_public_path(path: &str, allowlist: &[String]) -> bool {
    path == "/robots.txt"
        || path.starts_with("/.well-known/")
        || allowlist.iter().any(|p| p == path)
}

/// A request counts as a browser iff it carries either `Sec-Fetch-Mode` or
/// `Sec-Fetch-Dest`, with any value. Real browsers always send these on
/// navigations; plain HTTP clients do not.
fn is_browser(req: &GateRequest) -> bool {
    req.has_header("sec-fetch-mode") || req.has_header("sec-fetch-dest")
}

/// Truncate to at most `max` bytes without splitting a character.
pub(crate) fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
