//! # agentpayments-gate: payment gating for agent traffic
//!
//! This crate implements an HTTP gate that sits in front of a web application
//! and classifies every request as one of three kinds:
//!
//! - **Public passthrough**: `/robots.txt`, `/.well-known/*` and configured
//!   allowlist paths are never gated.
//! - **Human browser**: requests carrying `Sec-Fetch-Mode`/`Sec-Fetch-Dest`
//!   are served a JavaScript challenge; solving it mints a signed cookie.
//! - **Automated agent**: everything else must present an agent key via the
//!   `X-Agent-Key` header, backed by an on-chain USDC payment.
//!
//! ## Flow
//!
//! 1. **First agent request**: the gate mints a fresh agent key and returns
//!    HTTP 402 with the key, the merchant wallet, and a payment memo derived
//!    from the key.
//! 2. **Payment**: the client sends USDC on Solana to the wallet with the
//!    memo attached.
//! 3. **Retry**: the client repeats the request with `X-Agent-Key`; the gate
//!    asks the verify service whether the memo has been paid, caches the
//!    positive answer, and passes the request through.
//!
//! All tokens (keys, memos, cookies, nonces) are HMAC-SHA256 signed with the
//! gate's `CHALLENGE_SECRET`; nothing is persisted server-side, so the gate
//! stays stateless across keys and survives restarts with only a warm-up cost.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use agentpayments_gate::{Gate, GateConfig, middleware::GateLayer};
//! use axum::{routing::get, Router};
//!
//! let config = GateConfig::from_env()?;
//! let gate = Gate::new(config);
//!
//! let app = Router::new()
//!     .route("/data", get(handler))
//!     .layer(GateLayer::new(gate));
//! ```
//!
//! The core never touches the host framework: it consumes a [`GateRequest`]
//! and produces a [`GateOutcome`]. `middleware` (behind the `axum-middleware`
//! feature) is the bundled tower adapter; other hosts only need to satisfy
//! the same bridge.

pub mod cache;
pub mod challenge;
pub mod classify;
pub mod config;
pub mod cookies;
pub mod crypto;
pub mod error;
pub mod gate;
pub mod keys;
pub mod ratelimit;
pub mod request;
pub mod verify_client;

#[cfg(feature = "axum-middleware")]
pub mod middleware;

pub use cache::{MerchantConfigCache, PaymentCache};
pub use classify::{classify, Decision};
pub use config::{GateConfig, GateConfigBuilder, MerchantConfig, SolanaNetwork};
pub use error::{GateError, GateResult};
pub use gate::Gate;
pub use ratelimit::RateLimiter;
pub use request::{GateOutcome, GateRequest, GateResponse};
pub use verify_client::VerifyClient;

use std::time::Duration;

/// Prefix of every agent key issued by the gate.
pub const KEY_PREFIX: &str = "ag_";

/// Hex characters of randomness in an agent key.
pub const KEY_RANDOM_LENGTH: usize = 16;

/// Hex characters of HMAC signature carried in an agent key.
pub const KEY_SIG_LENGTH: usize = 16;

/// Agent keys longer than this are rejected outright.
pub const MAX_KEY_LENGTH: usize = 64;

/// Prefix of every derived payment memo.
pub const MEMO_PREFIX: &str = "gm_";

/// Hex characters of HMAC signature carried in a payment memo.
pub const MEMO_SIG_LENGTH: usize = 16;

/// Header an agent presents its key in.
pub const AGENT_KEY_HEADER: &str = "x-agent-key";

/// Name of the cookie minted after a solved browser challenge.
pub const COOKIE_NAME: &str = "__agp_verified";

/// Cookie lifetime in seconds (the `Max-Age` attribute).
pub const COOKIE_MAX_AGE_SECS: i64 = 86_400;

/// Cookie validity window in milliseconds.
pub const COOKIE_MAX_AGE_MS: i64 = 86_400_000;

/// Challenge nonce validity window in milliseconds.
pub const NONCE_MAX_AGE_MS: i64 = 300_000;

/// Path the challenge page posts back to.
pub const CHALLENGE_VERIFY_PATH: &str = "/__challenge/verify";

/// Form field limits on the challenge verify endpoint. Longer values are
/// truncated, never rejected.
pub const MAX_NONCE_LENGTH: usize = 128;
pub const MAX_RETURN_TO_LENGTH: usize = 2048;
pub const MAX_FP_LENGTH: usize = 128;

/// Shortest canvas fingerprint the verify endpoint accepts.
pub const MIN_FP_LENGTH: usize = 10;

/// Verified payments are remembered this long before re-checking on-chain.
pub const PAYMENT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Upper bound on remembered payments; oldest entries are evicted first.
pub const PAYMENT_CACHE_MAX: usize = 1000;

/// Fixed rate-limit window for challenge verification attempts.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Permits per rate-limit window per client IP.
pub const RATE_LIMIT_MAX: u32 = 20;

/// Default price quoted in 402 responses, in USDC.
pub const DEFAULT_MIN_PAYMENT: &str = "0.01";

/// Placeholder secret shipped in quick-start docs. The gate refuses to run
/// with it outside debug mode.
pub const INSECURE_SECRET_SENTINEL: &str = "default-secret-change-me";

/// How many leading key characters may appear in log events.
pub const KEY_LOG_PREFIX_LEN: usize = 12;

/// Outbound timeout for verify-service calls.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
