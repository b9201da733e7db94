//! Error types for the gate.

use thiserror::Error;

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

/// Errors that can occur while configuring or running the gate.
#[derive(Error, Debug)]
pub enum GateError {
    /// `CHALLENGE_SECRET` missing from the environment.
    #[error("CHALLENGE_SECRET is not set")]
    MissingSecret,

    /// The secret is still the placeholder value.
    #[error(
        "CHALLENGE_SECRET is set to the insecure default; \
         set a strong, unique secret for production"
    )]
    InsecureSecret,

    /// Verify URL or API key missing when the agent flow needed them.
    #[error("payment verification is not configured")]
    VerifyUnconfigured,

    /// The merchant wallet returned by the verify service is not base58.
    #[error("merchant wallet address {0:?} is not a valid Solana public key")]
    InvalidWalletAddress(String),

    /// Non-2xx status from the verify service.
    #[error("verify service error: {0}")]
    VerifyService(String),

    /// The verify service answered with a body we could not interpret.
    #[error("malformed verify service response: {0}")]
    MalformedResponse(String),

    /// Transport-level failure talking to the verify service.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
