//! Gate configuration and merchant identity types.

use std::env;
use std::sync::Once;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};
use crate::{DEFAULT_MIN_PAYMENT, INSECURE_SECRET_SENTINEL};

/// Environment variable holding the HMAC secret.
pub const SECRET_ENV: &str = "CHALLENGE_SECRET";

/// Environment variable holding the verify-service URL.
pub const VERIFY_URL_ENV: &str = "AGENTPAYMENTS_VERIFY_URL";

/// Environment variable holding the merchant API key.
pub const API_KEY_ENV: &str = "AGENTPAYMENTS_API_KEY";

static INSECURE_SECRET_WARNING: Once = Once::new();

/// Solana network a merchant receives payments on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SolanaNetwork {
    /// Solana devnet.
    #[default]
    #[serde(rename = "devnet")]
    Devnet,
    /// Solana mainnet.
    #[serde(rename = "mainnet-beta")]
    MainnetBeta,
}

impl SolanaNetwork {
    /// Canonical cluster name, as carried in the `payment.network` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SolanaNetwork::Devnet => "devnet",
            SolanaNetwork::MainnetBeta => "mainnet-beta",
        }
    }

    /// Human-readable label used in payment instructions.
    pub fn label(&self) -> &'static str {
        match self {
            SolanaNetwork::Devnet => "devnet",
            SolanaNetwork::MainnetBeta => "mainnet",
        }
    }

    /// Parse from a cluster name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "devnet" => Some(SolanaNetwork::Devnet),
            "mainnet-beta" => Some(SolanaNetwork::MainnetBeta),
            _ => None,
        }
    }
}

impl std::fmt::Display for SolanaNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Merchant identity fetched from the verify service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantConfig {
    /// Base58 Solana public key payments are sent to.
    pub wallet_address: String,
    /// Network the wallet lives on.
    pub network: SolanaNetwork,
}

/// Whether `address` looks like a Solana public key: 32 to 44 base58 chars.
pub fn is_valid_solana_address(address: &str) -> bool {
    (32..=44).contains(&address.len())
        && address.chars().all(|c| {
            c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l')
        })
}

/// Immutable per-instance gate configuration. Built once at startup via
/// [`GateConfig::builder`] or [`GateConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub(crate) challenge_secret: String,
    pub(crate) verify_url: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) public_paths: Vec<String>,
    pub(crate) min_payment: String,
    pub(crate) debug: bool,
}

impl GateConfig {
    /// Start building a configuration.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::default()
    }

    /// Build from `CHALLENGE_SECRET`, `AGENTPAYMENTS_VERIFY_URL` and
    /// `AGENTPAYMENTS_API_KEY`.
    pub fn from_env() -> GateResult<Self> {
        let secret = env::var(SECRET_ENV).map_err(|_| GateError::MissingSecret)?;
        let mut builder = GateConfig::builder().challenge_secret(secret);
        if let Ok(url) = env::var(VERIFY_URL_ENV) {
            builder = builder.verify_url(url);
        }
        if let Ok(key) = env::var(API_KEY_ENV) {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    /// The extra exact-match public paths configured for this gate.
    pub fn public_paths(&self) -> &[String] {
        &self.public_paths
    }

    /// The normalised verify endpoint, if configured.
    pub fn verify_url(&self) -> Option<&str> {
        self.verify_url.as_deref()
    }

    /// Whether debug mode is on.
    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Default)]
pub struct GateConfigBuilder {
    challenge_secret: Option<String>,
    verify_url: Option<String>,
    api_key: Option<String>,
    public_paths: Vec<String>,
    min_payment: Option<String>,
    debug: bool,
}

impl GateConfigBuilder {
    /// Set the HMAC secret (required).
    pub fn challenge_secret(mut self, secret: impl Into<String>) -> Self {
        self.challenge_secret = Some(secret.into());
        self
    }

    /// Set the verify-service URL. `/verify` is appended when missing, so
    /// both the service base and the full endpoint are accepted.
    pub fn verify_url(mut self, url: impl Into<String>) -> Self {
        self.verify_url = Some(normalize_verify_url(&url.into()));
        self
    }

    /// Set the merchant API key used as the bearer credential.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Add an exact-match path that bypasses the gate.
    pub fn public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    /// Override the quoted price (decimal string, USDC).
    pub fn min_payment(mut self, amount: impl Into<String>) -> Self {
        self.min_payment = Some(amount.into());
        self
    }

    /// Allow the insecure placeholder secret, warning once instead of
    /// refusing. Never enable in production.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> GateResult<GateConfig> {
        let secret = self.challenge_secret.ok_or(GateError::MissingSecret)?;
        if secret.is_empty() {
            return Err(GateError::MissingSecret);
        }
        if secret == INSECURE_SECRET_SENTINEL {
            if !self.debug {
                return Err(GateError::InsecureSecret);
            }
            INSECURE_SECRET_WARNING.call_once(|| {
                tracing::warn!(
                    component = "agentpayments",
                    "using the default CHALLENGE_SECRET; \
                     set a strong secret before deploying to production"
                );
            });
        }
        Ok(GateConfig {
            challenge_secret: secret,
            verify_url: self.verify_url,
            api_key: self.api_key,
            public_paths: self.public_paths,
            min_payment: self.min_payment.unwrap_or_else(|| DEFAULT_MIN_PAYMENT.to_string()),
            debug: self.debug,
        })
    }
}

fn normalize_verify_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/verify") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/verify")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = GateConfig::builder()
            .challenge_secret("s3cret")
            .build()
            .unwrap();
        assert_eq!(config.min_payment, "0.01");
        assert!(config.verify_url.is_none());
        assert!(config.api_key.is_none());
        assert!(config.public_paths.is_empty());
        assert!(!config.debug);
    }

    #[test]
    fn test_verify_url_normalisation() {
        let cases = [
            ("https://verify.example.com", "https://verify.example.com/verify"),
            ("https://verify.example.com/", "https://verify.example.com/verify"),
            ("https://verify.example.com/verify", "https://verify.example.com/verify"),
            ("https://verify.example.com/verify/", "https://verify.example.com/verify"),
        ];
        for (input, expected) in cases {
            let config = GateConfig::builder()
                .challenge_secret("s3cret")
                .verify_url(input)
                .build()
                .unwrap();
            assert_eq!(config.verify_url.as_deref(), Some(expected), "input {input}");
        }
    }

    #[test]
    fn test_missing_secret_rejected() {
        assert!(matches!(
            GateConfig::builder().build(),
            Err(GateError::MissingSecret)
        ));
        assert!(matches!(
            GateConfig::builder().challenge_secret("").build(),
            Err(GateError::MissingSecret)
        ));
    }

    #[test]
    fn test_sentinel_secret_rejected_outside_debug() {
        let result = GateConfig::builder()
            .challenge_secret(INSECURE_SECRET_SENTINEL)
            .build();
        assert!(matches!(result, Err(GateError::InsecureSecret)));

        let debug = GateConfig::builder()
            .challenge_secret(INSECURE_SECRET_SENTINEL)
            .debug(true)
            .build();
        assert!(debug.is_ok());
    }

    #[test]
    fn test_solana_address_validation() {
        assert!(is_valid_solana_address(
            "4Nd1mYQriLX3C5YZ6fHxnacqMmW7jqAxBMeUSK7VGJqH"
        ));
        assert!(!is_valid_solana_address(""));
        assert!(!is_valid_solana_address("tooshort"));
        // '0', 'O', 'I' and 'l' are outside the base58 alphabet.
        assert!(!is_valid_solana_address(
            "0Nd1mYQriLX3C5YZ6fHxnacqMmW7jqAxBMeUSK7VGJqH"
        ));
        assert!(!is_valid_solana_address(
            "4Nd1mYQriLX3C5YZ6fHxnacqMmW7jqAxBMeUSK7VGJql"
        ));
        assert!(!is_valid_solana_address(&"a".repeat(45)));
    }

    #[test]
    fn test_network_parsing_and_labels() {
        assert_eq!(SolanaNetwork::from_str("devnet"), Some(SolanaNetwork::Devnet));
        assert_eq!(
            SolanaNetwork::from_str("mainnet-beta"),
            Some(SolanaNetwork::MainnetBeta)
        );
        assert_eq!(SolanaNetwork::from_str("testnet"), None);
        assert_eq!(SolanaNetwork::MainnetBeta.as_str(), "mainnet-beta");
        assert_eq!(SolanaNetwork::MainnetBeta.label(), "mainnet");
        assert_eq!(SolanaNetwork::Devnet.label(), "devnet");
    }

    #[test]
    fn test_merchant_config_wire_format() {
        let json = r#"{"walletAddress":"4Nd1mYQriLX3C5YZ6fHxnacqMmW7jqAxBMeUSK7VGJqH","network":"mainnet-beta"}"#;
        let config: MerchantConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.network, SolanaNetwork::MainnetBeta);
        assert!(is_valid_solana_address(&config.wallet_address));
    }
}
