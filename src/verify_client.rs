//! Client for the external verify service.
//!
//! The gate consumes exactly two endpoints, both bearer-authenticated:
//!
//! - `GET {verify_url}?memo=…` → `{"paid": true | false}`
//! - `GET {base}/merchants/me` → `{"walletAddress": …, "network": …}`
//!
//! where `base` is the verify URL with its trailing `/verify` stripped.

use serde_json::Value;

use crate::config::{is_valid_solana_address, MerchantConfig};
use crate::error::{GateError, GateResult};
use crate::VERIFY_TIMEOUT;

/// HTTP client for the verify service, bound to one merchant credential.
#[derive(Clone)]
pub struct VerifyClient {
    http: reqwest::Client,
    verify_url: String,
    api_key: String,
}

impl VerifyClient {
    /// Build a client for the given (already normalised) verify endpoint.
    pub fn new(verify_url: impl Into<String>, api_key: impl Into<String>) -> GateResult<Self> {
        let http = reqwest::Client::builder().timeout(VERIFY_TIMEOUT).build()?;
        Ok(Self {
            http,
            verify_url: verify_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Whether a payment carrying `memo` has been observed on-chain.
    ///
    /// Every failure mode (transport error, timeout, non-2xx status,
    /// unparseable body) reads as "not paid" and emits an error event. The
    /// gate then answers 402 and the client simply retries later.
    pub async fn verify(&self, memo: &str) -> bool {
        match self.try_verify(memo).await {
            Ok(paid) => paid,
            Err(error) => {
                tracing::error!(
                    component = "agentpayments",
                    error = %error,
                    "backend payment verification failed"
                );
                false
            }
        }
    }

    async fn try_verify(&self, memo: &str) -> GateResult<bool> {
        let response = self
            .http
            .get(&self.verify_url)
            .query(&[("memo", memo)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GateError::VerifyService(format!(
                "verify endpoint returned {status}"
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| GateError::MalformedResponse(e.to_string()))?;
        Ok(body.get("paid").and_then(Value::as_bool) == Some(true))
    }

    /// Fetch the merchant's wallet and network from `/merchants/me`.
    pub async fn fetch_merchant_config(&self) -> GateResult<MerchantConfig> {
        let url = format!("{}/merchants/me", verify_base(&self.verify_url));
        let response = self.http.get(&url).bearer_auth(&self.api_key).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GateError::VerifyService(format!(
                "merchants/me returned {status}"
            )));
        }
        let config: MerchantConfig = response
            .json()
            .await
            .map_err(|e| GateError::MalformedResponse(e.to_string()))?;
        if !is_valid_solana_address(&config.wallet_address) {
            return Err(GateError::InvalidWalletAddress(config.wallet_address));
        }
        Ok(config)
    }
}

/// The service base: the verify endpoint minus its trailing `/verify`.
fn verify_base(verify_url: &str) -> &str {
    let trimmed = verify_url.trim_end_matches('/');
    trimmed.strip_suffix("/verify").unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_base_strips_suffix() {
        assert_eq!(verify_base("https://api.example.com/verify"), "https://api.example.com");
        assert_eq!(verify_base("https://api.example.com/verify/"), "https://api.example.com");
        assert_eq!(verify_base("https://api.example.com"), "https://api.example.com");
        assert_eq!(
            verify_base("https://api.example.com/v1/verify"),
            "https://api.example.com/v1"
        );
    }
}
