//! The gate itself: shared resources plus the request decision flows.

use http::StatusCode;
use serde_json::json;

use crate::cache::{MerchantConfigCache, PaymentCache};
use crate::challenge::challenge_html;
use crate::classify::{classify, clip, Decision};
use crate::config::{GateConfig, MerchantConfig};
use crate::cookies::{
    check_nonce, mint_nonce, set_cookie_header, validate_cookie_value, NonceCheck,
};
use crate::error::{GateError, GateResult};
use crate::keys::{derive_payment_memo, generate_agent_key, validate_agent_key};
use crate::ratelimit::RateLimiter;
use crate::request::{GateOutcome, GateRequest, GateResponse};
use crate::verify_client::VerifyClient;
use crate::{
    KEY_LOG_PREFIX_LEN, MAX_FP_LENGTH, MAX_NONCE_LENGTH, MAX_RETURN_TO_LENGTH, MIN_FP_LENGTH,
};

const MSG_FIRST_ISSUE: &str = "Access requires a paid API key. A key has been generated for you \
                               below. Send a USDC payment with the provided memo to activate it, \
                               then retry your request with the X-Agent-Key header.";
const MSG_UNPAID: &str = "Key is valid but payment has not been verified yet.";
const MSG_INVALID_KEY: &str = "Invalid API key. Keys must be issued by this server.";
const DETAILS_INVALID_KEY: &str = "GET /.well-known/agent-access.json for access instructions.";
const MSG_RATE_LIMITED: &str = "Too many verification attempts. Please wait and try again.";
const MSG_CHALLENGE_FAILED: &str = "Challenge verification failed.";
const MSG_CHALLENGE_EXPIRED: &str = "Challenge expired. Reload the page.";
const MSG_CHALLENGE_INVALID: &str = "Invalid challenge.";
const MSG_VERIFY_UNCONFIGURED: &str = "Payment verification not configured.";
const MSG_VERIFY_UNAVAILABLE: &str = "Payment verification unavailable.";

/// One gate instance: immutable configuration plus the process-wide shared
/// resources. Construct once at startup and share behind an `Arc`.
pub struct Gate {
    config: GateConfig,
    verify: Option<VerifyClient>,
    payments: PaymentCache,
    merchants: MerchantConfigCache,
    challenge_limiter: RateLimiter,
}

impl Gate {
    /// Build a gate from a frozen configuration.
    pub fn new(config: GateConfig) -> GateResult<Self> {
        let verify = match (&config.verify_url, &config.api_key) {
            (Some(url), Some(key)) => Some(VerifyClient::new(url.clone(), key.clone())?),
            _ => None,
        };
        Ok(Self {
            config,
            verify,
            payments: PaymentCache::new(),
            merchants: MerchantConfigCache::new(),
            challenge_limiter: RateLimiter::new(),
        })
    }

    /// Decide what to do with a request.
    ///
    /// The only suspension points are the verify-service calls on the agent
    /// path; every other branch completes synchronously. No lock is held
    /// across an await.
    pub async fn handle(&self, req: &GateRequest) -> GateOutcome {
        match classify(req, &self.config.public_paths) {
            Decision::PublicPath => GateOutcome::Passthrough,
            Decision::ChallengeVerify => GateOutcome::Respond(self.challenge_verify(req)),
            Decision::AgentNoKey => GateOutcome::Respond(self.agent_no_key().await),
            Decision::AgentWithKey(key) => self.agent_with_key(req, &key).await,
            Decision::BrowserCookie(value) => {
                if validate_cookie_value(&value, &self.config.challenge_secret) {
                    GateOutcome::Passthrough
                } else {
                    GateOutcome::Respond(self.challenge_page(req))
                }
            }
            Decision::BrowserNoCookie => GateOutcome::Respond(self.challenge_page(req)),
        }
    }

    /// The gate's configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The verified-payment cache, for monitoring.
    pub fn payment_cache(&self) -> &PaymentCache {
        &self.payments
    }

    /// The challenge rate limiter, for monitoring.
    pub fn challenge_limiter(&self) -> &RateLimiter {
        &self.challenge_limiter
    }

    // ── Agent flow ──────────────────────────────────────────────────────

    async fn agent_no_key(&self) -> GateResponse {
        let merchant = match self.merchant_config().await {
            Ok(merchant) => merchant,
            Err(error) => return self.server_error(error),
        };
        let key = generate_agent_key(&self.config.challenge_secret);
        let memo = derive_payment_memo(&key, &self.config.challenge_secret);
        GateResponse::json(
            StatusCode::PAYMENT_REQUIRED,
            &self.payment_body(&key, &memo, &merchant, true),
        )
    }

    async fn agent_with_key(&self, req: &GateRequest, key: &str) -> GateOutcome {
        let secret = &self.config.challenge_secret;
        if !validate_agent_key(key, secret) {
            return GateOutcome::Respond(GateResponse::json(
                StatusCode::FORBIDDEN,
                &json!({
                    "error": "forbidden",
                    "message": MSG_INVALID_KEY,
                    "details": DETAILS_INVALID_KEY,
                }),
            ));
        }

        if self.payments.get(key) {
            return GateOutcome::Passthrough;
        }

        let Some(client) = &self.verify else {
            return GateOutcome::Respond(self.server_error(GateError::VerifyUnconfigured));
        };
        let merchant = match self.merchant_config().await {
            Ok(merchant) => merchant,
            Err(error) => return GateOutcome::Respond(self.server_error(error)),
        };

        let memo = derive_payment_memo(key, secret);
        if !client.verify(&memo).await {
            return GateOutcome::Respond(GateResponse::json(
                StatusCode::PAYMENT_REQUIRED,
                &self.payment_body(key, &memo, &merchant, false),
            ));
        }

        self.payments.set(key);
        tracing::info!(
            component = "agentpayments",
            key_prefix = &key[..KEY_LOG_PREFIX_LEN.min(key.len())],
            client_ip = req.client_ip(),
            user_agent = req.header("user-agent").unwrap_or("unknown"),
            path = req.path(),
            "payment verified, agent access granted"
        );
        GateOutcome::Passthrough
    }

    async fn merchant_config(&self) -> GateResult<MerchantConfig> {
        let client = self.verify.as_ref().ok_or(GateError::VerifyUnconfigured)?;
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        self.merchants
            .get_or_fetch(api_key, || client.fetch_merchant_config())
            .await
    }

    fn payment_body(
        &self,
        key: &str,
        memo: &str,
        merchant: &MerchantConfig,
        first_issue: bool,
    ) -> serde_json::Value {
        let mut payment = json!({
            "chain": "solana",
            "network": merchant.network.as_str(),
            "token": "USDC",
            "amount": self.config.min_payment,
            "wallet_address": merchant.wallet_address,
            "memo": memo,
        });
        if first_issue {
            payment["instructions"] = json!(format!(
                "Send {} USDC on Solana {} to {} with memo \"{}\". Then include the header \
                 X-Agent-Key: {} on all subsequent requests.",
                self.config.min_payment,
                merchant.network.label(),
                merchant.wallet_address,
                memo,
                key,
            ));
        }
        json!({
            "error": "payment_required",
            "message": if first_issue { MSG_FIRST_ISSUE } else { MSG_UNPAID },
            "your_key": key,
            "payment": payment,
        })
    }

    fn server_error(&self, error: GateError) -> GateResponse {
        tracing::error!(
            component = "agentpayments",
            error = %error,
            "cannot verify payments"
        );
        let message = match error {
            GateError::VerifyUnconfigured => MSG_VERIFY_UNCONFIGURED,
            _ => MSG_VERIFY_UNAVAILABLE,
        };
        GateResponse::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({ "error": "server_error", "message": message }),
        )
    }

    // ── Browser flow ────────────────────────────────────────────────────

    fn challenge_verify(&self, req: &GateRequest) -> GateResponse {
        if !self.challenge_limiter.permit(req.client_ip()) {
            return GateResponse::json(
                StatusCode::TOO_MANY_REQUESTS,
                &json!({ "error": "rate_limited", "message": MSG_RATE_LIMITED }),
            );
        }

        let form = req.form();
        let field = |name: &str| form.get(name).map(String::as_str);
        let nonce = clip(field("nonce").unwrap_or(""), MAX_NONCE_LENGTH);
        let return_to = clip(field("return_to").unwrap_or("/"), MAX_RETURN_TO_LENGTH);
        let fp = clip(field("fp").unwrap_or(""), MAX_FP_LENGTH);

        if !nonce.contains('.') || fp.len() < MIN_FP_LENGTH {
            return forbidden(MSG_CHALLENGE_FAILED);
        }
        match check_nonce(nonce, &self.config.challenge_secret) {
            NonceCheck::Malformed => return forbidden(MSG_CHALLENGE_FAILED),
            NonceCheck::Expired => return forbidden(MSG_CHALLENGE_EXPIRED),
            NonceCheck::BadSignature => return forbidden(MSG_CHALLENGE_INVALID),
            NonceCheck::Ok => {}
        }

        // Relative paths only; anything else would be an open redirect.
        let safe_path = if return_to.starts_with('/') { return_to } else { "/" };
        GateResponse::redirect_with_cookie(
            safe_path,
            &set_cookie_header(&self.config.challenge_secret),
        )
    }

    fn challenge_page(&self, req: &GateRequest) -> GateResponse {
        let nonce = mint_nonce(&self.config.challenge_secret);
        GateResponse::challenge_page(challenge_html(&req.full_path(), &nonce))
    }
}

fn forbidden(message: &str) -> GateResponse {
    GateResponse::json(
        StatusCode::FORBIDDEN,
        &json!({ "error": "forbidden", "message": message }),
    )
}
