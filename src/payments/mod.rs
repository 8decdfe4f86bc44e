//! Mobile-money payment facade
//!
//! [`PaymentGateway`] is the capability the lending service depends on.
//! [`MobileMoneyFacade`] implements it over any [`ProviderApi`], adding a lazy
//! token cache and a retry policy around each outbound call.
//!
//! Every money movement carries a caller-chosen reference. Providers treat a
//! repeated reference as the same transfer, so a retried submission never
//! moves money twice, and the reference is what status lookups are keyed on.

mod retry;
mod token;
mod sandbox;

pub use retry::RetryPolicy;
pub use token::{AccessToken, TokenCache, TokenPolicy};
pub use sandbox::{SandboxConfig, SandboxProvider};

use std::thread;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider product line; each has its own access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceProduct {
    Collection,
    Disbursement,
}

impl ServiceProduct {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceProduct::Collection => "collection",
            ServiceProduct::Disbursement => "disbursement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub available_balance: f64,
    pub currency: String,
    pub network: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Pending,
    Successful,
    Failed,
}

/// Provider acknowledgement of a money movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transaction_ref: String,
    pub status: TransferStatus,
    pub currency: String,
}

/// Failure reported to callers of the facade
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    /// Retries exhausted; the same call may succeed later
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request; retrying will not help
    #[error("Payment rejected: {0}")]
    Rejected(String),
}

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("access token expired")]
    TokenExpired,

    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("rejected by provider: {0}")]
    Rejected(String),
}

/// Money-movement capability used by the lending service
pub trait PaymentGateway {
    /// Provider name recorded on transactions
    fn provider_name(&self) -> &str;

    fn get_balance(&self, account_ref: &str) -> Result<Balance, PaymentError>;

    /// Send `amount` to the account under `reference`
    fn disburse(&self, reference: &str, amount: f64, account_ref: &str, memo: &str) -> Result<TransferReceipt, PaymentError>;

    /// Request `amount` from the account under `reference`
    fn collect(&self, reference: &str, amount: f64, account_ref: &str, memo: &str) -> Result<TransferReceipt, PaymentError>;

    /// Current state of the transfer submitted under `reference`
    fn transaction_status(&self, product: ServiceProduct, reference: &str) -> Result<TransferStatus, PaymentError>;
}

/// Raw provider operations; one call, no retry
pub trait ProviderApi {
    fn name(&self) -> &str;

    fn issue_token(&self, product: ServiceProduct) -> Result<AccessToken, ProviderError>;

    fn balance(&self, token: &str, msisdn: &str) -> Result<Balance, ProviderError>;

    fn transfer(
        &self,
        token: &str,
        reference: &str,
        amount: f64,
        msisdn: &str,
        memo: &str,
    ) -> Result<TransferReceipt, ProviderError>;

    fn request_to_pay(
        &self,
        token: &str,
        reference: &str,
        amount: f64,
        msisdn: &str,
        memo: &str,
    ) -> Result<TransferReceipt, ProviderError>;

    /// `Rejected` when the provider has no transfer under `reference`
    fn transfer_status(
        &self,
        token: &str,
        product: ServiceProduct,
        reference: &str,
    ) -> Result<TransferStatus, ProviderError>;
}

/// [`PaymentGateway`] over a provider API with token caching and retry
pub struct MobileMoneyFacade<A: ProviderApi> {
    api: A,
    tokens: TokenCache,
    retry: RetryPolicy,
}

impl<A: ProviderApi> MobileMoneyFacade<A> {
    pub fn new(api: A) -> Self {
        Self::with_policies(api, RetryPolicy::default(), TokenPolicy::default())
    }

    pub fn with_policies(api: A, retry: RetryPolicy, token_policy: TokenPolicy) -> Self {
        Self {
            api,
            tokens: TokenCache::new(token_policy),
            retry,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Run `op` with a valid token, retrying per the policy.
    ///
    /// Expired tokens are dropped and refetched without waiting; transient
    /// failures wait the backoff delay; rejections return immediately.
    fn call<T, F>(&self, product: ServiceProduct, label: &str, op: F) -> Result<T, PaymentError>
    where
        F: Fn(&A, &str) -> Result<T, ProviderError>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = ProviderError::Transient("no attempt made".into());

        for attempt in 1..=max_attempts {
            let outcome = self
                .tokens
                .get_or_refresh(product, Utc::now(), |p| self.api.issue_token(p))
                .and_then(|token| op(&self.api, &token));

            match outcome {
                Ok(value) => return Ok(value),
                Err(ProviderError::Rejected(reason)) => {
                    warn!("{} {} rejected: {}", self.api.name(), label, reason);
                    return Err(PaymentError::Rejected(reason));
                }
                Err(ProviderError::TokenExpired) => {
                    warn!(
                        "{} token expired during {}, refreshing (attempt {}/{})",
                        product.as_str(),
                        label,
                        attempt,
                        max_attempts
                    );
                    self.tokens.invalidate(product);
                    last_error = ProviderError::TokenExpired;
                }
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", label, attempt, max_attempts, e);
                    last_error = e;
                    if attempt < max_attempts {
                        thread::sleep(self.retry.delay_for(attempt));
                    }
                }
            }
        }

        Err(PaymentError::Unavailable(format!(
            "{} failed after {} attempts: {}",
            label, max_attempts, last_error
        )))
    }
}

fn require_positive(amount: f64) -> Result<(), PaymentError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PaymentError::Rejected(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}

impl<A: ProviderApi> PaymentGateway for MobileMoneyFacade<A> {
    fn provider_name(&self) -> &str {
        self.api.name()
    }

    fn get_balance(&self, account_ref: &str) -> Result<Balance, PaymentError> {
        self.call(ServiceProduct::Collection, "balance", |api, token| {
            api.balance(token, account_ref)
        })
    }

    fn disburse(&self, reference: &str, amount: f64, account_ref: &str, memo: &str) -> Result<TransferReceipt, PaymentError> {
        require_positive(amount)?;
        let receipt = self.call(ServiceProduct::Disbursement, "transfer", |api, token| {
            api.transfer(token, reference, amount, account_ref, memo)
        })?;
        info!("Disbursed {:.2} to {} ({})", amount, account_ref, receipt.transaction_ref);
        Ok(receipt)
    }

    fn collect(&self, reference: &str, amount: f64, account_ref: &str, memo: &str) -> Result<TransferReceipt, PaymentError> {
        require_positive(amount)?;
        let receipt = self.call(ServiceProduct::Collection, "request to pay", |api, token| {
            api.request_to_pay(token, reference, amount, account_ref, memo)
        })?;
        info!("Requested {:.2} from {} ({})", amount, account_ref, receipt.transaction_ref);
        Ok(receipt)
    }

    fn transaction_status(&self, product: ServiceProduct, reference: &str) -> Result<TransferStatus, PaymentError> {
        self.call(product, "status", |api, token| api.transfer_status(token, product, reference))
    }
}
