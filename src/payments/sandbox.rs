//! In-process provider simulating a mobile-money sandbox

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::info;
use uuid::Uuid;

use super::{AccessToken, Balance, ProviderApi, ProviderError, ServiceProduct, TransferReceipt, TransferStatus};
use crate::amortization::round_cents;
use crate::assumptions::{MobileNetwork, NetworkDirectory};

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub token_ttl: Duration,
    /// Simulated balances fall in [min_balance, max_balance)
    pub min_balance: f64,
    pub max_balance: f64,
    /// Status lookups that still report a new transfer as pending
    pub pending_lookups: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(1),
            min_balance: 100.0,
            max_balance: 5000.0,
            pending_lookups: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct SandboxTransfer {
    product: ServiceProduct,
    receipt: TransferReceipt,
    lookups: u32,
}

/// Sandbox provider: issues tokens, routes numbers by prefix, returns
/// deterministic balances, and settles transfers as their status is polled
#[derive(Debug)]
pub struct SandboxProvider {
    networks: NetworkDirectory,
    config: SandboxConfig,
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Keyed by the caller's reference
    transfers: Mutex<HashMap<String, SandboxTransfer>>,
}

impl SandboxProvider {
    pub fn new(networks: NetworkDirectory) -> Self {
        Self::with_config(networks, SandboxConfig::default())
    }

    pub fn with_config(networks: NetworkDirectory, config: SandboxConfig) -> Self {
        Self {
            networks,
            config,
            issued: Mutex::new(HashMap::new()),
            transfers: Mutex::new(HashMap::new()),
        }
    }

    /// Fail a transfer that has not settled yet, as when the borrower declines
    /// the prompt. Returns false for unknown or settled references.
    pub fn fail_transfer(&self, reference: &str) -> bool {
        let mut transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        match transfers.get_mut(reference) {
            Some(t) if t.receipt.status == TransferStatus::Pending => {
                t.receipt.status = TransferStatus::Failed;
                true
            }
            _ => false,
        }
    }

    /// Number of distinct transfers accepted so far
    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Revoke every issued token, as if they all expired server-side
    pub fn expire_all_tokens(&self) {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn check_token(&self, token: &str) -> Result<(), ProviderError> {
        let issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        match issued.get(token) {
            Some(expires_at) if *expires_at > Utc::now() => Ok(()),
            _ => Err(ProviderError::TokenExpired),
        }
    }

    fn network(&self, msisdn: &str) -> Result<&MobileNetwork, ProviderError> {
        self.networks
            .detect(msisdn)
            .ok_or_else(|| ProviderError::Rejected(format!("unsupported network for {}", msisdn)))
    }

    /// Same number always yields the same balance
    fn simulated_balance(&self, msisdn: &str) -> f64 {
        let national = self.networks.national_format(msisdn);
        let seed = national
            .bytes()
            .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add((b - b'0') as u64));
        let span = self.config.max_balance - self.config.min_balance;
        let fraction = (seed % 10_000) as f64 / 10_000.0;
        round_cents(self.config.min_balance + span * fraction)
    }

    /// Accept a transfer, or hand back the original receipt for a reference
    /// seen before
    fn submit(
        &self,
        product: ServiceProduct,
        reference: &str,
        network: &MobileNetwork,
    ) -> Result<(TransferReceipt, bool), ProviderError> {
        let mut transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = transfers.get(reference) {
            if existing.product != product {
                return Err(ProviderError::Rejected(format!(
                    "reference {} already used for a {}",
                    reference,
                    existing.product.as_str()
                )));
            }
            return Ok((existing.receipt.clone(), false));
        }

        let receipt = TransferReceipt {
            transaction_ref: Uuid::new_v4().to_string(),
            status: TransferStatus::Pending,
            currency: network.currency.clone(),
        };
        transfers.insert(
            reference.to_string(),
            SandboxTransfer {
                product,
                receipt: receipt.clone(),
                lookups: 0,
            },
        );
        Ok((receipt, true))
    }
}

fn require_positive(amount: f64) -> Result<(), ProviderError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ProviderError::Rejected(format!("invalid amount {}", amount)));
    }
    Ok(())
}

impl ProviderApi for SandboxProvider {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn issue_token(&self, product: ServiceProduct) -> Result<AccessToken, ProviderError> {
        let token = AccessToken {
            value: format!("{}-{}", product.as_str(), Uuid::new_v4()),
            expires_at: Utc::now() + self.config.token_ttl,
        };
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.value.clone(), token.expires_at);
        Ok(token)
    }

    fn balance(&self, token: &str, msisdn: &str) -> Result<Balance, ProviderError> {
        self.check_token(token)?;
        let network = self.network(msisdn)?;
        Ok(Balance {
            available_balance: self.simulated_balance(msisdn),
            currency: network.currency.clone(),
            network: network.name.clone(),
        })
    }

    fn transfer(
        &self,
        token: &str,
        reference: &str,
        amount: f64,
        msisdn: &str,
        memo: &str,
    ) -> Result<TransferReceipt, ProviderError> {
        self.check_token(token)?;
        require_positive(amount)?;
        let network = self.network(msisdn)?;
        let (receipt, fresh) = self.submit(ServiceProduct::Disbursement, reference, network)?;
        if fresh {
            info!("Sandbox transfer {:.2} {} to {} via {} ({})", amount, network.currency, msisdn, network.name, memo);
        } else {
            info!("Sandbox transfer {} resubmitted, returning original receipt", reference);
        }
        Ok(receipt)
    }

    fn request_to_pay(
        &self,
        token: &str,
        reference: &str,
        amount: f64,
        msisdn: &str,
        memo: &str,
    ) -> Result<TransferReceipt, ProviderError> {
        self.check_token(token)?;
        require_positive(amount)?;
        let network = self.network(msisdn)?;
        let (receipt, fresh) = self.submit(ServiceProduct::Collection, reference, network)?;
        if fresh {
            info!("Sandbox request {:.2} {} from {} via {} ({})", amount, network.currency, msisdn, network.name, memo);
        } else {
            info!("Sandbox request {} resubmitted, returning original receipt", reference);
        }
        Ok(receipt)
    }

    fn transfer_status(
        &self,
        token: &str,
        product: ServiceProduct,
        reference: &str,
    ) -> Result<TransferStatus, ProviderError> {
        self.check_token(token)?;
        let mut transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        let transfer = match transfers.get_mut(reference) {
            Some(t) if t.product == product => t,
            _ => {
                return Err(ProviderError::Rejected(format!(
                    "no {} transfer under reference {}",
                    product.as_str(),
                    reference
                )))
            }
        };

        if transfer.receipt.status == TransferStatus::Pending {
            if transfer.lookups >= self.config.pending_lookups {
                transfer.receipt.status = TransferStatus::Successful;
            } else {
                transfer.lookups += 1;
            }
        }
        Ok(transfer.receipt.status)
    }
}
