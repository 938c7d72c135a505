use std::sync::Arc;

use common::{CoreError, Result};

use super::repository::WalletRepository;

/// Reason surfaced when a conditional debit loses its condition.
pub const INSUFFICIENT_FUNDS: &str = "insufficient funds";

/// Wallet operations over a pluggable repository.
pub struct WalletService {
    repo: Arc<dyn WalletRepository>,
}

impl WalletService {
    pub fn new(repo: Arc<dyn WalletRepository>) -> Self {
        Self { repo }
    }

    /// Adds funds. Wallets are created lazily on first credit.
    pub async fn credit(&self, user_id: &str, amount: i64) -> Result<()> {
        validate(user_id, amount)?;
        let current = self.repo.get_balance(user_id).await.inspect_err(|error| {
            tracing::warn!(user_id, amount, %error, "wallet credit read failed");
        })?;
        self.repo
            .set_balance(user_id, current + amount)
            .await
            .inspect_err(|error| {
                tracing::warn!(user_id, amount, %error, "wallet credit write failed");
            })
    }

    /// Conditionally removes funds; fails with the `insufficient funds`
    /// conflict when the balance does not cover the amount.
    pub async fn debit(&self, user_id: &str, amount: i64) -> Result<()> {
        validate(user_id, amount)?;
        self.repo
            .debit_if_sufficient_funds(user_id, amount)
            .await
            .map_err(|error| {
                tracing::warn!(user_id, amount, %error, "wallet debit failed");
                if error.is_conflict() {
                    CoreError::conflict(INSUFFICIENT_FUNDS)
                } else {
                    error
                }
            })?;
        metrics::counter!("wallet_debits_total").increment(1);
        Ok(())
    }

    /// Returns funds after a failed payment. Same effect as a credit,
    /// counted separately.
    pub async fn refund(&self, user_id: &str, amount: i64) -> Result<()> {
        validate(user_id, amount)?;
        let current = self.repo.get_balance(user_id).await.inspect_err(|error| {
            tracing::warn!(user_id, amount, %error, "wallet refund read failed");
        })?;
        self.repo
            .set_balance(user_id, current + amount)
            .await
            .inspect_err(|error| {
                tracing::warn!(user_id, amount, %error, "wallet refund write failed");
            })?;
        metrics::counter!("wallet_refunds_total").increment(1);
        Ok(())
    }

    /// Current balance; missing wallets read as 0.
    pub async fn balance(&self, user_id: &str) -> Result<i64> {
        if user_id.is_empty() {
            return Err(CoreError::invalid("invalid wallet request"));
        }
        self.repo.get_balance(user_id).await
    }
}

fn validate(user_id: &str, amount: i64) -> Result<()> {
    if user_id.is_empty() || amount <= 0 {
        return Err(CoreError::invalid("invalid wallet request"));
    }
    Ok(())
}
