use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use common::{CoreError, Result};
use sqlx::PgPool;

/// Storage capability for wallet balances.
///
/// `debit_if_sufficient_funds` must be a single atomic check-and-decrement;
/// a failed condition surfaces as a `conflict` error.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Missing wallets read as balance 0.
    async fn get_balance(&self, user_id: &str) -> Result<i64>;
    async fn set_balance(&self, user_id: &str, amount: i64) -> Result<()>;
    async fn debit_if_sufficient_funds(&self, user_id: &str, amount: i64) -> Result<()>;
}

fn ensure_sufficient_funds(balance: i64, amount: i64) -> Result<()> {
    if balance < amount {
        return Err(CoreError::conflict("balance below requested amount"));
    }
    Ok(())
}

/// Mutex-guarded map, the default backing store.
#[derive(Default)]
pub struct InMemoryWalletRepository {
    balances: Mutex<HashMap<String, i64>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn get_balance(&self, user_id: &str) -> Result<i64> {
        Ok(self.balances.lock().unwrap().get(user_id).copied().unwrap_or(0))
    }

    async fn set_balance(&self, user_id: &str, amount: i64) -> Result<()> {
        self.balances.lock().unwrap().insert(user_id.to_string(), amount);
        Ok(())
    }

    async fn debit_if_sufficient_funds(&self, user_id: &str, amount: i64) -> Result<()> {
        let mut balances = self.balances.lock().unwrap();
        let current = balances.get(user_id).copied().unwrap_or(0);
        ensure_sufficient_funds(current, amount)?;
        balances.insert(user_id.to_string(), current - amount);
        Ok(())
    }
}

/// Durable wallet store: one pretty-printed JSON object
/// `{user_id: balance, …}`, rewritten atomically (temp file + rename)
/// under the repository lock on every mutation.
pub struct FileWalletRepository {
    path: PathBuf,
    balances: Mutex<HashMap<String, i64>>,
}

impl FileWalletRepository {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                CoreError::internal(format!("create wallet dir {}", parent.display()))
                    .with_source(err)
            })?;
        }

        let repo = Self {
            path,
            balances: Mutex::new(HashMap::new()),
        };
        repo.load()?;
        Ok(repo)
    }

    fn load(&self) -> Result<()> {
        let mut balances = self.balances.lock().unwrap();
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(()),
            Ok(bytes) => {
                *balances = serde_json::from_slice(&bytes).map_err(|err| {
                    CoreError::internal(format!("decode wallet file {}", self.path.display()))
                        .with_source(err)
                })?;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::persist_locked(&self.path, &balances)
            }
            Err(err) => Err(CoreError::internal(format!(
                "read wallet file {}",
                self.path.display()
            ))
            .with_source(err)),
        }
    }

    fn persist_locked(path: &Path, balances: &HashMap<String, i64>) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(balances)
            .map_err(|err| CoreError::internal("encode wallet file").with_source(err))?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, encoded).map_err(|err| {
            CoreError::internal(format!("write wallet file {}", tmp.display())).with_source(err)
        })?;
        std::fs::rename(&tmp, path).map_err(|err| {
            CoreError::internal(format!("rename wallet file {}", path.display())).with_source(err)
        })?;
        Ok(())
    }
}

#[async_trait]
impl WalletRepository for FileWalletRepository {
    async fn get_balance(&self, user_id: &str) -> Result<i64> {
        Ok(self.balances.lock().unwrap().get(user_id).copied().unwrap_or(0))
    }

    async fn set_balance(&self, user_id: &str, amount: i64) -> Result<()> {
        let mut balances = self.balances.lock().unwrap();
        balances.insert(user_id.to_string(), amount);
        Self::persist_locked(&self.path, &balances).inspect_err(|error| {
            tracing::error!(user_id, amount, %error, "wallet persist failed");
        })
    }

    async fn debit_if_sufficient_funds(&self, user_id: &str, amount: i64) -> Result<()> {
        let mut balances = self.balances.lock().unwrap();
        let current = balances.get(user_id).copied().unwrap_or(0);
        ensure_sufficient_funds(current, amount)?;
        balances.insert(user_id.to_string(), current - amount);
        Self::persist_locked(&self.path, &balances).inspect_err(|error| {
            tracing::error!(user_id, amount, %error, "wallet persist failed");
        })
    }
}

/// PostgreSQL-backed repository.
///
/// Expects the table:
/// `wallets(user_id TEXT PRIMARY KEY, balance BIGINT NOT NULL)`.
pub struct SqlWalletRepository {
    pool: PgPool,
}

impl SqlWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for SqlWalletRepository {
    async fn get_balance(&self, user_id: &str) -> Result<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| CoreError::internal("load wallet balance").with_source(err))?;
        Ok(balance.unwrap_or(0))
    }

    async fn set_balance(&self, user_id: &str, amount: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|err| CoreError::internal("save wallet balance").with_source(err))?;
        Ok(())
    }

    async fn debit_if_sufficient_funds(&self, user_id: &str, amount: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wallets SET balance = balance - $2 WHERE user_id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|err| CoreError::internal("debit wallet").with_source(err))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::conflict("balance below requested amount"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_wallet_reads_as_zero() {
        let repo = InMemoryWalletRepository::new();
        assert_eq!(repo.get_balance("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn conditional_debit_is_atomic() {
        let repo = InMemoryWalletRepository::new();
        repo.set_balance("u1", 15).await.unwrap();

        repo.debit_if_sufficient_funds("u1", 10).await.unwrap();
        assert_eq!(repo.get_balance("u1").await.unwrap(), 5);

        let err = repo.debit_if_sufficient_funds("u1", 10).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.get_balance("u1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn file_repo_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        {
            let repo = FileWalletRepository::new(&path).unwrap();
            repo.set_balance("u1", 20).await.unwrap();
            repo.debit_if_sufficient_funds("u1", 5).await.unwrap();
        }

        let repo = FileWalletRepository::new(&path).unwrap();
        assert_eq!(repo.get_balance("u1").await.unwrap(), 15);
    }

    #[tokio::test]
    async fn file_repo_writes_a_single_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let repo = FileWalletRepository::new(&path).unwrap();
        repo.set_balance("u1", 20).await.unwrap();
        repo.set_balance("u2", 7).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["u1"], 20);
        assert_eq!(value["u2"], 7);
        // Pretty-printed.
        assert!(raw.contains('\n'));
    }

    #[tokio::test]
    async fn file_repo_failed_debit_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");

        let repo = FileWalletRepository::new(&path).unwrap();
        repo.set_balance("u1", 3).await.unwrap();
        assert!(repo.debit_if_sufficient_funds("u1", 10).await.is_err());

        let repo = FileWalletRepository::new(&path).unwrap();
        assert_eq!(repo.get_balance("u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn file_repo_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallets.json");
        let repo = FileWalletRepository::new(&path).unwrap();
        assert_eq!(repo.get_balance("u1").await.unwrap(), 0);
        assert!(path.exists());
    }
}
