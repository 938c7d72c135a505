use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use common::{CoreError, Result};
use sqlx::PgPool;

use super::model::{Payment, Status};

/// Storage capability for payment aggregates.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn save(&self, payment: &Payment) -> Result<()>;
    async fn get(&self, payment_id: &str) -> Result<Payment>;
}

/// Mutex-guarded map, the default backing store.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    data: Mutex<HashMap<String, Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(payment.payment_id.clone(), payment.clone());
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Payment> {
        self.data
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("payment {payment_id} not found")))
    }
}

/// PostgreSQL-backed repository.
///
/// Expects the table:
/// `payments(payment_id TEXT PRIMARY KEY, user_id TEXT NOT NULL,
/// amount BIGINT NOT NULL, service TEXT NOT NULL, status TEXT NOT NULL,
/// reason TEXT, gateway_id TEXT)`.
pub struct SqlPaymentRepository {
    pool: PgPool,
}

impl SqlPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for SqlPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, user_id, amount, service, status, reason, gateway_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (payment_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                amount = EXCLUDED.amount,
                service = EXCLUDED.service,
                status = EXCLUDED.status,
                reason = EXCLUDED.reason,
                gateway_id = EXCLUDED.gateway_id
            "#,
        )
        .bind(&payment.payment_id)
        .bind(&payment.user_id)
        .bind(payment.amount)
        .bind(&payment.service)
        .bind(payment.status.as_str())
        .bind(&payment.reason)
        .bind(&payment.gateway_id)
        .execute(&self.pool)
        .await
        .map_err(|err| CoreError::internal("save payment").with_source(err))?;
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Payment> {
        let row: Option<(String, String, i64, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT payment_id, user_id, amount, service, status, reason, gateway_id
                FROM payments WHERE payment_id = $1
                "#,
            )
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| CoreError::internal("load payment").with_source(err))?;

        let (payment_id, user_id, amount, service, status, reason, gateway_id) = row
            .ok_or_else(|| CoreError::not_found(format!("payment {payment_id} not found")))?;
        Ok(Payment {
            payment_id,
            user_id,
            amount,
            service,
            status: status.parse::<Status>()?,
            reason,
            gateway_id,
        })
    }
}
