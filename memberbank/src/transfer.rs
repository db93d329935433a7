//! Transactional money transfer between two members.
//!
//! A transfer is one unit of work on one connection:
//!
//! ```text
//! validate ─► get connection ─► BEGIN IMMEDIATE ─► load both ─► debit ─► hook ─► credit ─► COMMIT
//!                                              │          │        │        │
//!                                              └──────────┴────────┴────────┴──► ROLLBACK
//!                                                                                    │
//!                                                              release connection ◄──┘
//! ```
//!
//! The debit and the credit either both become visible or neither does. The connection is
//! released on every exit path. A [`TransferHook`] runs between the two updates, which is
//! where tests inject a failure to watch the rollback happen.

use crate::db::{
    datasource::DataSource,
    errors::DbError,
    handlers::{members::Members, repository::Repository},
    models::members::Member,
};
use crate::errors::Error;
use crate::types::{MemberId, Money};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, SqliteConnection};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Runs between the debit and the credit of a transfer, inside the transaction.
///
/// Returning an error aborts the transfer and rolls back the debit.
pub trait TransferHook: Send + Sync + std::fmt::Debug {
    fn after_debit(&self, from_id: &str, to_id: &str, amount: Money) -> Result<(), Error>;
}

/// Hook that never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl TransferHook for NoopHook {
    fn after_debit(&self, _from_id: &str, _to_id: &str, _amount: Money) -> Result<(), Error> {
        Ok(())
    }
}

/// Hook that fails with [`Error::Business`] once the debit has been applied.
#[derive(Debug, Clone, Default)]
pub struct FailAfterDebit {
    /// Only fail transfers crediting this member. `None` fails every transfer.
    credit_to: Option<MemberId>,
}

impl FailAfterDebit {
    pub fn always() -> Self {
        Self { credit_to: None }
    }

    pub fn crediting(member_id: impl Into<MemberId>) -> Self {
        Self {
            credit_to: Some(member_id.into()),
        }
    }
}

impl TransferHook for FailAfterDebit {
    fn after_debit(&self, from_id: &str, to_id: &str, _amount: Money) -> Result<(), Error> {
        match &self.credit_to {
            Some(target) if target != to_id => Ok(()),
            _ => Err(Error::Business {
                message: format!("transfer from {from_id} to {to_id} failed after debit"),
            }),
        }
    }
}

/// Balances of both parties after a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: Member,
    pub to: Member,
    pub amount: Money,
}

#[derive(Debug, Clone)]
pub struct TransferService {
    data_source: Arc<dyn DataSource>,
    hook: Arc<dyn TransferHook>,
}

impl TransferService {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self::with_hook(data_source, Arc::new(NoopHook))
    }

    pub fn with_hook(data_source: Arc<dyn DataSource>, hook: Arc<dyn TransferHook>) -> Self {
        Self { data_source, hook }
    }

    /// Move `amount` from `from_id` to `to_id` atomically.
    ///
    /// Invalid input is rejected with [`Error::BadRequest`] before a connection is acquired.
    #[instrument(skip(self), fields(data_source = %self.data_source.describe()), err)]
    pub async fn transfer(&self, from_id: &str, to_id: &str, amount: Money) -> Result<TransferReceipt, Error> {
        validate(from_id, to_id, amount)?;

        let mut conn = self.data_source.get_connection().await?;
        let result = self.transfer_on(&mut conn, from_id, to_id, amount).await;
        conn.release().await;
        result
    }

    /// Run the transfer in a transaction on a connection the caller owns.
    ///
    /// Commits on success and rolls back on failure. The connection is left in autocommit
    /// mode either way and is not released.
    pub async fn transfer_on(
        &self,
        conn: &mut SqliteConnection,
        from_id: &str,
        to_id: &str,
        amount: Money,
    ) -> Result<TransferReceipt, Error> {
        // Write lock up front: a deferred transaction upgrading from read to write gets
        // SQLITE_BUSY immediately while another connection holds a read lock
        let mut tx = conn.begin_with("BEGIN IMMEDIATE").await.map_err(DbError::from)?;

        match self.move_money(&mut tx, from_id, to_id, amount).await {
            Ok(receipt) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(from = %from_id, to = %to_id, amount, "transfer committed");
                Ok(receipt)
            }
            Err(e) => {
                // Keep the original error; a failed rollback is only logged
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "failed to roll back transfer");
                }
                warn!(from = %from_id, to = %to_id, amount, error = %e, "transfer rolled back");
                Err(e)
            }
        }
    }

    async fn move_money(&self, conn: &mut SqliteConnection, from_id: &str, to_id: &str, amount: Money) -> Result<TransferReceipt, Error> {
        let mut members = Members::new(conn);

        let from = members.get_by_id(from_id).await?.ok_or_else(|| member_not_found(from_id))?;
        let to = members.get_by_id(to_id).await?.ok_or_else(|| member_not_found(to_id))?;

        let debited = from.money.checked_sub(amount).ok_or_else(|| Error::BadRequest {
            message: format!("Debiting {amount} from {from_id} overflows its balance"),
        })?;
        members.set_money(from_id, debited).await?;

        self.hook.after_debit(from_id, to_id, amount)?;

        let credited = to.money.checked_add(amount).ok_or_else(|| Error::BadRequest {
            message: format!("Crediting {amount} to {to_id} overflows its balance"),
        })?;
        members.set_money(to_id, credited).await?;

        Ok(TransferReceipt {
            from: Member::new(from_id, debited),
            to: Member::new(to_id, credited),
            amount,
        })
    }
}

fn validate(from_id: &str, to_id: &str, amount: Money) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::BadRequest {
            message: format!("Transfer amount must be positive, got {amount}"),
        });
    }
    if from_id == to_id {
        return Err(Error::BadRequest {
            message: "Cannot transfer to the same member".to_string(),
        });
    }
    Ok(())
}

fn member_not_found(member_id: &str) -> Error {
    Error::NotFound {
        resource: "Member".to_string(),
        id: member_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::db::datasource::UnpooledDataSource;
    use crate::db::pools::PooledDataSource;
    use crate::test_utils::{balance, delete_members, seed_members};
    use sqlx::SqlitePool;

    const MEMBER_A: &str = "memberA";
    const MEMBER_B: &str = "memberB";

    #[sqlx::test]
    #[test_log::test]
    async fn test_transfer_success(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 10000), (MEMBER_B, 10000)]).await;
        let service = TransferService::new(Arc::new(PooledDataSource::new("TestPool", pool.clone())));

        let receipt = service.transfer(MEMBER_A, MEMBER_B, 2000).await.unwrap();

        assert_eq!(receipt.from, Member::new(MEMBER_A, 8000));
        assert_eq!(receipt.to, Member::new(MEMBER_B, 12000));
        assert_eq!(balance(&pool, MEMBER_A).await, 8000);
        assert_eq!(balance(&pool, MEMBER_B).await, 12000);

        delete_members(&pool, &[MEMBER_A, MEMBER_B]).await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_transfer_failure_after_debit_rolls_back(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 10000), ("ex", 10000)]).await;
        let service = TransferService::with_hook(
            Arc::new(PooledDataSource::new("TestPool", pool.clone())),
            Arc::new(FailAfterDebit::crediting("ex")),
        );

        let err = service.transfer(MEMBER_A, "ex", 2000).await.unwrap_err();

        assert!(matches!(err, Error::Business { .. }), "unexpected error: {err:?}");
        // The debit was undone
        assert_eq!(balance(&pool, MEMBER_A).await, 10000);
        assert_eq!(balance(&pool, "ex").await, 10000);

        delete_members(&pool, &[MEMBER_A, "ex"]).await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_filtered_hook_lets_other_transfers_through(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 100), (MEMBER_B, 0)]).await;
        let service = TransferService::with_hook(
            Arc::new(PooledDataSource::new("TestPool", pool.clone())),
            Arc::new(FailAfterDebit::crediting("ex")),
        );

        service.transfer(MEMBER_A, MEMBER_B, 40).await.unwrap();

        assert_eq!(balance(&pool, MEMBER_A).await, 60);
        assert_eq!(balance(&pool, MEMBER_B).await, 40);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_transfer_over_unpooled_source(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 500), (MEMBER_B, 0)]).await;
        let options = pool.connect_options().as_ref().clone();
        let service = TransferService::new(Arc::new(UnpooledDataSource::new(options)));

        service.transfer(MEMBER_A, MEMBER_B, 500).await.unwrap();

        assert_eq!(balance(&pool, MEMBER_A).await, 0);
        assert_eq!(balance(&pool, MEMBER_B).await, 500);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_transfer_to_missing_member_is_not_found(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 100)]).await;
        let service = TransferService::new(Arc::new(PooledDataSource::new("TestPool", pool.clone())));

        let err = service.transfer(MEMBER_A, "ghost", 10).await.unwrap_err();

        match err {
            Error::NotFound { resource, id } => {
                assert_eq!(resource, "Member");
                assert_eq!(id, "ghost");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(balance(&pool, MEMBER_A).await, 100);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalid_input_is_rejected_before_connecting(pool: SqlitePool) {
        // A closed pool cannot hand out connections, so reaching the database would
        // surface as a connection error instead of BadRequest
        let data_source = PooledDataSource::new("Closed", pool);
        data_source.close().await;
        let service = TransferService::new(Arc::new(data_source));

        for (from, to, amount) in [(MEMBER_A, MEMBER_B, 0), (MEMBER_A, MEMBER_B, -5), (MEMBER_A, MEMBER_A, 10)] {
            let err = service.transfer(from, to, amount).await.unwrap_err();
            assert!(matches!(err, Error::BadRequest { .. }), "unexpected error: {err:?}");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_credit_overflow_rolls_back(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 10), (MEMBER_B, i64::MAX)]).await;
        let service = TransferService::new(Arc::new(PooledDataSource::new("TestPool", pool.clone())));

        let err = service.transfer(MEMBER_A, MEMBER_B, 10).await.unwrap_err();

        assert!(matches!(err, Error::BadRequest { .. }), "unexpected error: {err:?}");
        assert_eq!(balance(&pool, MEMBER_A).await, 10);
        assert_eq!(balance(&pool, MEMBER_B).await, i64::MAX);
    }

    /// Seed eight disjoint pairs, run one transfer per pair on its own task, and check
    /// every pair moved exactly its own amount.
    async fn assert_disjoint_transfers_do_not_interfere(pool: &SqlitePool, service: TransferService) {
        let pairs: Vec<(String, String, Money)> = (0..8)
            .map(|i| (format!("from{i}"), format!("to{i}"), 100 * (i as i64 + 1)))
            .collect();
        let mut seed = Vec::new();
        for (from, to, _) in &pairs {
            seed.push((from.as_str(), 1000));
            seed.push((to.as_str(), 0));
        }
        seed_members(pool, &seed).await;

        let handles = pairs.iter().cloned().map(|(from, to, amount)| {
            let service = service.clone();
            tokio::spawn(async move { service.transfer(&from, &to, amount).await })
        });
        let results = futures::future::join_all(handles).await;

        for ((from, to, amount), result) in pairs.iter().zip(results) {
            let receipt = result.unwrap().unwrap();
            assert_eq!(receipt.amount, *amount);
            assert_eq!(balance(pool, from).await, 1000 - amount);
            assert_eq!(balance(pool, to).await, *amount);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_disjoint_transfers_over_pool(pool: SqlitePool) {
        let settings = PoolSettings {
            max_connections: 8,
            acquire_timeout_secs: 10,
            ..Default::default()
        };
        let data_source = PooledDataSource::connect("Multi", pool.connect_options().as_ref().clone(), &settings)
            .await
            .unwrap();

        assert_disjoint_transfers_do_not_interfere(&pool, TransferService::new(Arc::new(data_source))).await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_disjoint_transfers_over_unpooled_source(pool: SqlitePool) {
        let data_source = UnpooledDataSource::new(pool.connect_options().as_ref().clone());

        assert_disjoint_transfers_do_not_interfere(&pool, TransferService::new(Arc::new(data_source))).await;
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_transfer_on_leaves_connection_usable(pool: SqlitePool) {
        seed_members(&pool, &[(MEMBER_A, 100), (MEMBER_B, 0)]).await;
        let service = TransferService::with_hook(Arc::new(PooledDataSource::new("TestPool", pool.clone())), Arc::new(FailAfterDebit::always()));

        let mut conn = pool.acquire().await.unwrap();
        let err = service.transfer_on(&mut conn, MEMBER_A, MEMBER_B, 50).await.unwrap_err();
        assert!(matches!(err, Error::Business { .. }));

        // Back in autocommit mode: this write is visible to other connections immediately
        Members::new(&mut conn).set_money(MEMBER_B, 7).await.unwrap();
        drop(conn);

        assert_eq!(balance(&pool, MEMBER_A).await, 100);
        assert_eq!(balance(&pool, MEMBER_B).await, 7);
    }

    #[test]
    fn test_fail_after_debit_filter() {
        let hook = FailAfterDebit::crediting("ex");
        assert!(hook.after_debit(MEMBER_A, MEMBER_B, 1).is_ok());
        assert!(matches!(hook.after_debit(MEMBER_A, "ex", 1), Err(Error::Business { .. })));

        assert!(FailAfterDebit::always().after_debit(MEMBER_A, MEMBER_B, 1).is_err());
        assert!(NoopHook.after_debit(MEMBER_A, "ex", 1).is_ok());
    }
}
