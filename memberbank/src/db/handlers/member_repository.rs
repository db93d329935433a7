//! Member repository that manages its own connections.
//!
//! Every call obtains a connection from the [`DataSource`], runs one statement in autocommit
//! mode and releases the connection again, whether the statement succeeded or not. Callers
//! that need several statements on one connection (for example inside a transaction) use
//! [`Members`] directly with the connection they already hold.

use crate::db::{
    datasource::DataSource,
    errors::Result,
    handlers::members::{MemberFilter, Members},
    handlers::repository::Repository,
    models::members::{Member, MemberCreateDBRequest},
};
use crate::types::Money;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct MemberRepository {
    data_source: Arc<dyn DataSource>,
}

impl MemberRepository {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self { data_source }
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    #[instrument(skip(self, member), fields(member_id = %member.member_id), err)]
    pub async fn save(&self, member: &Member) -> Result<Member> {
        let mut conn = self.data_source.get_connection().await?;
        let result = Members::new(&mut conn).create(&MemberCreateDBRequest::from(member)).await;
        conn.release().await;
        result
    }

    #[instrument(skip(self), err)]
    pub async fn find_by_id(&self, member_id: &str) -> Result<Member> {
        let mut conn = self.data_source.get_connection().await?;
        let result = Members::new(&mut conn).find_by_id(member_id).await;
        conn.release().await;
        result
    }

    #[instrument(skip(self), err)]
    pub async fn update(&self, member_id: &str, money: Money) -> Result<()> {
        let mut conn = self.data_source.get_connection().await?;
        let result = Members::new(&mut conn).set_money(member_id, money).await;
        conn.release().await;
        result.map(|_| ())
    }

    /// Delete a member. Deleting an ID that does not exist is not an error.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, member_id: &str) -> Result<()> {
        let mut conn = self.data_source.get_connection().await?;
        let result = Members::new(&mut conn).delete(member_id).await;
        conn.release().await;
        result.map(|_| ())
    }

    #[instrument(skip(self), err)]
    pub async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>> {
        let mut conn = self.data_source.get_connection().await?;
        let result = Members::new(&mut conn).list(filter).await;
        conn.release().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::datasource::UnpooledDataSource;
    use crate::db::errors::DbError;
    use crate::db::pools::PooledDataSource;
    use crate::test_utils::single_connection_source;
    use sqlx::SqlitePool;

    fn pooled(pool: SqlitePool) -> MemberRepository {
        MemberRepository::new(Arc::new(PooledDataSource::new("TestPool", pool)))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_crud(pool: SqlitePool) {
        let repository = pooled(pool);

        // save
        let member = Member::new("memberV100", 10000);
        repository.save(&member).await.unwrap();

        // findById
        let found = repository.find_by_id(&member.member_id).await.unwrap();
        assert_eq!(found, member);

        // update: money 10000 -> 20000
        repository.update(&member.member_id, 20000).await.unwrap();
        let updated = repository.find_by_id(&member.member_id).await.unwrap();
        assert_eq!(updated.money, 20000);

        // delete
        repository.delete(&member.member_id).await.unwrap();
        let err = repository.find_by_id(&member.member_id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_crud_over_unpooled_source(pool: SqlitePool) {
        let options = pool.connect_options().as_ref().clone();
        let repository = MemberRepository::new(Arc::new(UnpooledDataSource::new(options)));

        repository.save(&Member::new("memberA", 500)).await.unwrap();
        repository.save(&Member::new("memberB", 700)).await.unwrap();

        let members = repository.list(&MemberFilter::default()).await.unwrap();
        assert_eq!(members, vec![Member::new("memberA", 500), Member::new("memberB", 700)]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_connection_released_after_failure(pool: SqlitePool) {
        // One connection only: if a failed call leaked it, the next call would time out
        let repository = MemberRepository::new(Arc::new(single_connection_source(&pool).await));

        repository.save(&Member::new("memberA", 1)).await.unwrap();
        let err = repository.save(&Member::new("memberA", 1)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert!(repository.find_by_id("missing").await.unwrap_err().is_not_found());

        assert_eq!(repository.find_by_id("memberA").await.unwrap().money, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_missing_member_is_ok(pool: SqlitePool) {
        let repository = pooled(pool);

        repository.delete("memberA").await.unwrap();
        repository.delete("memberB").await.unwrap();
    }
}
