//! Database repository for members.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::members::{Member, MemberCreateDBRequest, MemberDBResponse, MemberUpdateDBRequest},
    },
    types::Money,
};
use sqlx::SqliteConnection;
use tracing::instrument;

/// Filter for listing members
#[derive(Debug, Clone)]
pub struct MemberFilter {
    pub skip: i64,
    pub limit: i64,
}

impl MemberFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

impl Default for MemberFilter {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

/// Member repository bound to a caller-supplied connection.
///
/// The connection may be in autocommit mode or inside a transaction; the repository does
/// not care and never commits on its own.
pub struct Members<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Members<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Get a member by ID, failing with [`DbError::NotFound`] when there is no such row
    pub async fn find_by_id(&mut self, member_id: &str) -> Result<MemberDBResponse> {
        self.get_by_id(member_id).await?.ok_or(DbError::NotFound)
    }

    /// Replace a member's balance
    pub async fn set_money(&mut self, member_id: &str, money: Money) -> Result<MemberDBResponse> {
        self.update(member_id, &MemberUpdateDBRequest { money }).await
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Members<'c> {
    type CreateRequest = MemberCreateDBRequest;
    type UpdateRequest = MemberUpdateDBRequest;
    type Response = MemberDBResponse;
    type Id = str;
    type Filter = MemberFilter;

    #[instrument(skip(self, request), fields(member_id = %request.member_id, money = request.money), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        sqlx::query("INSERT INTO member (member_id, money) VALUES (?, ?)")
            .bind(&request.member_id)
            .bind(request.money)
            .execute(&mut *self.db)
            .await?;

        Ok(Member::new(request.member_id.clone(), request.money))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, member_id: &Self::Id) -> Result<Option<Self::Response>> {
        let member = sqlx::query_as::<_, Member>("SELECT member_id, money FROM member WHERE member_id = ?")
            .bind(member_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(member)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT member_id, money
            FROM member
            ORDER BY member_id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(members)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, member_id: &Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM member WHERE member_id = ?")
            .bind(member_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(money = request.money), err)]
    async fn update(&mut self, member_id: &Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let result = sqlx::query("UPDATE member SET money = ? WHERE member_id = ?")
            .bind(request.money)
            .bind(member_id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(Member::new(member_id, request.money))
    }
}
