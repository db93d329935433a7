//! Shared fixtures for database tests.

use crate::config::{Config, DatabaseConfig, PoolSettings};
use crate::db::handlers::{Members, Repository};
use crate::db::models::members::MemberCreateDBRequest;
use crate::db::pools::PooledDataSource;
use crate::types::Money;
use sqlx::SqlitePool;

/// Insert members with the given balances.
pub async fn seed_members(pool: &SqlitePool, members: &[(&str, Money)]) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Members::new(&mut conn);
    for (member_id, money) in members {
        repo.create(&MemberCreateDBRequest {
            member_id: member_id.to_string(),
            money: *money,
        })
        .await
        .expect("Failed to seed member");
    }
}

/// Delete members, ignoring IDs that do not exist.
pub async fn delete_members(pool: &SqlitePool, member_ids: &[&str]) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Members::new(&mut conn);
    for member_id in member_ids {
        repo.delete(member_id).await.expect("Failed to delete member");
    }
}

/// Current balance of a member, read on a fresh connection.
pub async fn balance(pool: &SqlitePool, member_id: &str) -> Money {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Members::new(&mut conn).find_by_id(member_id).await.expect("Member should exist").money
}

/// Pooled data source over the same database as `pool`, limited to one connection.
///
/// A call that fails to give its connection back makes the next call time out.
pub async fn single_connection_source(pool: &SqlitePool) -> PooledDataSource {
    let settings = PoolSettings {
        max_connections: 1,
        min_connections: 0,
        acquire_timeout_secs: 5,
        ..Default::default()
    };
    PooledDataSource::connect("Single", pool.connect_options().as_ref().clone(), &settings)
        .await
        .expect("Failed to create single connection pool")
}

/// Config pointing at the database behind `pool`.
pub fn create_test_config(pool: &SqlitePool, pooled: bool) -> Config {
    let url = format!("sqlite://{}", pool.connect_options().get_filename().display());
    let database = if pooled {
        DatabaseConfig::Pooled {
            url,
            pool_name: "TestPool".to_string(),
            pool: PoolSettings {
                max_connections: 2,
                ..Default::default()
            },
        }
    } else {
        DatabaseConfig::Unpooled { url }
    };

    Config {
        database,
        // The test harness has already applied migrations
        run_migrations: false,
        ..Default::default()
    }
}
