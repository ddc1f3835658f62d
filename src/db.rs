use anyhow::Context;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

/// Schema for `users` and `bids`, embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

#[cfg(test)]
mod tests {
    use super::MIGRATOR;

    #[test]
    fn migrator_embeds_users_and_bids() {
        let descriptions: Vec<String> = MIGRATOR
            .iter()
            .map(|m| m.description.to_string())
            .collect();
        assert!(descriptions.iter().any(|d| d == "create users table"));
        assert!(descriptions.iter().any(|d| d == "create bids table"));
    }

    #[test]
    fn bids_migration_declares_indexes_and_soft_delete() {
        let up = MIGRATOR
            .iter()
            .find(|m| m.description == "create bids table" && m.migration_type.is_up_migration())
            .expect("bids up migration");
        let sql = up.sql.to_lowercase();
        assert!(sql.contains("bid_id"));
        assert!(sql.contains("deleted_at"));
        assert!(sql.contains("on bids (user_id)"));
        assert!(sql.contains("on bids (auction_id)"));
    }

    #[test]
    fn bids_migration_is_reversible() {
        let down = MIGRATOR
            .iter()
            .find(|m| m.description == "create bids table" && m.migration_type.is_down_migration())
            .expect("bids down migration");
        assert!(down.sql.to_lowercase().contains("drop table if exists bids"));
    }
}
