#[cfg(test)]
mod tests {
    use crate::migrations::{Migrator, run_migrations};

    use rocket::tokio;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    async fn fresh_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database")
    }

    #[tokio::test]
    async fn test_migrations_apply_once_in_filename_order() {
        let pool = fresh_pool().await;

        let applied = run_migrations(&pool, "migrations")
            .await
            .expect("First run failed");
        assert!(applied >= 3);

        let status = Migrator::new(&pool, "migrations")
            .migration_status()
            .await
            .expect("Status failed");

        let filenames: Vec<&str> = status.iter().map(|m| m.filename.as_str()).collect();
        let mut sorted = filenames.clone();
        sorted.sort();
        assert_eq!(filenames, sorted);
        assert!(status.iter().all(|m| m.applied_at.is_some()));

        let reapplied = run_migrations(&pool, "migrations")
            .await
            .expect("Second run failed");
        assert_eq!(reapplied, 0);
    }

    #[tokio::test]
    async fn test_checksum_drift_warns_but_does_not_block() {
        let pool = fresh_pool().await;

        run_migrations(&pool, "migrations")
            .await
            .expect("First run failed");

        sqlx::query("UPDATE migrations SET checksum = 'deadbeef' WHERE filename = '0001_init.sql'")
            .execute(&pool)
            .await
            .expect("Failed to corrupt checksum");

        // Drift on an applied file logs a warning; nothing re-runs.
        let reapplied = run_migrations(&pool, "migrations")
            .await
            .expect("Run after drift failed");
        assert_eq!(reapplied, 0);
    }

    #[tokio::test]
    async fn test_schema_supports_upsert_constraints() {
        let pool = fresh_pool().await;
        run_migrations(&pool, "migrations")
            .await
            .expect("Migration run failed");

        // The vote/rating upserts depend on these uniqueness constraints.
        for table in ["votes", "ratings"] {
            let sql: (String,) = sqlx::query_as(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("Missing table");
            assert!(
                sql.0.contains("UNIQUE (user_id, program_id)"),
                "{} lacks the (user_id, program_id) uniqueness constraint",
                table
            );
        }
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let pool = fresh_pool().await;

        let result = run_migrations(&pool, "no_such_directory").await;
        assert!(result.is_err());
    }
}
