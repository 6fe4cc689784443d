use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Row, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;

/// One `.sql` file from the migrations directory. Files are applied in
/// filename order, each inside its own transaction, and recorded with a
/// content checksum.
#[derive(Debug, Clone)]
pub struct Migration {
    pub filename: String,
    pub content: String,
    pub checksum: String,
    pub applied_at: Option<NaiveDateTime>,
}

pub struct Migrator<'a> {
    pool: &'a Pool<Sqlite>,
    migrations_dir: String,
}

impl<'a> Migrator<'a> {
    pub fn new(pool: &'a Pool<Sqlite>, migrations_dir: &str) -> Self {
        Self {
            pool,
            migrations_dir: migrations_dir.to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn run_pending_migrations(&self) -> Result<u32, AppError> {
        self.ensure_migrations_table().await?;

        let migration_files = self.migration_files()?;
        let applied = self.applied_migrations().await?;
        let pending = find_pending_migrations(&migration_files, &applied);

        for migration in &pending {
            self.run_migration(migration).await?;
            info!("Applied migration: {}", migration.filename);
        }

        if pending.is_empty() {
            info!("No pending migrations to run");
        } else {
            info!("Successfully applied {} migrations", pending.len());
        }

        Ok(pending.len() as u32)
    }

    /// Every migration file with its applied-at timestamp filled in where
    /// the bookkeeping table has one.
    pub async fn migration_status(&self) -> Result<Vec<Migration>, AppError> {
        self.ensure_migrations_table().await?;

        let mut files = self.migration_files()?;
        let applied = self.applied_migrations().await?;

        for file in files.iter_mut() {
            if let Some(row) = applied.get(&file.filename) {
                file.applied_at = row.applied_at;
            }
        }

        Ok(files)
    }

    async fn ensure_migrations_table(&self) -> Result<(), AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY,
                filename TEXT NOT NULL UNIQUE,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                checksum TEXT
            )",
        )
        .execute(self.pool)
        .await?;

        Ok(())
    }

    fn migration_files(&self) -> Result<Vec<Migration>, AppError> {
        let dir = Path::new(&self.migrations_dir);
        let entries = std::fs::read_dir(dir).map_err(|e| {
            AppError::Internal(format!(
                "Reading migrations directory {}: {}",
                self.migrations_dir, e
            ))
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| AppError::Internal(format!("Reading migration entry: {}", e)))?;
            let path = entry.path();
            if path.is_dir() || path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
                continue;
            }

            let content = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Internal(format!("Reading migration {}: {}", path.display(), e))
            })?;

            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();

            migrations.push(Migration {
                checksum: checksum_hex(&content),
                filename,
                content,
                applied_at: None,
            });
        }

        // Filename order keeps the application order consistent.
        migrations.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(migrations)
    }

    async fn applied_migrations(&self) -> Result<HashMap<String, Migration>, AppError> {
        let rows = sqlx::query("SELECT filename, applied_at, checksum FROM migrations")
            .fetch_all(self.pool)
            .await?;

        let mut applied = HashMap::new();
        for row in rows {
            let filename: String = row.get(0);
            let applied_at: Option<NaiveDateTime> = row.get(1);
            let checksum: Option<String> = row.get(2);

            applied.insert(
                filename.clone(),
                Migration {
                    filename,
                    content: String::new(),
                    checksum: checksum.unwrap_or_default(),
                    applied_at,
                },
            );
        }

        Ok(applied)
    }

    async fn run_migration(&self, migration: &Migration) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::raw_sql(&migration.content)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::Internal(format!(
                    "Executing migration {}: {}",
                    migration.filename, e
                ))
            })?;

        sqlx::query("INSERT INTO migrations (filename, checksum) VALUES (?, ?)")
            .bind(&migration.filename)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}

/// Checksum drift on an already-applied file is worth a warning but does
/// not block startup.
fn find_pending_migrations(files: &[Migration], applied: &HashMap<String, Migration>) -> Vec<Migration> {
    let mut pending = Vec::new();

    for file in files {
        if let Some(applied_migration) = applied.get(&file.filename) {
            if !applied_migration.checksum.is_empty() && applied_migration.checksum != file.checksum
            {
                warn!(
                    filename = %file.filename,
                    "Migration has different checksum than when applied"
                );
            }
            continue;
        }

        pending.push(file.clone());
    }

    pending
}

fn checksum_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &Pool<Sqlite>, migrations_dir: &str) -> Result<u32, AppError> {
    info!("Running database migrations");
    Migrator::new(pool, migrations_dir).run_pending_migrations().await
}
