use std::path::Path;

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub migrations_dir: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Self {
        let database_url =
            env_or("DATABASE_URL", "sqlite://degree_directory.db?mode=rwc");
        let migrations_dir = env_or("MIGRATIONS_DIR", "migrations");

        let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            _ => vec![
                "http://localhost:3000".to_string(),
                "https://graddegrees.app".to_string(),
                "https://www.graddegrees.app".to_string(),
            ],
        };

        Self {
            database_url,
            migrations_dir,
            allowed_origins,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

pub fn load_environment() {
    for env_file in [".env", ".secrets.env"] {
        if !Path::new(env_file).exists() {
            continue;
        }
        match dotenvy::from_filename_override(env_file) {
            Ok(_) => info!("Loaded environment from: {}", env_file),
            Err(e) => warn!("Could not load {}: {}", env_file, e),
        }
    }
}
