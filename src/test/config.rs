#[cfg(test)]
mod tests {
    use crate::config::Config;

    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_when_environment_is_empty() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", None::<&str>),
                ("MIGRATIONS_DIR", None),
                ("CORS_ALLOWED_ORIGINS", None),
            ],
            || {
                let config = Config::load();
                assert_eq!(config.database_url, "sqlite://degree_directory.db?mode=rwc");
                assert_eq!(config.migrations_dir, "migrations");
                assert!(
                    config
                        .allowed_origins
                        .contains(&"http://localhost:3000".to_string())
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("sqlite://elsewhere.db")),
                ("MIGRATIONS_DIR", Some("db/migrations")),
                (
                    "CORS_ALLOWED_ORIGINS",
                    Some("https://one.example, https://two.example"),
                ),
            ],
            || {
                let config = Config::load();
                assert_eq!(config.database_url, "sqlite://elsewhere.db");
                assert_eq!(config.migrations_dir, "db/migrations");
                assert_eq!(
                    config.allowed_origins,
                    vec![
                        "https://one.example".to_string(),
                        "https://two.example".to_string()
                    ]
                );
            },
        );
    }
}
