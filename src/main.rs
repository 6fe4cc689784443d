#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod cors;
mod db;
mod error;
mod migrations;
mod models;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use api::{
    api_admin_all_programs, api_admin_get_program, api_admin_pending_programs,
    api_admin_program_action, api_admin_proposals, api_admin_review_proposal,
    api_admin_update_program, api_auth, api_create_proposal, api_delete_proposal, api_local_auth,
    api_programs, api_propose_program, api_rate_program, api_update_proposal, api_user_proposals,
    api_vote, health,
};
use auth::{forbidden_api, unauthorized_api};
use config::Config;
use cors::Cors;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{Metrics, RequestTelemetry};
use tracing::{error, info};

fn main() {
    // Runtime configuration mirrors what Rocket's `#[launch]`/`async_main`
    // derives from its figment (worker threads, blocking threads, forced
    // shutdown). Building the runtime by hand lets the startup future run on
    // `block_on`, which — unlike `rocket::async_main` — imposes no `Send`
    // bound on it.
    let rocket_config: rocket::Config = rocket::Config::figment()
        .extract()
        .expect("Failed to extract Rocket configuration");

    let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
        .thread_name("rocket-worker-thread")
        .worker_threads(rocket_config.workers)
        .max_blocking_threads(rocket_config.max_blocking)
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    let result = runtime.block_on(async {
        telemetry::init_tracing();
        config::load_environment();

        let config = Config::load();

        let pool = db::connect(&config.database_url)
            .await
            .expect("Failed to connect to database");

        info!("Running database migrations...");
        match migrations::run_migrations(&pool, &config.migrations_dir).await {
            Ok(applied) => info!("Migrations completed successfully ({} applied)", applied),
            Err(e) => {
                error!("Failed to run migrations: {}", e);
                panic!("Database migration failed: {}", e);
            }
        }

        init_rocket(pool, config).await.launch().await
    });

    if rocket_config.shutdown.force {
        runtime.shutdown_timeout(std::time::Duration::from_millis(500));
    }

    if let Err(e) = result {
        error!("Rocket failed to launch: {}", e);
    }
}

pub async fn init_rocket(pool: SqlitePool, config: Config) -> Rocket<Build> {
    info!("Starting degree directory API");

    rocket::build()
        .manage(pool)
        .manage(Metrics::new())
        .mount(
            "/api",
            routes![
                health,
                api_auth,
                api_local_auth,
                api_programs,
                api_vote,
                api_rate_program,
                api_propose_program,
                api_create_proposal,
                api_user_proposals,
                api_update_proposal,
                api_delete_proposal,
                api_admin_pending_programs,
                api_admin_program_action,
                api_admin_all_programs,
                api_admin_get_program,
                api_admin_update_program,
                api_admin_proposals,
                api_admin_review_proposal,
            ],
        )
        .mount("/", routes![cors::preflight])
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .attach(Cors::new(config.allowed_origins))
        .attach(RequestTelemetry)
}
