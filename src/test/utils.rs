use std::collections::HashMap;
use std::sync::Once;

use rocket::http::Header;
use rocket::local::asynchronous::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::db::{create_local_user, propose_program, set_program_visibility, set_rating, set_vote};
use crate::error::AppError;
use crate::migrations::run_migrations;
use crate::models::ProposeRequest;

static INIT: Once = Once::new();

pub struct TestUser {
    pub email: String,
    pub name: String,
    pub role: String,
}

pub struct TestProgram {
    pub university: String,
    pub name: String,
    pub degree_type: String,
    pub country: String,
    pub city: String,
    pub state: Option<String>,
    pub url: Option<String>,
    pub cost: String,
    pub approved: bool,
}

impl TestProgram {
    pub fn new(university: &str, name: &str) -> Self {
        Self {
            university: university.to_string(),
            name: name.to_string(),
            degree_type: "masters".to_string(),
            country: "United States".to_string(),
            city: "Boston".to_string(),
            state: None,
            url: None,
            cost: "low".to_string(),
            approved: true,
        }
    }

    pub fn degree_type(mut self, degree_type: &str) -> Self {
        self.degree_type = degree_type.to_string();
        self
    }

    pub fn country(mut self, country: &str) -> Self {
        self.country = country.to_string();
        self
    }

    pub fn city(mut self, city: &str) -> Self {
        self.city = city.to_string();
        self
    }

    pub fn pending(mut self) -> Self {
        self.approved = false;
        self
    }
}

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    programs: Vec<TestProgram>,
    votes: Vec<(String, String, i64)>,
    ratings: Vec<(String, String, i64)>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, email: &str, name: &str) -> Self {
        self.users.push(TestUser {
            email: email.to_string(),
            name: name.to_string(),
            role: "user".to_string(),
        });
        self
    }

    pub fn admin(mut self, email: &str, name: &str) -> Self {
        self.users.push(TestUser {
            email: email.to_string(),
            name: name.to_string(),
            role: "admin".to_string(),
        });
        self
    }

    pub fn program(mut self, university: &str, name: &str) -> Self {
        self.programs.push(TestProgram::new(university, name));
        self
    }

    pub fn program_with(mut self, program: TestProgram) -> Self {
        self.programs.push(program);
        self
    }

    pub fn vote(mut self, email: &str, program_name: &str, value: i64) -> Self {
        self.votes
            .push((email.to_string(), program_name.to_string(), value));
        self
    }

    pub fn rating(mut self, email: &str, program_name: &str, value: i64) -> Self {
        self.ratings
            .push((email.to_string(), program_name.to_string(), value));
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });

        // A single connection keeps the in-memory database alive and
        // visible to every query in the test.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        run_migrations(&pool, "migrations").await?;

        let mut user_id_map: HashMap<String, i64> = HashMap::new();
        let mut program_id_map: HashMap<String, i64> = HashMap::new();

        for user in &self.users {
            let created = create_local_user(&pool, &user.email, &user.name, &user.role).await?;
            user_id_map.insert(user.email.clone(), created.id);
        }

        for program in &self.programs {
            let request = ProposeRequest {
                university_name: program.university.clone(),
                program_name: program.name.clone(),
                description: format!("{} at {}", program.name, program.university),
                degree_type: program.degree_type.clone(),
                country: program.country.clone(),
                city: program.city.clone(),
                state: program.state.clone(),
                url: program.url.clone(),
                cost: program.cost.clone(),
            };

            let created = propose_program(&pool, &request).await?;
            program_id_map.insert(program.name.clone(), created.id);

            if program.approved {
                set_program_visibility(&pool, created.id, "approved").await?;
            }
        }

        for (email, program_name, value) in &self.votes {
            let user_id = user_id_map[email];
            let program_id = program_id_map[program_name];
            set_vote(&pool, user_id, program_id, *value).await?;
        }

        for (email, program_name, value) in &self.ratings {
            let user_id = user_id_map[email];
            let program_id = program_id_map[program_name];
            set_rating(&pool, user_id, program_id, *value).await?;
        }

        Ok(TestDb {
            pool,
            user_id_map,
            program_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    user_id_map: HashMap<String, i64>,
    program_id_map: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, email: &str) -> Option<i64> {
        self.user_id_map.get(email).copied()
    }

    pub fn program_id(&self, name: &str) -> Option<i64> {
        self.program_id_map.get(name).copied()
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        migrations_dir: "migrations".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

/// The bearer token for a builder-seeded user: local users are keyed by a
/// `local_<email>` provider id.
pub fn bearer(email: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer local_{}", email))
}

pub async fn setup_test_client(test_db: &TestDb) -> Client {
    let rocket = crate::init_rocket(test_db.pool.clone(), test_config()).await;
    Client::tracked(rocket)
        .await
        .expect("valid rocket instance")
}
