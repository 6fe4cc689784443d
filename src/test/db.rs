#[cfg(test)]
mod tests {
    use crate::db::{
        ProgramFilters, find_or_create_university, list_all_programs, list_programs,
        set_program_visibility, set_vote,
    };
    use crate::error::AppError;
    use crate::test::utils::{TestDbBuilder, TestProgram};

    use rocket::tokio;

    fn filters(degree_type: Option<&str>, sort_by: Option<&str>, sort_order: Option<&str>) -> ProgramFilters {
        ProgramFilters {
            degree_type: degree_type.map(String::from),
            sort_by: sort_by.map(String::from),
            sort_order: sort_order.map(String::from),
            ..ProgramFilters::default()
        }
    }

    #[tokio::test]
    async fn test_filtered_sorted_listing() {
        let test_db = TestDbBuilder::new()
            .program_with(TestProgram::new("Beta University", "ML Masters").degree_type("masters"))
            .program_with(TestProgram::new("Alpha University", "AI Masters").degree_type("masters"))
            .program_with(TestProgram::new("Gamma University", "CS PhD").degree_type("phd"))
            .build()
            .await
            .expect("Failed to build test db");

        let programs = list_programs(
            &test_db.pool,
            None,
            &filters(Some("masters"), Some("name"), Some("asc")),
        )
        .await
        .expect("Failed to list programs");

        let names: Vec<&str> = programs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["AI Masters", "ML Masters"]);
        assert!(programs.iter().all(|p| p.degree_type == "masters"));
    }

    #[tokio::test]
    async fn test_equal_sort_keys_break_ties_by_id() {
        let test_db = TestDbBuilder::new()
            .program_with(TestProgram::new("First University", "Same Name"))
            .program_with(TestProgram::new("Second University", "Same Name").city("Chicago"))
            .build()
            .await
            .expect("Failed to build test db");

        let programs = list_programs(
            &test_db.pool,
            None,
            &filters(None, Some("name"), Some("asc")),
        )
        .await
        .expect("Failed to list programs");

        assert_eq!(programs.len(), 2);
        assert!(programs[0].id < programs[1].id);
    }

    #[tokio::test]
    async fn test_listing_excludes_pending_and_empty_match_is_ok() {
        let test_db = TestDbBuilder::new()
            .program_with(TestProgram::new("Visible University", "Visible Program"))
            .program_with(TestProgram::new("Hidden University", "Hidden Program").pending())
            .build()
            .await
            .expect("Failed to build test db");

        let programs = list_programs(&test_db.pool, None, &ProgramFilters::default())
            .await
            .expect("Failed to list programs");

        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].name, "Visible Program");

        let none = list_programs(&test_db.pool, None, &filters(Some("phd"), None, None))
            .await
            .expect("Listing with no matches should not fail");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_admin_listing_includes_pending() {
        let test_db = TestDbBuilder::new()
            .program_with(TestProgram::new("Visible University", "Visible Program"))
            .program_with(TestProgram::new("Hidden University", "Hidden Program").pending())
            .build()
            .await
            .expect("Failed to build test db");

        let programs = list_all_programs(&test_db.pool, &ProgramFilters::default())
            .await
            .expect("Failed to list all programs");

        assert_eq!(programs.len(), 2);
    }

    #[tokio::test]
    async fn test_vote_upsert_is_idempotent() {
        let test_db = TestDbBuilder::new()
            .user("alice@example.com", "Alice")
            .program("Some University", "Some Program")
            .build()
            .await
            .expect("Failed to build test db");

        let user_id = test_db.user_id("alice@example.com").unwrap();
        let program_id = test_db.program_id("Some Program").unwrap();

        set_vote(&test_db.pool, user_id, program_id, 1)
            .await
            .expect("First vote failed");
        set_vote(&test_db.pool, user_id, program_id, 1)
            .await
            .expect("Second vote failed");

        let (count, total): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(vote), 0) FROM votes WHERE program_id = ?")
                .bind(program_id)
                .fetch_one(&test_db.pool)
                .await
                .expect("Failed to count votes");

        assert_eq!(count, 1);
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_vote_zero_removes_row() {
        let test_db = TestDbBuilder::new()
            .user("alice@example.com", "Alice")
            .program("Some University", "Some Program")
            .vote("alice@example.com", "Some Program", 1)
            .build()
            .await
            .expect("Failed to build test db");

        let user_id = test_db.user_id("alice@example.com").unwrap();
        let program_id = test_db.program_id("Some Program").unwrap();

        crate::db::remove_vote(&test_db.pool, user_id, program_id)
            .await
            .expect("Failed to remove vote");

        let programs = list_programs(&test_db.pool, Some(user_id), &ProgramFilters::default())
            .await
            .expect("Failed to list programs");

        assert_eq!(programs.len(), 1);
        assert!(programs[0].user_vote.is_none());
    }

    #[tokio::test]
    async fn test_aggregate_rating_is_average_of_user_ratings() {
        let test_db = TestDbBuilder::new()
            .user("alice@example.com", "Alice")
            .user("bob@example.com", "Bob")
            .program("Some University", "Some Program")
            .rating("alice@example.com", "Some Program", 4)
            .rating("bob@example.com", "Some Program", 2)
            .build()
            .await
            .expect("Failed to build test db");

        let programs = list_programs(&test_db.pool, None, &ProgramFilters::default())
            .await
            .expect("Failed to list programs");

        assert_eq!(programs.len(), 1);
        assert!((programs[0].average_rating - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_caller_reactions_merged_into_listing() {
        let test_db = TestDbBuilder::new()
            .user("alice@example.com", "Alice")
            .user("bob@example.com", "Bob")
            .program("Some University", "Some Program")
            .vote("alice@example.com", "Some Program", -1)
            .rating("alice@example.com", "Some Program", 5)
            .rating("bob@example.com", "Some Program", 1)
            .build()
            .await
            .expect("Failed to build test db");

        let user_id = test_db.user_id("alice@example.com").unwrap();
        let programs = list_programs(&test_db.pool, Some(user_id), &ProgramFilters::default())
            .await
            .expect("Failed to list programs");

        assert_eq!(programs[0].user_vote, Some(-1));
        assert_eq!(programs[0].user_rating, Some(5));
    }

    #[tokio::test]
    async fn test_find_or_create_university_creates_once() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test db");

        let first = find_or_create_university(&test_db.pool, "Foo U")
            .await
            .expect("First lookup failed");
        let second = find_or_create_university(&test_db.pool, "Foo U")
            .await
            .expect("Second lookup failed");

        assert_eq!(first, second);

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM universities WHERE name = 'Foo U'")
                .fetch_one(&test_db.pool)
                .await
                .expect("Failed to count universities");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_visibility_transitions_exactly_once() {
        let test_db = TestDbBuilder::new()
            .program_with(TestProgram::new("Some University", "Some Program").pending())
            .build()
            .await
            .expect("Failed to build test db");

        let program_id = test_db.program_id("Some Program").unwrap();

        set_program_visibility(&test_db.pool, program_id, "approved")
            .await
            .expect("First transition failed");

        let result = set_program_visibility(&test_db.pool, program_id, "rejected").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let (visibility,): (String,) =
            sqlx::query_as("SELECT visibility FROM programs WHERE id = ?")
                .bind(program_id)
                .fetch_one(&test_db.pool)
                .await
                .expect("Failed to read visibility");
        assert_eq!(visibility, "approved");
    }
}
