use rocket::FromForm;

/// Exact-match filters and sort selection for program listings. Every
/// field is optional; empty strings are treated as absent.
#[derive(FromForm, Debug, Default, Clone)]
pub struct ProgramFilters {
    pub degree_type: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub cost: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Accumulates (predicate, parameter) pairs and renders positional
/// placeholders. Values are always bound, never interpolated; column
/// names come from the fixed lists below.
#[derive(Default)]
pub struct SqlFilter {
    predicates: Vec<String>,
    params: Vec<String>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_eq(&mut self, column: &str, value: Option<&str>) {
        if let Some(value) = value {
            if value.is_empty() {
                return;
            }
            self.predicates.push(format!(" AND {} = ?", column));
            self.params.push(value.to_string());
        }
    }

    pub fn render(&self) -> String {
        self.predicates.concat()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn from_program_filters(filters: &ProgramFilters) -> Self {
        let mut filter = Self::new();
        filter.push_eq("p.degree_type", filters.degree_type.as_deref());
        filter.push_eq("p.country", filters.country.as_deref());
        filter.push_eq("p.city", filters.city.as_deref());
        filter.push_eq("p.state", filters.state.as_deref());
        filter.push_eq("p.cost", filters.cost.as_deref());
        filter
    }
}

fn direction(filters: &ProgramFilters) -> &'static str {
    match filters.sort_order.as_deref() {
        Some("asc") => "ASC",
        _ => "DESC",
    }
}

/// Sort for the public listing: name, created_at or rating, defaulting to
/// rating. Unknown keys fall back to the default; id breaks ties so equal
/// sort keys always come back in a deterministic order.
pub fn public_order_by(filters: &ProgramFilters) -> String {
    let column = match filters.sort_by.as_deref() {
        Some("name") => "p.name",
        Some("created_at") => "p.created_at",
        _ => "average_rating",
    };

    format!("{} {}, p.id", column, direction(filters))
}

/// Sort for the admin listing, which also allows university name, degree
/// type, country and visibility, defaulting to newest first.
pub fn admin_order_by(filters: &ProgramFilters) -> String {
    let column = match filters.sort_by.as_deref() {
        Some("name") => "p.name",
        Some("university_name") => "u.name",
        Some("degree_type") => "p.degree_type",
        Some("country") => "p.country",
        Some("visibility") => "p.visibility",
        _ => "p.created_at",
    };

    format!("{} {}, p.id", column, direction(filters))
}
