use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never rendered
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Column values for an insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
}

/// Column values for an update; `password_hash: None` keeps the stored hash.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub contact_number: Option<String>,
}

#[cfg(test)]
impl NewUser {
    pub fn fixture(email: &str, password_hash: &str) -> Self {
        Self {
            name: "Test User".into(),
            email: email.into(),
            password_hash: password_hash.into(),
            city: Some("Lahore".into()),
            state: Some("PB".into()),
            country: Some("PK".into()),
            contact_number: None,
        }
    }
}
