//! User validation and persistence rules.

use std::ops::RangeInclusive;

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    error::AppError,
    skills::repo_types::{Skill, UserSkill},
    users::{
        dto::UserParams,
        repo_types::{NewUser, User, UserChanges},
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const RATING_RANGE: RangeInclusive<i32> = 0..=10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
    ContactNumber,
    SkillRatings,
}

impl Field {
    pub fn human_name(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Password => "Password",
            Field::ContactNumber => "Contact number",
            Field::SkillRatings => "Skill ratings",
        }
    }
}

/// Accumulated validation messages, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<(Field, String)>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn on(&self, field: Field) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    /// Messages prefixed with the attribute name, e.g. "Email can't be blank".
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|(field, message)| {
                if *field == Field::SkillRatings {
                    message.clone()
                } else {
                    format!("{} {}", field.human_name(), message)
                }
            })
            .collect()
    }
}

#[derive(Debug)]
pub enum SaveError {
    Invalid(ValidationErrors),
    Failed(AppError),
}

impl From<AppError> for SaveError {
    fn from(e: AppError) -> Self {
        SaveError::Failed(e)
    }
}

impl From<anyhow::Error> for SaveError {
    fn from(e: anyhow::Error) -> Self {
        SaveError::Failed(e.into())
    }
}

impl From<sqlx::Error> for SaveError {
    /// A unique index firing after the pre-checks passed is still a validation failure.
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let mut errors = ValidationErrors::default();
                match db.constraint() {
                    Some(c) if c.contains("contact_number") => {
                        errors.add(Field::ContactNumber, "has already been taken")
                    }
                    _ => errors.add(Field::Email, "has already been taken"),
                }
                return SaveError::Invalid(errors);
            }
        }
        SaveError::Failed(e.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lowercases the email and applies the state-from-country default on create.
pub fn normalize(params: &mut UserParams, mode: Mode) {
    if let Some(email) = params.email.as_mut() {
        *email = email.to_lowercase();
    }
    if mode == Mode::Create && params.state.is_none() {
        params.state = params.country.clone();
    }
}

/// Checks that need no database: presence, format, password length, ratings.
pub fn validate(params: &UserParams, mode: Mode, skills: &[Skill]) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if params.name.is_none() {
        errors.add(Field::Name, "can't be blank");
    }
    match params.email.as_deref() {
        None => errors.add(Field::Email, "can't be blank"),
        Some(email) if !is_valid_email(email) => errors.add(Field::Email, "is invalid"),
        Some(_) => {}
    }
    match params.password.as_deref() {
        None if mode == Mode::Create => errors.add(Field::Password, "can't be blank"),
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => errors.add(
            Field::Password,
            format!("is too short (minimum is {MIN_PASSWORD_LEN} characters)"),
        ),
        _ => {}
    }

    for (skill_id, rating) in params.skill_ratings.iter().flatten() {
        if rating.is_empty() {
            continue;
        }
        let Some(skill) = skills.iter().find(|s| s.id.to_string() == *skill_id) else {
            continue;
        };
        match rating.parse::<i32>() {
            Ok(value) if RATING_RANGE.contains(&value) => {}
            Ok(_) => errors.add(
                Field::SkillRatings,
                format!(
                    "{} rating must be between {} and {}",
                    skill.name,
                    RATING_RANGE.start(),
                    RATING_RANGE.end()
                ),
            ),
            Err(_) => errors.add(
                Field::SkillRatings,
                format!("{} rating is not a number", skill.name),
            ),
        }
    }

    errors
}

/// Ratings for known skills with a non-blank integer value.
pub fn parsed_ratings(params: &UserParams, skills: &[Skill]) -> Option<Vec<(Uuid, i32)>> {
    let submitted = params.skill_ratings.as_ref()?;
    Some(
        submitted
            .iter()
            .filter_map(|(skill_id, rating)| {
                let skill = skills.iter().find(|s| s.id.to_string() == *skill_id)?;
                let rating = rating.parse::<i32>().ok()?;
                RATING_RANGE.contains(&rating).then_some((skill.id, rating))
            })
            .collect(),
    )
}

async fn check_uniqueness(
    db: &PgPool,
    params: &UserParams,
    except: Option<Uuid>,
    errors: &mut ValidationErrors,
) -> sqlx::Result<()> {
    if let Some(email) = params.email.as_deref() {
        if User::email_taken(db, email, except).await? {
            errors.add(Field::Email, "has already been taken");
        }
    }
    if let Some(contact_number) = params.contact_number.as_deref() {
        if User::contact_number_taken(db, contact_number, except).await? {
            errors.add(Field::ContactNumber, "has already been taken");
        }
    }
    Ok(())
}

pub async fn create_user(db: &PgPool, mut params: UserParams) -> Result<User, SaveError> {
    normalize(&mut params, Mode::Create);
    let skills = Skill::all(db).await?;
    let mut errors = validate(&params, Mode::Create, &skills);
    check_uniqueness(db, &params, None, &mut errors).await?;
    if !errors.is_empty() {
        warn!(errors = ?errors.full_messages(), "user create rejected");
        return Err(SaveError::Invalid(errors));
    }

    let password = params.password.as_deref().unwrap_or_default();
    let new = NewUser {
        name: params.name.clone().unwrap_or_default(),
        email: params.email.clone().unwrap_or_default(),
        password_hash: hash_password(password)?,
        city: params.city.clone(),
        state: params.state.clone(),
        country: params.country.clone(),
        contact_number: params.contact_number.clone(),
    };

    let mut tx = db.begin().await?;
    let user = User::create(&mut *tx, &new).await?;
    if let Some(ratings) = parsed_ratings(&params, &skills) {
        UserSkill::replace_for_user(&mut tx, user.id, &ratings).await?;
    }
    tx.commit().await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn update_user(db: &PgPool, id: Uuid, mut params: UserParams) -> Result<User, SaveError> {
    if User::find(db, id).await?.is_none() {
        return Err(SaveError::Failed(AppError::NotFound("User")));
    }

    normalize(&mut params, Mode::Update);
    let skills = Skill::all(db).await?;
    let mut errors = validate(&params, Mode::Update, &skills);
    check_uniqueness(db, &params, Some(id), &mut errors).await?;
    if !errors.is_empty() {
        warn!(user_id = %id, errors = ?errors.full_messages(), "user update rejected");
        return Err(SaveError::Invalid(errors));
    }

    let password_hash = match params.password.as_deref() {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };
    let changes = UserChanges {
        name: params.name.clone().unwrap_or_default(),
        email: params.email.clone().unwrap_or_default(),
        password_hash,
        city: params.city.clone(),
        state: params.state.clone(),
        country: params.country.clone(),
        contact_number: params.contact_number.clone(),
    };

    let mut tx = db.begin().await?;
    let user = User::update(&mut *tx, id, &changes)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    if let Some(ratings) = parsed_ratings(&params, &skills) {
        UserSkill::replace_for_user(&mut tx, user.id, &ratings).await?;
    }
    tx.commit().await?;

    info!(user_id = %user.id, "user updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills;

    fn params(email: &str, contact: &str) -> UserParams {
        UserParams {
            name: Some("Ali Raza".into()),
            email: Some(email.into()),
            password: Some("password@123".into()),
            city: Some("Lahore".into()),
            state: Some("PB".into()),
            country: Some("PK".into()),
            contact_number: Some(contact.into()),
            skill_ratings: None,
        }
    }

    #[test]
    fn missing_name_and_email_are_reported() {
        let p = UserParams {
            password: Some("password@123".into()),
            ..Default::default()
        };
        let messages = validate(&p, Mode::Create, &[]).full_messages();
        assert!(messages.contains(&"Email can't be blank".to_string()));
        assert!(messages.contains(&"Name can't be blank".to_string()));
    }

    #[test]
    fn password_rules_depend_on_mode() {
        let mut p = params("a@example.com", "+92 300 1234567");
        p.password = None;
        let create = validate(&p, Mode::Create, &[]).full_messages();
        assert_eq!(create, vec!["Password can't be blank".to_string()]);
        assert!(validate(&p, Mode::Update, &[]).is_empty());

        p.password = Some("12345".into());
        let short = validate(&p, Mode::Update, &[]).full_messages();
        assert_eq!(
            short,
            vec!["Password is too short (minimum is 6 characters)".to_string()]
        );
    }

    #[test]
    fn malformed_email_is_invalid() {
        let p = params("not-an-email", "1");
        let errors = validate(&p, Mode::Create, &[]);
        assert_eq!(errors.on(Field::Email).collect::<Vec<_>>(), vec!["is invalid"]);
    }

    #[test]
    fn state_defaults_to_country_only_on_create() {
        let mut p = params("a@example.com", "1");
        p.state = None;
        normalize(&mut p, Mode::Create);
        assert_eq!(p.state.as_deref(), Some("PK"));

        let mut p = params("A@Example.com", "1");
        p.state = None;
        normalize(&mut p, Mode::Update);
        assert_eq!(p.state, None);
        assert_eq!(p.email.as_deref(), Some("a@example.com"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_defaults_state_to_country(pool: PgPool) {
        let mut p = params("state@example.com", "+92 300 0000001");
        p.state = None;
        let user = create_user(&pool, p).await.unwrap();
        assert_eq!(user.state, user.country);
        assert_eq!(user.state.as_deref(), Some("PK"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_email_and_contact_number_fail(pool: PgPool) {
        create_user(&pool, params("dup@example.com", "+92 300 0000002"))
            .await
            .unwrap();

        let err = create_user(&pool, params("DUP@example.com", "+92 300 0000002"))
            .await
            .unwrap_err();
        let SaveError::Invalid(errors) = err else {
            panic!("expected validation failure");
        };
        let messages = errors.full_messages();
        assert!(messages.contains(&"Email has already been taken".to_string()));
        assert!(messages.contains(&"Contact number has already been taken".to_string()));
        assert_eq!(User::count(&pool).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_may_keep_own_email(pool: PgPool) {
        let user = create_user(&pool, params("own@example.com", "+92 300 0000003"))
            .await
            .unwrap();
        let mut p = params("own@example.com", "+92 300 0000003");
        p.name = Some("test name".into());
        p.password = None;
        let updated = update_user(&pool, user.id, p).await.unwrap();
        assert_eq!(updated.name, "test name");
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unique_index_violation_becomes_validation_error(pool: PgPool) {
        let hash = hash_password("password@123").unwrap();
        User::create(&pool, &NewUser::fixture("race@example.com", &hash))
            .await
            .unwrap();
        let err = User::create(&pool, &NewUser::fixture("race@example.com", &hash))
            .await
            .unwrap_err();
        let SaveError::Invalid(errors) = SaveError::from(err) else {
            panic!("expected validation failure");
        };
        assert_eq!(
            errors.full_messages(),
            vec!["Email has already been taken".to_string()]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn ratings_replace_existing_join_rows(pool: PgPool) {
        let catalogue = skills::seed(&pool).await.unwrap();
        let html = &catalogue[0];
        let ruby = catalogue.iter().find(|s| s.name == "Ruby").unwrap();

        let mut p = params("rated@example.com", "+92 300 0000004");
        p.skill_ratings = Some(vec![(html.id.to_string(), "8".into())]);
        let user = create_user(&pool, p).await.unwrap();
        assert_eq!(UserSkill::count_for_user(&pool, user.id).await.unwrap(), 1);

        let mut p = params("rated@example.com", "+92 300 0000004");
        p.password = None;
        p.skill_ratings = Some(vec![
            (html.id.to_string(), String::new()),
            (ruby.id.to_string(), "6".into()),
        ]);
        update_user(&pool, user.id, p).await.unwrap();

        let rated = UserSkill::for_user(&pool, user.id).await.unwrap();
        assert_eq!(rated.len(), 1);
        assert_eq!(rated[0].name, "Ruby");
        assert_eq!(rated[0].rating, Some(6));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn non_numeric_rating_is_rejected(pool: PgPool) {
        let catalogue = skills::seed(&pool).await.unwrap();
        let mut p = params("nan@example.com", "+92 300 0000005");
        p.skill_ratings = Some(vec![(catalogue[0].id.to_string(), "great".into())]);
        let SaveError::Invalid(errors) = create_user(&pool, p).await.unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(
            errors.full_messages(),
            vec![format!("{} rating is not a number", catalogue[0].name)]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn out_of_range_ratings_are_rejected(pool: PgPool) {
        let catalogue = skills::seed(&pool).await.unwrap();
        let mut p = params("range@example.com", "+92 300 0000006");
        p.skill_ratings = Some(vec![
            (catalogue[0].id.to_string(), "-5".into()),
            (catalogue[1].id.to_string(), "500".into()),
            (catalogue[2].id.to_string(), "10".into()),
        ]);
        let SaveError::Invalid(errors) = create_user(&pool, p).await.unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(
            errors.full_messages(),
            vec![
                format!("{} rating must be between 0 and 10", catalogue[0].name),
                format!("{} rating must be between 0 and 10", catalogue[1].name),
            ]
        );
        assert_eq!(User::count(&pool).await.unwrap(), 0);
    }
}
