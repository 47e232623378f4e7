use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use crate::{
    auth::password::hash_password,
    config::AdminConfig,
    skills,
    users::repo_types::{NewUser, User},
};

/// Startup data: the skill catalogue and, when configured, the first account.
pub async fn run(db: &PgPool, admin: Option<&AdminConfig>) -> anyhow::Result<()> {
    skills::seed(db).await.context("seed skills")?;

    let Some(admin) = admin else {
        return Ok(());
    };
    if User::find_by_email(db, &admin.email).await?.is_some() {
        return Ok(());
    }
    let user = User::create(
        db,
        &NewUser {
            name: "Administrator".into(),
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password)?,
            city: None,
            state: None,
            country: None,
            contact_number: None,
        },
    )
    .await
    .context("create admin user")?;
    info!(user_id = %user.id, email = %user.email, "admin user created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    async fn creates_admin_once(pool: PgPool) {
        let admin = AdminConfig {
            email: "admin@example.com".into(),
            password: "password@123".into(),
        };
        run(&pool, Some(&admin)).await.unwrap();
        run(&pool, Some(&admin)).await.unwrap();
        assert_eq!(User::count(&pool).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn without_admin_only_skills_are_seeded(pool: PgPool) {
        run(&pool, None).await.unwrap();
        assert_eq!(User::count(&pool).await.unwrap(), 0);
    }
}
