use crate::skills::repo_types::{RatedSkill, Skill, SkillKind, UserSkill};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

impl Skill {
    /// All skills, front-end first, alphabetical within a kind.
    pub async fn all(db: &PgPool) -> sqlx::Result<Vec<Skill>> {
        sqlx::query_as::<_, Skill>(
            r#"
            SELECT id, name, kind, created_at, updated_at
            FROM skills
            ORDER BY kind ASC, name ASC
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find_or_create(db: &PgPool, name: &str, kind: SkillKind) -> sqlx::Result<Skill> {
        sqlx::query_as::<_, Skill>(
            r#"
            INSERT INTO skills (name, kind)
            VALUES ($1, $2)
            ON CONFLICT (kind, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, kind, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(kind)
        .fetch_one(db)
        .await
    }
}

impl UserSkill {
    pub async fn create<'e, E: PgExecutor<'e>>(
        db: E,
        user_id: Uuid,
        skill_id: Uuid,
        rating: Option<i32>,
    ) -> sqlx::Result<UserSkill> {
        sqlx::query_as::<_, UserSkill>(
            r#"
            INSERT INTO user_skills (user_id, skill_id, rating)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, skill_id, rating, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(skill_id)
        .bind(rating)
        .fetch_one(db)
        .await
    }

    /// Replaces every rating the user holds with `ratings`.
    pub async fn replace_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        ratings: &[(Uuid, i32)],
    ) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM user_skills WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        for (skill_id, rating) in ratings {
            UserSkill::create(&mut *conn, user_id, *skill_id, Some(*rating)).await?;
        }
        Ok(())
    }

    pub async fn for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<RatedSkill>> {
        sqlx::query_as::<_, RatedSkill>(
            r#"
            SELECT s.id AS skill_id, s.name, s.kind, us.rating
            FROM user_skills us
            JOIN skills s ON s.id = us.skill_id
            WHERE us.user_id = $1
            ORDER BY s.kind ASC, s.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    #[cfg(test)]
    pub async fn count_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_skills WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await
    }
}
